// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! APRS report decoder.
//!
//! [`decode`] dispatches on the report type tag and turns the information
//! field of a packet into a [`ReportOutcome`]. Malformed reports become
//! [`ReportOutcome::ParseError`]; the packet itself is still usable for
//! logging and gating.

mod comment;
mod compressed;
pub mod encode;
pub mod error;
mod message;
mod mic_e;
mod position;
pub mod timestamp;
mod weather;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use aprs_core::{AprsPacket, ReportOutcome, ReportType};

pub use error::DecodeError;

pub(crate) const MILES_TO_KM: f64 = 1.609344;
pub(crate) const FEET_TO_M: f64 = 0.3048;
pub(crate) const KNOTS_TO_KMH: f64 = 1.852;

/// Decode the report carried by `packet`, resolving timestamps against `now`.
pub fn decode(packet: &AprsPacket, now: DateTime<Utc>) -> ReportOutcome {
    let report = packet.report.as_str();
    let result = match packet.report_type {
        ReportType::Position | ReportType::TimestampedPosition => {
            position::decode(report, now).map(ReportOutcome::Position)
        }
        ReportType::MicE => {
            mic_e::decode(&packet.destination, report, now).map(ReportOutcome::Position)
        }
        ReportType::Object => message::decode_object(report, now).map(ReportOutcome::Object),
        ReportType::Item => message::decode_item(report, now).map(ReportOutcome::Object),
        ReportType::Message => message::decode_message(report).map(ReportOutcome::Message),
        ReportType::Status => Ok(ReportOutcome::Status(message::decode_status(report, now))),
        _ => return ReportOutcome::Ignored,
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            match &e {
                DecodeError::Malformed { .. } => warn!("{}: {}", packet.source, e),
                _ => debug!("{}: {}", packet.source, e),
            }
            ReportOutcome::ParseError(e.to_string())
        }
    }
}

pub(crate) fn knots_to_kmh(knots: f64) -> f64 {
    knots * KNOTS_TO_KMH
}

pub(crate) fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}
