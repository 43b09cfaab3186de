// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod channel;
pub mod infra;
pub mod packet;
pub mod report;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use packet::{is_alias, is_qa_construct, AprsPacket, PathElement, ReportType, ThirdParty};
pub use report::{
    ExtraPosition, MessageKind, MessageReport, ObjectKind, ObjectReport, Phg, Position,
    PositionEncoding, PositionReport, ReportOutcome, ReportTime, StatusReport, Telemetry,
    WeatherReport,
};
