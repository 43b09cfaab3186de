// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! In-memory station store: last known position, symbol and status per
//! callsign or object name.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use aprs_core::infra::StationDirectory;
use aprs_core::{AprsPacket, Position, PositionReport, ReportOutcome, ReportType};

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub call: String,
    pub last_heard: DateTime<Utc>,
    pub position: Option<Position>,
    pub symbol: Option<(char, char)>,
    pub status: Option<String>,
    pub comment: String,
    /// Killed objects and items stay known but lose their position.
    pub killed: bool,
}

impl Station {
    fn new(call: &str, now: DateTime<Utc>) -> Self {
        Self {
            call: call.to_string(),
            last_heard: now,
            position: None,
            symbol: None,
            status: None,
            comment: String::new(),
            killed: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct StationStore {
    stations: Mutex<HashMap<String, Station>>,
}

impl StationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Station>> {
        self.stations.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, call: &str) -> Option<Station> {
        self.lock().get(&call.to_ascii_uppercase()).cloned()
    }

    /// Last known position of the station or object a packet is about.
    pub fn get_pos(&self, packet: &AprsPacket) -> Option<Position> {
        let name = match packet.report_type {
            ReportType::Object | ReportType::Item => packet.msg_to.as_deref(),
            _ => None,
        }
        .unwrap_or(packet.source.as_str());
        self.lock()
            .get(&name.to_ascii_uppercase())
            .and_then(|s| s.position)
    }

    pub fn touch(&self, call: &str, now: DateTime<Utc>) {
        let key = call.to_ascii_uppercase();
        self.lock()
            .entry(key.clone())
            .or_insert_with(|| Station::new(&key, now))
            .last_heard = now;
    }

    pub fn update_position(&self, call: &str, report: &PositionReport, now: DateTime<Utc>) {
        let key = call.to_ascii_uppercase();
        let mut stations = self.lock();
        let station = stations
            .entry(key.clone())
            .or_insert_with(|| Station::new(&key, now));
        station.last_heard = now;
        station.position = Some(report.position);
        station.symbol = Some((report.symbol_table, report.symbol));
        station.comment = report.comment.clone();
        station.killed = false;
    }

    /// Apply one decoded packet. The sender is always recorded as heard.
    pub fn update(&self, packet: &AprsPacket, outcome: &ReportOutcome, now: DateTime<Utc>) {
        self.touch(&packet.source, now);
        match outcome {
            ReportOutcome::Position(report) => {
                self.update_position(&packet.source, report, now);
                for extra in &report.extra {
                    let mut update = report.clone();
                    update.position = extra.position;
                    self.update_position(&packet.source, &update, now);
                }
            }
            ReportOutcome::Status(status) => {
                let key = packet.source.to_ascii_uppercase();
                if let Some(station) = self.lock().get_mut(&key) {
                    station.status = Some(status.text.clone());
                }
            }
            ReportOutcome::Object(object) => match &object.position {
                Some(report) => self.update_position(&object.name, report, now),
                None => {
                    let key = object.name.to_ascii_uppercase();
                    let mut stations = self.lock();
                    let station = stations
                        .entry(key.clone())
                        .or_insert_with(|| Station::new(&key, now));
                    station.last_heard = now;
                    station.position = None;
                    station.killed = true;
                }
            },
            ReportOutcome::Message(_) | ReportOutcome::Ignored | ReportOutcome::ParseError(_) => {}
        }
    }
}

impl StationDirectory for StationStore {
    fn is_known(&self, call: &str) -> bool {
        self.lock().contains_key(&call.to_ascii_uppercase())
    }
}
