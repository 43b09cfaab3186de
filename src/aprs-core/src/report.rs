// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Structured report data produced by the report decoder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Geographic position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance in kilometers (haversine).
    pub fn distance_km(&self, other: &Position) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Time a report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum ReportTime {
    /// No timestamp on the wire; the report is current.
    #[default]
    Received,
    At(DateTime<Utc>),
    /// `111111z`: permanent object, no meaningful time.
    Timeless,
}

impl ReportTime {
    /// Absolute time, using `received` for reports without a timestamp.
    pub fn resolve(&self, received: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::At(t) => *t,
            Self::Received | Self::Timeless => received,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionEncoding {
    Uncompressed,
    Compressed,
    MicE,
}

/// Power-height-gain extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phg {
    pub power_w: u32,
    pub height_ft: u32,
    pub gain_db: u32,
    /// Beam heading in degrees, `None` for omni.
    pub directivity: Option<u16>,
    pub range_km: f64,
}

/// Compressed telemetry carried in a comment (`|ss11223344|`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub sequence: u16,
    pub analog: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital: Option<u8>,
}

/// Weather data decoded from a weather-station comment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Degrees.
    pub wind_direction: Option<u16>,
    /// Meters per second.
    pub wind_speed: Option<f64>,
    /// Meters per second.
    pub wind_gust: Option<f64>,
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    /// Millimeters.
    pub rain_1h: Option<f64>,
    pub rain_24h: Option<f64>,
    pub rain_midnight: Option<f64>,
    /// Percent.
    pub humidity: Option<u8>,
    /// Hectopascal.
    pub pressure: Option<f64>,
    pub summary: String,
}

/// Secondary position carried in a `/#` comment extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraPosition {
    pub position: Position,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub position: Position,
    /// Number of trailing digits blanked (0..=4).
    pub ambiguity: u8,
    pub symbol: char,
    pub symbol_table: char,
    /// Degrees, 1..=360.
    pub course: Option<u16>,
    /// km/h.
    pub speed: Option<f64>,
    /// Meters.
    pub altitude: Option<f64>,
    pub time: ReportTime,
    pub encoding: PositionEncoding,
    /// Sender is message capable (`=`, `@` or Mic-E).
    pub messaging: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phg: Option<Phg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
    /// Mic-E message code (e.g. "En route").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_e_status: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extra: Vec<ExtraPosition>,
    pub comment: String,
}

impl PositionReport {
    pub fn new(position: Position, symbol_table: char, symbol: char) -> Self {
        Self {
            position,
            ambiguity: 0,
            symbol,
            symbol_table,
            course: None,
            speed: None,
            altitude: None,
            time: ReportTime::Received,
            encoding: PositionEncoding::Uncompressed,
            messaging: false,
            phg: None,
            range_km: None,
            weather: None,
            telemetry: None,
            mic_e_status: None,
            extra: Vec::new(),
            comment: String::new(),
        }
    }

    pub fn is_weather_station(&self) -> bool {
        self.symbol == '_'
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub time: ReportTime,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Ack(String),
    Rej(String),
    /// Bulletin or announcement (`BLNn`), carries the bulletin id.
    Bulletin(String),
    /// `PARM.` / `UNIT.` / `EQNS.` / `BITS.` telemetry definition.
    TelemetryDefinition(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReport {
    pub recipient: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msgid: Option<String>,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Object,
    Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectReport {
    pub name: String,
    pub kind: ObjectKind,
    pub alive: bool,
    /// Present for live objects only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionReport>,
}

/// Result of decoding one packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ReportOutcome {
    Position(PositionReport),
    Status(StatusReport),
    Message(MessageReport),
    Object(ObjectReport),
    Ignored,
    ParseError(String),
}

impl ReportOutcome {
    /// Primary position carried by the outcome, if any.
    pub fn position(&self) -> Option<&PositionReport> {
        match self {
            Self::Position(p) => Some(p),
            Self::Object(o) => o.position.as_ref(),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ParseError(_))
    }
}
