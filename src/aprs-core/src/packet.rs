// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The parsed wire packet shared by every channel, decoder and gateway.
//!
//! A packet is built once per received frame. Classification (report type
//! and message target) happens in [`AprsPacket::new`]; nothing mutates the
//! packet after that.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One digipeater path element, e.g. `LA1ABC-2*` or `WIDE2-1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElement {
    pub call: String,
    /// AX.25 has-been-repeated bit; rendered as a trailing `*`.
    pub digipeated: bool,
}

impl PathElement {
    pub fn new(call: impl Into<String>, digipeated: bool) -> Self {
        Self {
            call: call.into(),
            digipeated,
        }
    }

    /// Parse a single text element; a trailing `*` sets the digipeated flag.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.strip_suffix('*') {
            Some(call) => Self::new(call, true),
            None => Self::new(text, false),
        }
    }

    /// Case-insensitive comparison of the bare callsign against `token`.
    pub fn is(&self, token: &str) -> bool {
        self.call.eq_ignore_ascii_case(token)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.digipeated {
            write!(f, "{}*", self.call)
        } else {
            f.write_str(&self.call)
        }
    }
}

/// Report type derived from the first payload character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// `!` or `=`
    Position,
    /// `@` or `/`
    TimestampedPosition,
    /// `;`
    Object,
    /// `)`
    Item,
    /// `'` or backtick
    MicE,
    /// `:`
    Message,
    /// `>`
    Status,
    /// `?`
    Query,
    /// `<`
    Capabilities,
    /// `T`
    Telemetry,
    /// `_`
    Weather,
    /// `}`
    ThirdParty,
    /// `$`
    RawGps,
    /// `{`
    UserDefined,
    Unknown,
}

impl ReportType {
    pub fn from_report(report: &str) -> Self {
        match report.as_bytes().first() {
            Some(b'!') | Some(b'=') => Self::Position,
            Some(b'@') | Some(b'/') => Self::TimestampedPosition,
            Some(b';') => Self::Object,
            Some(b')') => Self::Item,
            Some(b'\'') | Some(b'`') => Self::MicE,
            Some(b':') => Self::Message,
            Some(b'>') => Self::Status,
            Some(b'?') => Self::Query,
            Some(b'<') => Self::Capabilities,
            Some(b'T') => Self::Telemetry,
            Some(b'_') => Self::Weather,
            Some(b'}') => Self::ThirdParty,
            Some(b'$') => Self::RawGps,
            Some(b'{') => Self::UserDefined,
            _ => Self::Unknown,
        }
    }

    pub fn has_position(self) -> bool {
        matches!(
            self,
            Self::Position | Self::TimestampedPosition | Self::MicE | Self::Object | Self::Item
        )
    }
}

/// Outer header of a third-party (`}`) packet after unwrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdParty {
    pub source: String,
    pub destination: String,
    pub path: Vec<PathElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AprsPacket {
    pub source: String,
    pub destination: String,
    pub path: Vec<PathElement>,
    /// Information field (the APRS report text).
    pub report: String,
    pub report_type: ReportType,
    /// Id of the channel the packet arrived on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Set when the packet was unwrapped from a third-party report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub third_party: Option<ThirdParty>,
    /// Message recipient or object/item name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_to: Option<String>,
}

impl AprsPacket {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        path: Vec<PathElement>,
        report: impl Into<String>,
    ) -> Self {
        let report = report.into();
        let report_type = ReportType::from_report(&report);
        let msg_to = message_target(report_type, &report);
        Self {
            source: source.into(),
            destination: destination.into(),
            path,
            report,
            report_type,
            channel: None,
            third_party: None,
            msg_to,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Comma-separated path with `*` markers, see [`render_path`].
    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }

    /// True if any path element equals one of `tokens` (case-insensitive).
    pub fn path_contains_any(&self, tokens: &[&str]) -> bool {
        self.path
            .iter()
            .any(|e| tokens.iter().any(|t| e.is(t)))
    }

    /// True if the path already carries an internet-gate marker.
    pub fn path_has_inet_marker(&self) -> bool {
        self.path
            .iter()
            .any(|e| is_qa_construct(&e.call) || e.is("TCPIP") || e.is("TCPXX"))
    }

    /// Index of the last element carrying the digipeated flag.
    pub fn last_digipeated_index(&self) -> Option<usize> {
        self.path.iter().rposition(|e| e.digipeated)
    }

    /// Last digipeated element that is a real station rather than an alias.
    pub fn last_true_digipeater(&self) -> Option<&PathElement> {
        last_true_digipeater(&self.path)
    }
}

impl fmt::Display for AprsPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}>{}:{}", self.source, self.destination, self.report)
        } else {
            write!(
                f,
                "{}>{},{}:{}",
                self.source,
                self.destination,
                self.path_string(),
                self.report
            )
        }
    }
}

/// Render a path. `*` is appended to flagged elements, stopping at the first
/// element that has not been digipeated.
pub fn render_path(path: &[PathElement]) -> String {
    let mut marking = true;
    let mut out = String::new();
    for (i, elem) in path.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&elem.call);
        if marking && elem.digipeated {
            out.push('*');
        } else {
            marking = false;
        }
    }
    out
}

/// See [`AprsPacket::last_true_digipeater`].
pub fn last_true_digipeater(path: &[PathElement]) -> Option<&PathElement> {
    path.iter()
        .rev()
        .find(|e| e.digipeated && !is_alias(&e.call))
}

/// `qA?` construct inserted by igates (`qAR`, `qAC`, `qAS`, ...).
pub fn is_qa_construct(call: &str) -> bool {
    let b = call.as_bytes();
    b.len() == 3 && b[0] == b'q' && b[1] == b'A' && b[2].is_ascii_alphabetic()
}

/// Generic path aliases and path markers that never identify a station.
pub fn is_alias(call: &str) -> bool {
    let upper = call.to_ascii_uppercase();
    let base = upper.split('-').next().unwrap_or("");
    if is_qa_construct(call) {
        return true;
    }
    if matches!(
        base,
        "WIDE" | "TRACE" | "RELAY" | "ECHO" | "GATE" | "TCPIP" | "TCPXX" | "NOGATE" | "RFONLY"
            | "NO_TX" | "IGATE"
    ) {
        return true;
    }
    // WIDEn-N / TRACEn-N / state and region aliases such as SSn-N are not
    // distinguishable in general; only the numbered WIDE/TRACE forms are.
    for prefix in ["WIDE", "TRACE"] {
        if let Some(rest) = base.strip_prefix(prefix) {
            if rest.len() == 1 && rest.as_bytes()[0].is_ascii_digit() {
                return true;
            }
        }
    }
    false
}

fn message_target(report_type: ReportType, report: &str) -> Option<String> {
    let field = match report_type {
        ReportType::Message | ReportType::Object => report.get(1..10)?,
        ReportType::Item => {
            let end = report
                .char_indices()
                .skip(1)
                .take(10)
                .find(|(_, c)| *c == '!' || *c == '_')
                .map(|(i, _)| i)?;
            &report[1..end]
        }
        _ => return None,
    };
    let name = field.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(elems: &[(&str, bool)]) -> Vec<PathElement> {
        elems.iter().map(|(c, d)| PathElement::new(*c, *d)).collect()
    }

    #[test]
    fn test_report_type_from_first_char() {
        assert_eq!(ReportType::from_report("!4903.50N/07201.75W-"), ReportType::Position);
        assert_eq!(ReportType::from_report("=4903.50N/07201.75W-"), ReportType::Position);
        assert_eq!(ReportType::from_report("@092345z4903.50N/07201.75W>"), ReportType::TimestampedPosition);
        assert_eq!(ReportType::from_report(";LEADER   *092345z4903.50N/07201.75W>"), ReportType::Object);
        assert_eq!(ReportType::from_report(")AID #2!4903.50N/07201.75WA"), ReportType::Item);
        assert_eq!(ReportType::from_report("`(_fn\"Oj/"), ReportType::MicE);
        assert_eq!(ReportType::from_report(":WU2Z     :Testing"), ReportType::Message);
        assert_eq!(ReportType::from_report(">Net Control"), ReportType::Status);
        assert_eq!(ReportType::from_report("?IGATE?"), ReportType::Query);
        assert_eq!(ReportType::from_report("xyz"), ReportType::Unknown);
        assert_eq!(ReportType::from_report(""), ReportType::Unknown);
    }

    #[test]
    fn test_message_target_extracted() {
        let p = AprsPacket::new("N0CALL", "APRS", vec![], ":WU2Z     :Testing{003");
        assert_eq!(p.msg_to.as_deref(), Some("WU2Z"));

        let p = AprsPacket::new("N0CALL", "APRS", vec![], ";LEADER   *092345z4903.50N/07201.75W>");
        assert_eq!(p.msg_to.as_deref(), Some("LEADER"));

        let p = AprsPacket::new("N0CALL", "APRS", vec![], ")AID #2!4903.50N/07201.75WA");
        assert_eq!(p.msg_to.as_deref(), Some("AID #2"));

        let p = AprsPacket::new("N0CALL", "APRS", vec![], ">status");
        assert_eq!(p.msg_to, None);
    }

    #[test]
    fn test_render_path_stops_at_first_unflagged() {
        let p = path(&[("LA1ABC", true), ("WIDE2", true), ("WIDE3-1", false)]);
        assert_eq!(render_path(&p), "LA1ABC*,WIDE2*,WIDE3-1");

        let p = path(&[("A", false), ("B", true)]);
        assert_eq!(render_path(&p), "A,B");
    }

    #[test]
    fn test_display_tnc2() {
        let p = AprsPacket::new(
            "N0CALL-9",
            "APRS",
            path(&[("WIDE1", true), ("WIDE2-1", false)]),
            "!1234.56N/01234.56E-Test",
        );
        assert_eq!(p.to_string(), "N0CALL-9>APRS,WIDE1*,WIDE2-1:!1234.56N/01234.56E-Test");

        let p = AprsPacket::new("W1AW", "BEACON", vec![], ">Test status");
        assert_eq!(p.to_string(), "W1AW>BEACON:>Test status");
    }

    #[test]
    fn test_alias_detection() {
        assert!(is_alias("WIDE1-1"));
        assert!(is_alias("WIDE2"));
        assert!(is_alias("TRACE3-3"));
        assert!(is_alias("RELAY"));
        assert!(is_alias("qAR"));
        assert!(is_alias("TCPIP"));
        assert!(!is_alias("LA1ABC-2"));
        assert!(!is_alias("WIDEAWAKE"));
    }

    #[test]
    fn test_qa_construct() {
        assert!(is_qa_construct("qAR"));
        assert!(is_qa_construct("qAC"));
        assert!(!is_qa_construct("QAR"));
        assert!(!is_qa_construct("qA"));
    }

    #[test]
    fn test_last_true_digipeater_skips_aliases() {
        let p = AprsPacket::new(
            "N0CALL",
            "APRS",
            path(&[("LA1ABC-2", true), ("WIDE2", true), ("WIDE2-1", false)]),
            ">x",
        );
        assert_eq!(p.last_true_digipeater().map(|e| e.call.as_str()), Some("LA1ABC-2"));
        assert_eq!(p.last_digipeated_index(), Some(1));
    }

    #[test]
    fn test_path_markers() {
        let p = AprsPacket::new(
            "N0CALL",
            "APRS",
            path(&[("WIDE1-1", false), ("NOGATE", false)]),
            ">x",
        );
        assert!(p.path_contains_any(&["RFONLY", "nogate"]));
        assert!(!p.path_has_inet_marker());

        let p = AprsPacket::new(
            "N0CALL",
            "APRS",
            path(&[("TCPIP", true), ("qAC", false), ("T2TEST", false)]),
            ">x",
        );
        assert!(p.path_has_inet_marker());
    }
}
