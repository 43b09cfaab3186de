// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TNC2 text format: `SRC>DST,PATH:PAYLOAD`.

use aprs_core::{AprsPacket, PathElement, ReportType, ThirdParty};

use crate::error::FrameError;

/// Parse one text line. Third-party payloads are unwrapped.
pub fn parse(line: &str) -> Result<AprsPacket, FrameError> {
    Ok(unwrap_third_party(parse_header(line)?))
}

/// Render a packet as a line terminated by CR LF.
pub fn format_line(packet: &AprsPacket) -> String {
    format!("{}\r\n", packet)
}

/// Parse a comma separated path. A `*` on an element marks every element
/// before it as digipeated too.
pub fn parse_path(text: &str) -> Vec<PathElement> {
    let mut path: Vec<PathElement> = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathElement::parse)
        .collect();
    if let Some(last) = path.iter().rposition(|e| e.digipeated) {
        for elem in &mut path[..last] {
            elem.digipeated = true;
        }
    }
    path
}

/// Replace a `}` third-party packet by the packet it carries. The outer
/// header is kept in [`AprsPacket::third_party`]. Packets that are not
/// third-party, or whose inner header does not parse, are returned as is.
pub fn unwrap_third_party(packet: AprsPacket) -> AprsPacket {
    if packet.report_type != ReportType::ThirdParty {
        return packet;
    }
    let Some(inner) = packet.report.get(1..) else {
        return packet;
    };
    match parse_header(inner) {
        Ok(mut unwrapped) => {
            unwrapped.channel = packet.channel;
            unwrapped.third_party = Some(ThirdParty {
                source: packet.source,
                destination: packet.destination,
                path: packet.path,
            });
            unwrapped
        }
        Err(_) => packet,
    }
}

fn parse_header(line: &str) -> Result<AprsPacket, FrameError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(FrameError::Empty);
    }
    let (header, payload) = line
        .split_once(':')
        .ok_or(FrameError::MissingSeparator(':'))?;
    let (source, rest) = header
        .split_once('>')
        .ok_or(FrameError::MissingSeparator('>'))?;
    let (destination, path) = match rest.split_once(',') {
        Some((dest, path)) => (dest, parse_path(path)),
        None => (rest, Vec::new()),
    };

    let source = source.trim();
    let destination = destination.trim();
    if !valid_call(source) {
        return Err(FrameError::BadCallsign(source.to_string()));
    }
    if !valid_call(destination) {
        return Err(FrameError::BadCallsign(destination.to_string()));
    }
    Ok(AprsPacket::new(source, destination, path, payload))
}

/// APRS-IS allows longer, non-AX.25 source calls; only reject the clearly
/// broken ones.
fn valid_call(call: &str) -> bool {
    !call.is_empty()
        && call.len() <= 9
        && call
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_line() {
        let p = parse("N0CALL-9>APRS,WIDE1-1,WIDE2-1:!4903.50N/07201.75W-Test\r\n").unwrap();
        assert_eq!(p.source, "N0CALL-9");
        assert_eq!(p.destination, "APRS");
        assert_eq!(p.path.len(), 2);
        assert_eq!(p.report, "!4903.50N/07201.75W-Test");
        assert_eq!(p.report_type, ReportType::Position);
    }

    #[test]
    fn test_star_implies_earlier_digipeated() {
        let p = parse("N0CALL>APRS,LA1ABC,LA2XYZ*,WIDE2-1:>hi").unwrap();
        assert!(p.path[0].digipeated);
        assert!(p.path[1].digipeated);
        assert!(!p.path[2].digipeated);
        assert_eq!(p.path_string(), "LA1ABC*,LA2XYZ*,WIDE2-1");
    }

    #[test]
    fn test_payload_may_contain_colons() {
        let p = parse("N0CALL>APRS::WU2Z     :Testing{003").unwrap();
        assert!(p.path.is_empty());
        assert_eq!(p.report, ":WU2Z     :Testing{003");
        assert_eq!(p.msg_to.as_deref(), Some("WU2Z"));
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(parse(""), Err(FrameError::Empty));
        assert_eq!(parse("N0CALL>APRS"), Err(FrameError::MissingSeparator(':')));
        assert_eq!(parse("N0CALL:hello"), Err(FrameError::MissingSeparator('>')));
        assert!(matches!(parse(">APRS:x"), Err(FrameError::BadCallsign(_))));
    }

    #[test]
    fn test_third_party_unwrap() {
        let p = parse("LA1ABC-10>APZRS1,WIDE2-1:}LA9XYZ>APRS,TCPIP,LA1ABC-10*:>inner status").unwrap();
        assert_eq!(p.source, "LA9XYZ");
        assert_eq!(p.report, ">inner status");
        assert!(p.path_has_inet_marker());
        let outer = p.third_party.unwrap();
        assert_eq!(outer.source, "LA1ABC-10");
        assert_eq!(outer.path, vec![PathElement::new("WIDE2-1", false)]);
    }

    #[test]
    fn test_broken_third_party_kept() {
        let p = parse("LA1ABC>APRS:}garbage").unwrap();
        assert_eq!(p.source, "LA1ABC");
        assert_eq!(p.report_type, ReportType::ThirdParty);
        assert!(p.third_party.is_none());
    }

    #[test]
    fn test_format_line() {
        let p = parse("N0CALL>APRS,WIDE1*,WIDE2-1:>x").unwrap();
        assert_eq!(format_line(&p), "N0CALL>APRS,WIDE1*,WIDE2-1:>x\r\n");
    }
}
