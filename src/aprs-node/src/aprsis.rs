// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! APRS-IS client protocol: passcode, login line and server comment lines.

use std::time::Duration;

/// Interval between keepalive comment lines sent to the server.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

pub const KEEPALIVE_LINE: &str = "# aprs-node keepalive\r\n";

/// Compute the APRS-IS passcode for a callsign.
///
/// The SSID is ignored and at most 10 characters are hashed, uppercased,
/// two bytes at a time into a 15-bit XOR hash seeded with 0x73E2.
pub fn compute_passcode(callsign: &str) -> u16 {
    let base = callsign.split('-').next().unwrap_or(callsign);
    let upper: Vec<u8> = base
        .bytes()
        .take(10)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let mut hash: u16 = 0x73e2;
    for pair in upper.chunks(2) {
        hash ^= u16::from(pair[0]) << 8;
        if let Some(&low) = pair.get(1) {
            hash ^= u16::from(low);
        }
    }
    hash & 0x7fff
}

/// Passcode to send: the configured one, or computed when set to -1.
pub fn resolve_passcode(callsign: &str, configured: i32) -> i32 {
    if configured == -1 {
        i32::from(compute_passcode(callsign))
    } else {
        configured
    }
}

/// `user CALL pass CODE vers aprs-node VER [filter F]` with CR LF.
pub fn login_line(callsign: &str, passcode: i32, filter: Option<&str>) -> String {
    let mut line = format!(
        "user {} pass {} vers aprs-node {}",
        callsign,
        passcode,
        env!("CARGO_PKG_VERSION")
    );
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        line.push_str(" filter ");
        line.push_str(filter);
    }
    line.push_str("\r\n");
    line
}

/// Server comment line classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// `# logresp CALL verified|unverified, server NAME`
    LogResp { verified: bool },
    /// Any other `#` line (banner, server keepalive).
    Comment,
}

pub fn parse_server_line(line: &str) -> Option<ServerLine> {
    let rest = line.strip_prefix('#')?.trim_start();
    if rest.starts_with("logresp") {
        let verified = rest.contains(" verified") && !rest.contains("unverified");
        Some(ServerLine::LogResp { verified })
    } else {
        Some(ServerLine::Comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passcode_known_value() {
        assert_eq!(compute_passcode("N0CALL"), 13023);
    }

    #[test]
    fn passcode_strips_ssid_and_case() {
        assert_eq!(compute_passcode("N0CALL"), compute_passcode("n0call-9"));
        assert_eq!(compute_passcode("SP2SJG"), compute_passcode("SP2SJG-15"));
        assert_eq!(
            compute_passcode("ABCDEFGHIJ"),
            compute_passcode("ABCDEFGHIJKL")
        );
    }

    #[test]
    fn resolve_uses_configured_value() {
        assert_eq!(resolve_passcode("N0CALL", 12345), 12345);
        assert_eq!(resolve_passcode("N0CALL", -1), 13023);
    }

    #[test]
    fn login_with_and_without_filter() {
        let version = env!("CARGO_PKG_VERSION");
        assert_eq!(
            login_line("N0CALL-10", 13023, Some("m/50")),
            format!("user N0CALL-10 pass 13023 vers aprs-node {} filter m/50\r\n", version)
        );
        assert_eq!(
            login_line("N0CALL-10", -1, Some("  ")),
            format!("user N0CALL-10 pass -1 vers aprs-node {}\r\n", version)
        );
    }

    #[test]
    fn server_lines() {
        assert_eq!(
            parse_server_line("# logresp N0CALL verified, server T2POLAND"),
            Some(ServerLine::LogResp { verified: true })
        );
        assert_eq!(
            parse_server_line("# logresp N0CALL unverified, server T2POLAND"),
            Some(ServerLine::LogResp { verified: false })
        );
        assert_eq!(
            parse_server_line("# aprsc 2.1.14-g5e22b37"),
            Some(ServerLine::Comment)
        );
        assert_eq!(parse_server_line("N0CALL>APRS:>hi"), None);
    }
}
