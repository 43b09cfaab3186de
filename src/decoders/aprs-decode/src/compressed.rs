// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Compressed (base-91) positions: `TYYYYXXXXScst`.

use aprs_core::{Position, PositionEncoding, PositionReport};

use crate::error::DecodeError;
use crate::{knots_to_kmh, round6, MILES_TO_KM};

pub(crate) const COMPRESSED_LEN: usize = 13;

/// Decode a compressed position. Returns the report and the remaining
/// comment text.
pub(crate) fn decode(body: &str) -> Result<(PositionReport, &str), DecodeError> {
    let b = body.as_bytes();
    if b.len() < COMPRESSED_LEN {
        return Err(DecodeError::Truncated("compressed position"));
    }
    if !b[..COMPRESSED_LEN].is_ascii() {
        return Err(DecodeError::malformed(
            "compressed position",
            &String::from_utf8_lossy(&b[..COMPRESSED_LEN]),
        ));
    }

    let lat_val = base91(&b[1..5]).ok_or_else(|| DecodeError::malformed("latitude", &body[1..5]))?;
    let lon_val = base91(&b[5..9]).ok_or_else(|| DecodeError::malformed("longitude", &body[5..9]))?;
    let latitude = 90.0 - lat_val as f64 / 380926.0;
    let longitude = -180.0 + lon_val as f64 / 190463.0;
    let position = Position::new(round6(latitude), round6(longitude));
    if !position.is_valid() {
        return Err(DecodeError::OutOfRange("compressed position"));
    }

    let mut report = PositionReport::new(position, symbol_table(b[0]), b[9] as char);
    report.encoding = PositionEncoding::Compressed;

    let (c, s, t) = (b[10], b[11], b[12]);
    if c != b' ' {
        let cs_type = t.wrapping_sub(33);
        if cs_type & 0x18 == 0x10 {
            // GGA source: cs carries altitude.
            let cs = f64::from(c.wrapping_sub(33)) * 91.0 + f64::from(s.wrapping_sub(33));
            report.altitude = Some(1.002f64.powf(cs) * 0.3048);
        } else if c == b'{' {
            let miles = 2.0 * 1.08f64.powi(i32::from(s) - 33);
            report.range_km = Some(miles * MILES_TO_KM);
        } else if (33..=122).contains(&c) {
            let course = u16::from(c - 33) * 4;
            if course > 0 {
                report.course = Some(course);
            }
            let knots = 1.08f64.powi(i32::from(s) - 33) - 1.0;
            report.speed = Some(knots_to_kmh(knots));
        }
    }

    Ok((report, &body[COMPRESSED_LEN..]))
}

fn base91(digits: &[u8]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, &d| {
        if !(33..=123).contains(&d) {
            return None;
        }
        Some(acc * 91 + u32::from(d - 33))
    })
}

/// `a`..`j` overlays stand for digits `0`..`9`.
fn symbol_table(c: u8) -> char {
    match c {
        b'a'..=b'j' => (c - b'a' + b'0') as char,
        _ => c as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_fixture() {
        let (report, rest) = decode("/5L!!<*e7>7P[ comment").unwrap();
        assert!((report.position.latitude - 49.5).abs() < 1e-4);
        assert!((report.position.longitude - -72.75).abs() < 1e-4);
        assert_eq!(report.symbol_table, '/');
        assert_eq!(report.symbol, '>');
        assert_eq!(report.course, Some(88));
        let speed = report.speed.unwrap();
        assert!((speed - 67.1).abs() < 0.2, "speed {}", speed);
        assert_eq!(report.encoding, PositionEncoding::Compressed);
        assert_eq!(rest, " comment");
    }

    #[test]
    fn test_altitude_cs() {
        // cs type with GGA source bits, cs "S]" = (50*91 + 60) -> 1.002^4610 ft
        let (report, _) = decode("/5L!!<*e7>S]1").unwrap();
        let feet = 1.002f64.powf(4610.0);
        assert!((report.altitude.unwrap() - feet * 0.3048).abs() < 0.01);
        assert_eq!(report.course, None);
    }

    #[test]
    fn test_range_cs() {
        let (report, _) = decode("/5L!!<*e7>{?!").unwrap();
        let km = 2.0 * 1.08f64.powi(30) * MILES_TO_KM;
        assert!((report.range_km.unwrap() - km).abs() < 0.01);
    }

    #[test]
    fn test_no_cs_data() {
        let (report, _) = decode("\\5L!!<*e7_   ").unwrap();
        assert_eq!(report.course, None);
        assert_eq!(report.speed, None);
        assert_eq!(report.symbol_table, '\\');
    }

    #[test]
    fn test_overlay_and_errors() {
        let (report, _) = decode("c5L!!<*e7>7P[").unwrap();
        assert_eq!(report.symbol_table, '2');
        assert!(decode("/5L!!<*e").is_err());
        assert!(decode("/5L\u{7f}!<*e7>7P[").is_err());
    }

    #[test]
    fn test_latin1_in_fixed_fields_is_an_error() {
        for report in ["/5L!\u{e9}<*e7>7P[", "/5L!!<*\u{e9}>7P[", "/5L!!<*e\u{e9}7P["] {
            assert!(
                matches!(decode(report), Err(DecodeError::Malformed { .. })),
                "{}",
                report
            );
        }
        let (report, rest) = decode("/5L!!<*e7>7P[\u{e9}t\u{e9}").unwrap();
        assert_eq!(report.course, Some(88));
        assert_eq!(rest, "\u{e9}t\u{e9}");
    }
}
