// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Position reports (`!`, `=`, `@`, `/`) and the shared position body used by
//! objects and items.

use chrono::{DateTime, Utc};

use aprs_core::{Position, PositionReport, ReportTime};

use crate::comment;
use crate::compressed;
use crate::error::DecodeError;
use crate::round6;
use crate::timestamp::parse_timestamp;
use crate::weather;

const UNCOMPRESSED_LEN: usize = 19;

/// Digit positions blanked by each ambiguity level, rightmost first.
pub(crate) const LAT_DIGITS: [usize; 4] = [6, 5, 3, 2];
pub(crate) const LON_DIGITS: [usize; 4] = [7, 6, 4, 3];

pub(crate) fn decode(report: &str, now: DateTime<Utc>) -> Result<PositionReport, DecodeError> {
    let (messaging, time, body) = match report.as_bytes().first() {
        Some(b'!') => (false, ReportTime::Received, &report[1..]),
        Some(b'=') => (true, ReportTime::Received, &report[1..]),
        Some(tag @ (b'@' | b'/')) => {
            let ts = report
                .get(1..8)
                .ok_or(DecodeError::Truncated("timestamp"))?;
            let body = report.get(8..).ok_or(DecodeError::Truncated("position"))?;
            (*tag == b'@', parse_timestamp(ts, now), body)
        }
        _ => return Err(DecodeError::malformed("position type", report)),
    };

    let mut pos = decode_body(body, now)?;
    pos.time = time;
    pos.messaging = messaging;
    Ok(pos)
}

/// Decode a position body (uncompressed or compressed) followed by comment.
pub(crate) fn decode_body(body: &str, now: DateTime<Utc>) -> Result<PositionReport, DecodeError> {
    let first = body
        .as_bytes()
        .first()
        .ok_or(DecodeError::Truncated("position"))?;

    let (mut report, rest, has_course) = if first.is_ascii_digit() || *first == b' ' {
        let (report, rest) = decode_uncompressed(body)?;
        (report, rest, false)
    } else {
        let (report, rest) = compressed::decode(body)?;
        let has_course = report.course.is_some() || report.speed.is_some();
        (report, rest, has_course)
    };

    let rest = if report.is_weather_station() {
        let (wx, rest) = weather::parse(rest, wind_from_course(&report));
        report.weather = Some(wx);
        if has_course {
            report.course = None;
            report.speed = None;
        }
        rest
    } else {
        rest
    };

    let allow_course = !has_course && !report.is_weather_station();
    comment::apply(&mut report, rest, now, allow_course);
    Ok(report)
}

/// Compressed weather reports carry wind in the course/speed bytes.
fn wind_from_course(report: &PositionReport) -> Option<(u16, f64)> {
    Some((report.course.unwrap_or(0), report.speed? / 3.6))
}

/// `DDMM.hhN/DDDMM.hhW$` with optional ambiguity blanks.
fn decode_uncompressed(body: &str) -> Result<(PositionReport, &str), DecodeError> {
    let b = body.as_bytes();
    if b.len() < UNCOMPRESSED_LEN {
        return Err(DecodeError::Truncated("uncompressed position"));
    }
    // Latin-1 bytes arrive as multi-byte chars and shift every offset.
    if !b[..UNCOMPRESSED_LEN].is_ascii() {
        return Err(DecodeError::malformed(
            "coordinate",
            &String::from_utf8_lossy(&b[..UNCOMPRESSED_LEN]),
        ));
    }
    let mut lat = [0u8; 8];
    lat.copy_from_slice(&b[..8]);
    let mut lon = [0u8; 9];
    lon.copy_from_slice(&b[9..18]);

    let ambiguity = LAT_DIGITS.iter().filter(|&&i| lat[i] == b' ').count();
    fill_ambiguity(&mut lat, &LAT_DIGITS, ambiguity);
    fill_ambiguity(&mut lon, &LON_DIGITS, ambiguity);

    let latitude = parse_coord(&lat, 2, b'N', b'S', 90.0, &body[..8])?;
    let longitude = parse_coord(&lon, 3, b'E', b'W', 180.0, &body[9..18])?;

    let mut report = PositionReport::new(
        Position::new(latitude, longitude),
        b[8] as char,
        b[18] as char,
    );
    report.ambiguity = ambiguity as u8;
    Ok((report, &body[UNCOMPRESSED_LEN..]))
}

/// Replace the `level` rightmost digits: the leftmost of them by `5`, the
/// rest by `0`.
fn fill_ambiguity(field: &mut [u8], digits: &[usize; 4], level: usize) {
    let blanked = &digits[..level.min(4)];
    for (n, &i) in blanked.iter().rev().enumerate() {
        field[i] = if n == 0 { b'5' } else { b'0' };
    }
}

/// `field` is `D..DMM.hhH` with `deg_len` degree digits and blanks already
/// filled in.
fn parse_coord(
    field: &[u8],
    deg_len: usize,
    pos_hemi: u8,
    neg_hemi: u8,
    max_deg: f64,
    raw: &str,
) -> Result<f64, DecodeError> {
    let malformed = || DecodeError::malformed("coordinate", raw);
    let dot = deg_len + 2;
    let (hemi, digits) = field.split_last().ok_or_else(malformed)?;
    if digits.len() != dot + 3 || digits[dot] != b'.' {
        return Err(malformed());
    }
    let numeric = digits
        .iter()
        .enumerate()
        .all(|(i, c)| i == dot || c.is_ascii_digit());
    if !numeric {
        return Err(malformed());
    }

    let number = |range: std::ops::Range<usize>| {
        digits[range]
            .iter()
            .fold(0u32, |acc, c| acc * 10 + u32::from(c - b'0'))
    };
    let deg = f64::from(number(0..deg_len));
    let min = f64::from(number(deg_len..dot)) + f64::from(number(dot + 1..dot + 3)) / 100.0;
    if min >= 60.0 {
        return Err(DecodeError::OutOfRange("minutes"));
    }
    let value = deg + min / 60.0;
    if value > max_deg {
        return Err(DecodeError::OutOfRange("coordinate"));
    }
    match hemi.to_ascii_uppercase() {
        h if h == pos_hemi => Ok(round6(value)),
        h if h == neg_hemi => Ok(round6(-value)),
        _ => Err(DecodeError::malformed("hemisphere", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aprs_core::PositionEncoding;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_plain_position() {
        let report = decode("!4903.50N/07201.75W-Test 001234", now()).unwrap();
        assert!((report.position.latitude - 49.058333).abs() < 1e-6);
        assert!((report.position.longitude - -72.029167).abs() < 1e-6);
        assert_eq!(report.symbol_table, '/');
        assert_eq!(report.symbol, '-');
        assert_eq!(report.ambiguity, 0);
        assert_eq!(report.comment, "Test 001234");
        assert!(!report.messaging);
        assert_eq!(report.time, ReportTime::Received);
        assert_eq!(report.encoding, PositionEncoding::Uncompressed);
    }

    #[test]
    fn test_timestamped_messaging_position() {
        let report = decode("@092345z4903.50S/07201.75E>088/036", now()).unwrap();
        assert!(report.messaging);
        assert!(report.position.latitude < 0.0);
        assert!(report.position.longitude > 0.0);
        assert_eq!(
            report.time,
            ReportTime::At(Utc.with_ymd_and_hms(2024, 5, 9, 23, 45, 0).unwrap())
        );
        assert_eq!(report.course, Some(88));
        assert!((report.speed.unwrap() - 36.0 * 1.852).abs() < 1e-9);
    }

    #[test]
    fn test_ambiguity_level_one() {
        let report = decode("!4903.5 N/07201.75W-", now()).unwrap();
        assert_eq!(report.ambiguity, 1);
        let expected_lat = 49.0 + 3.55 / 60.0;
        assert!((report.position.latitude - expected_lat).abs() < 1e-6);
        // Same precision applied to longitude.
        let expected_lon = -(72.0 + 1.75 / 60.0);
        assert!((report.position.longitude - expected_lon).abs() < 1e-6);
    }

    #[test]
    fn test_ambiguity_levels_round_trip() {
        let cases = [
            ("4903.50N/07201.75W", 0, 49.0 + 3.50 / 60.0),
            ("4903.  N/07201.  W", 2, 49.0 + 3.50 / 60.0),
            ("490 .  N/0720 .  W", 3, 49.0 + 5.0 / 60.0),
            ("49  .  N/072  .  W", 4, 49.0 + 50.0 / 60.0),
        ];
        for (body, level, lat) in cases {
            let report = decode(&format!("!{}-", body), now()).unwrap();
            assert_eq!(report.ambiguity, level, "{}", body);
            assert!((report.position.latitude - lat).abs() < 1e-6, "{}", body);
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(
            decode("!9103.50N/07201.75W-", now()),
            Err(DecodeError::OutOfRange("coordinate"))
        );
        assert_eq!(
            decode("!4963.50N/07201.75W-", now()),
            Err(DecodeError::OutOfRange("minutes"))
        );
        assert!(decode("!4903.50X/07201.75W-", now()).is_err());
        assert!(decode("!49O3.50N/07201.75W-", now()).is_err());
        assert!(decode("!4903.50N/0720", now()).is_err());
    }

    #[test]
    fn test_signs_in_coordinate_rejected() {
        for report in [
            "!49-3.50N/07201.75W-",
            "!+903.50N/07201.75W-",
            "!4903.50N/+7201.75W-",
            "!4903.-5N/07201.75W-",
            "!4903,50N/07201.75W-",
        ] {
            assert!(
                matches!(decode(report, now()), Err(DecodeError::Malformed { .. })),
                "{}",
                report
            );
        }
    }

    #[test]
    fn test_latin1_in_fixed_fields_is_an_error() {
        let body = "4903.50N/07201.75W-".to_string();
        for offset in [4, 7, 8] {
            let mut report = String::from("!");
            report.push_str(&body[..offset]);
            report.push('\u{e9}');
            report.push_str(&body[offset + 1..]);
            assert!(decode(&report, now()).is_err(), "{}", report);
        }
        assert!(decode("!4903.50\u{e9}07201.75W-", now()).is_err());
        assert!(decode("@092345z4903.5\u{e9}N/07201.75W-", now()).is_err());
        // Latin-1 in the comment is fine.
        let report = decode("!4903.50N/07201.75W-caf\u{e9}", now()).unwrap();
        assert_eq!(report.comment, "caf\u{e9}");
    }

    #[test]
    fn test_compressed_dispatch() {
        let report = decode("=/5L!!<*e7>7P[", now()).unwrap();
        assert!(report.messaging);
        assert_eq!(report.course, Some(88));
    }

    #[test]
    fn test_weather_station_position() {
        let report = decode(
            "!4903.50N/07201.75W_220/004g005t077r000p000P000h50b09900wRSW",
            now(),
        )
        .unwrap();
        let wx = report.weather.unwrap();
        assert_eq!(wx.wind_direction, Some(220));
        assert!((wx.temperature.unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(report.course, None);
        assert_eq!(report.comment, "wRSW");
    }
}
