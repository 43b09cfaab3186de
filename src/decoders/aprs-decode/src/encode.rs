// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Position encoders, the inverse of the uncompressed and Mic-E decoders.
//!
//! Both take a [`PositionReport`] and honour its `ambiguity`, `course`,
//! `speed` and symbol fields. Coordinates are rounded to hundredths of a
//! minute.

use aprs_core::{Position, PositionReport};

use crate::error::DecodeError;
use crate::mic_e::STD_MESSAGES;
use crate::position::{LAT_DIGITS, LON_DIGITS};
use crate::KNOTS_TO_KMH;

/// Hundredths of a minute in one degree.
const HUNDREDTHS_PER_DEG: f64 = 6000.0;

/// Degrees, minutes and hundredths of `value`, rounded to the nearest
/// hundredth of a minute.
fn dmh(value: f64) -> (u32, u32, u32) {
    let total = (value.abs() * HUNDREDTHS_PER_DEG).round() as u32;
    (total / 6000, total % 6000 / 100, total % 100)
}

fn check(report: &PositionReport) -> Result<(), DecodeError> {
    if !report.position.is_valid() {
        return Err(DecodeError::OutOfRange("coordinate"));
    }
    if report.ambiguity > 4 {
        return Err(DecodeError::OutOfRange("ambiguity"));
    }
    Ok(())
}

fn blank(field: &mut [u8], digits: &[usize; 4], level: u8) {
    for &i in &digits[..usize::from(level)] {
        field[i] = b' ';
    }
}

fn knots(report: &PositionReport) -> u32 {
    report
        .speed
        .map(|kmh| (kmh / KNOTS_TO_KMH).round().max(0.0) as u32)
        .unwrap_or(0)
}

/// Uncompressed body `DDMM.hhN/DDDMM.hhW$`, followed by `CSE/SPD` when the
/// report carries a course or speed. The type tag is left to the caller.
pub fn uncompressed(report: &PositionReport) -> Result<String, DecodeError> {
    check(report)?;
    let Position {
        latitude,
        longitude,
    } = report.position;

    let (d, m, h) = dmh(latitude);
    let ns = if latitude < 0.0 { 'S' } else { 'N' };
    let mut lat = format!("{:02}{:02}.{:02}{}", d, m, h, ns).into_bytes();
    let (d, m, h) = dmh(longitude);
    let ew = if longitude < 0.0 { 'W' } else { 'E' };
    let mut lon = format!("{:03}{:02}.{:02}{}", d, m, h, ew).into_bytes();
    blank(&mut lat, &LAT_DIGITS, report.ambiguity);
    blank(&mut lon, &LON_DIGITS, report.ambiguity);

    let mut out = String::with_capacity(26);
    out.extend(lat.into_iter().map(char::from));
    out.push(report.symbol_table);
    out.extend(lon.into_iter().map(char::from));
    out.push(report.symbol);
    if report.course.is_some() || report.speed.is_some() {
        let speed = knots(report);
        if speed > 999 {
            return Err(DecodeError::OutOfRange("speed"));
        }
        out.push_str(&format!("{:03}/{:03}", report.course.unwrap_or(0).min(360), speed));
    }
    Ok(out)
}

/// Mic-E destination callsign and information field.
///
/// The message code is taken from `mic_e_status` when it names a standard
/// message, else "Off Duty" is sent. Latitude digits are blanked from the
/// right by `ambiguity`; longitude is always sent in full.
pub fn mic_e(report: &PositionReport) -> Result<(String, String), DecodeError> {
    check(report)?;
    let Position {
        latitude,
        longitude,
    } = report.position;

    let (d, m, h) = dmh(latitude);
    let lat_digits = [d / 10, d % 10, m / 10, m % 10, h / 10, h % 10];
    let (lon_deg, lon_min, lon_hund) = dmh(longitude);
    if lon_deg >= 180 {
        return Err(DecodeError::OutOfRange("Mic-E position"));
    }

    let message = report
        .mic_e_status
        .as_deref()
        .and_then(|s| STD_MESSAGES.iter().position(|m| m.eq_ignore_ascii_case(s)))
        .unwrap_or(STD_MESSAGES.len() - 1);
    let flags = [
        message & 0b100 != 0,
        message & 0b010 != 0,
        message & 0b001 != 0,
        latitude >= 0.0,
        !(10..100).contains(&lon_deg),
        longitude < 0.0,
    ];
    let first_blank = 6 - usize::from(report.ambiguity);
    let destination: String = lat_digits
        .iter()
        .zip(flags)
        .enumerate()
        .map(|(i, (&digit, flag))| {
            let digit = digit as u8;
            match (i >= first_blank, flag) {
                (true, true) => 'Z',
                (true, false) => 'L',
                (false, true) => char::from(b'P' + digit),
                (false, false) => char::from(b'0' + digit),
            }
        })
        .collect();

    let lon_byte = match lon_deg {
        0..=9 => lon_deg + 118,
        10..=99 => lon_deg + 28,
        100..=109 => lon_deg + 8,
        _ => lon_deg - 72,
    };
    let min_byte = if lon_min < 10 { lon_min + 88 } else { lon_min + 28 };

    let speed = knots(report);
    if speed >= 800 {
        return Err(DecodeError::OutOfRange("speed"));
    }
    let course = u32::from(report.course.unwrap_or(0).min(360));
    let sp = if speed < 200 { speed / 10 + 108 } else { speed / 10 + 28 };
    let dc = speed % 10 * 10 + course / 100 + 32;
    let se = course % 100 + 28;

    let mut info = String::with_capacity(9);
    info.push('`');
    for b in [lon_byte, min_byte, lon_hund + 28, sp, dc, se] {
        info.push(char::from(b as u8));
    }
    info.push(report.symbol);
    info.push(report.symbol_table);
    Ok((destination, info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mic_e::decode as decode_mic_e;
    use crate::position::decode as decode_position;
    use aprs_core::PositionEncoding;
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn report(lat: f64, lon: f64, ambiguity: u8) -> PositionReport {
        let mut report = PositionReport::new(Position::new(lat, lon), '/', '>');
        report.ambiguity = ambiguity;
        report
    }

    /// Hundredths of a minute covered by one step at each ambiguity level.
    const CELL: [u32; 5] = [1, 10, 100, 1000, 6000];

    fn assert_in_cell(original: f64, decoded: f64, ambiguity: u8) {
        assert_eq!(original < 0.0, decoded < 0.0, "{} {}", original, decoded);
        let cell = CELL[usize::from(ambiguity)];
        let total = (original.abs() * HUNDREDTHS_PER_DEG).round() as u32;
        let low = total - total % cell;
        let got = (decoded.abs() * HUNDREDTHS_PER_DEG).round() as u32;
        assert!(
            (low..low + cell).contains(&got),
            "{} decoded as {} at ambiguity {}",
            original,
            decoded,
            ambiguity
        );
    }

    #[test]
    fn test_uncompressed_round_trip() {
        let lats = [-89.9, -45.123456, -0.5, 0.0, 12.34567, 49.058333, 89.99];
        let lons = [-179.99, -72.029167, -5.0, 0.25, 9.87654, 105.5, 179.5];
        for &lat in &lats {
            for &lon in &lons {
                for ambiguity in 0..=4u8 {
                    let body = uncompressed(&report(lat, lon, ambiguity)).unwrap();
                    let decoded = decode_position(&format!("!{}", body), now()).unwrap();
                    assert_eq!(decoded.ambiguity, ambiguity, "{}", body);
                    assert_eq!((decoded.symbol_table, decoded.symbol), ('/', '>'));
                    assert_in_cell(lat, decoded.position.latitude, ambiguity);
                    assert_in_cell(lon, decoded.position.longitude, ambiguity);

                    // Decoded positions sit on the grid and encode the same.
                    let again = uncompressed(&report(
                        decoded.position.latitude,
                        decoded.position.longitude,
                        ambiguity,
                    ))
                    .unwrap();
                    assert_eq!(again, body);
                }
            }
        }
    }

    #[test]
    fn test_uncompressed_layout() {
        let body = uncompressed(&report(49.058333, -72.029167, 0)).unwrap();
        assert_eq!(body, "4903.50N/07201.75W>");
        let body = uncompressed(&report(49.058333, -72.029167, 2)).unwrap();
        assert_eq!(body, "4903.  N/07201.  W>");
        let body = uncompressed(&report(49.058333, -72.029167, 4)).unwrap();
        assert_eq!(body, "49  .  N/072  .  W>");

        let mut moving = report(-33.5, 151.25, 0);
        moving.course = Some(88);
        moving.speed = Some(36.0 * 1.852);
        let body = uncompressed(&moving).unwrap();
        assert_eq!(body, "3330.00S/15115.00E>088/036");
        let decoded = decode_position(&format!("={}", body), now()).unwrap();
        assert_eq!(decoded.course, Some(88));
        assert!((decoded.speed.unwrap() - 36.0 * 1.852).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_input_rejected() {
        assert!(uncompressed(&report(91.0, 0.0, 0)).is_err());
        assert!(uncompressed(&report(0.0, 0.0, 5)).is_err());
        assert!(mic_e(&report(0.0, 180.0, 0)).is_err());
        let mut fast = report(0.0, 0.0, 0);
        fast.speed = Some(900.0 * 1.852);
        assert!(mic_e(&fast).is_err());
    }

    #[test]
    fn test_mic_e_reference_fixture() {
        // 33 25.64N 112 07.74W, 20 kn, course 251, jeep, "In Service".
        let mut jeep = PositionReport::new(
            Position::new(33.0 + 25.64 / 60.0, -(112.0 + 7.74 / 60.0)),
            '/',
            'j',
        );
        jeep.course = Some(251);
        jeep.speed = Some(20.0 * 1.852);
        jeep.mic_e_status = Some("In Service".to_string());

        let (destination, info) = mic_e(&jeep).unwrap();
        assert_eq!(destination, "S3RUVT");
        assert_eq!(info, "`(_fn\"Oj/");

        let decoded = decode_mic_e(&destination, &info, now()).unwrap();
        assert_eq!(decoded.encoding, PositionEncoding::MicE);
        assert_eq!(decoded.course, Some(251));
        assert_eq!(decoded.mic_e_status.as_deref(), Some("In Service"));
        assert_in_cell(jeep.position.latitude, decoded.position.latitude, 0);
        assert_in_cell(jeep.position.longitude, decoded.position.longitude, 0);
    }

    #[test]
    fn test_mic_e_round_trip() {
        let positions = [
            (33.427333, -112.129),
            (-12.5, 5.75),
            (0.1, 100.01),
            (59.9, -179.5),
            (-89.99, 45.0),
        ];
        let speeds = [0.0, 7.0, 199.0, 200.0, 799.0];
        for (n, &(lat, lon)) in positions.iter().enumerate() {
            for ambiguity in 0..=4u8 {
                let mut sent = report(lat, lon, ambiguity);
                sent.course = Some(45 * (n as u16 + 1));
                sent.speed = Some(speeds[n] * 1.852);
                sent.mic_e_status = Some(STD_MESSAGES[n].to_string());

                let (destination, info) = mic_e(&sent).unwrap();
                let decoded = decode_mic_e(&destination, &info, now()).unwrap();
                assert_eq!(decoded.ambiguity, ambiguity, "{} {}", destination, info);
                assert_in_cell(lat, decoded.position.latitude, ambiguity);
                assert_in_cell(lon, decoded.position.longitude, 0);
                assert_eq!(decoded.course, sent.course);
                assert!((decoded.speed.unwrap() - speeds[n] * 1.852).abs() < 1e-9);
                assert_eq!(decoded.mic_e_status.as_deref(), Some(STD_MESSAGES[n]));
                assert_eq!((decoded.symbol_table, decoded.symbol), ('/', '>'));
            }
        }
    }
}
