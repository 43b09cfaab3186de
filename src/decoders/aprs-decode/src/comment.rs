// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Position comment extensions.
//!
//! Applied in order: course/speed, PHG, RNG, `/#` extra reports, `/A=`
//! altitude and `|..|` telemetry. Whatever is left becomes the comment.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use aprs_core::{ExtraPosition, Phg, Position, PositionReport, Telemetry};

use crate::{knots_to_kmh, round6, FEET_TO_M, MILES_TO_KM};

const EXTRA_TAG: &str = "/#";
const EXTRA_LEN: usize = 16;

pub(crate) fn apply(
    report: &mut PositionReport,
    text: &str,
    now: DateTime<Utc>,
    allow_course_speed: bool,
) {
    let mut text = text;
    if allow_course_speed {
        text = course_speed(report, text);
    }
    text = phg(report, text);
    text = rng(report, text);

    let mut rest = extra_reports(report, text, now);
    rest = altitude(report, &rest);
    rest = telemetry(report, &rest);

    let mut comment = rest.trim().to_string();
    if let Some(phg) = &report.phg {
        let suffix = phg_summary(phg);
        if comment.is_empty() {
            comment = suffix;
        } else {
            comment = format!("{} {}", comment, suffix);
        }
    }
    report.comment = comment;
}

/// `DDD/SSS` course in degrees and speed in knots.
fn course_speed<'a>(report: &mut PositionReport, text: &'a str) -> &'a str {
    if text.as_bytes().get(3) != Some(&b'/') {
        return text;
    }
    let (Some(course), Some(speed)) = (text.get(..3), text.get(4..7)) else {
        return text;
    };
    let placeholder = |s: &str| s.bytes().all(|c| c == b'.' || c == b' ');
    if placeholder(course) && placeholder(speed) {
        return &text[7..];
    }
    let (Ok(course), Ok(speed)) = (course.parse::<u16>(), speed.parse::<u16>()) else {
        return text;
    };
    if (1..=360).contains(&course) {
        report.course = Some(course);
    }
    report.speed = Some(knots_to_kmh(f64::from(speed)));
    &text[7..]
}

/// `PHGphgd`: power p² W, height 10·2^h ft, gain g dB, directivity d·45°.
fn phg<'a>(report: &mut PositionReport, text: &'a str) -> &'a str {
    let Some(field) = text.strip_prefix("PHG").and_then(|t| t.get(..4)) else {
        return text;
    };
    let b = field.as_bytes();
    if !b[0].is_ascii_digit() || b[1] < b'0' || !b[2].is_ascii_digit() || !b[3].is_ascii_digit() {
        return text;
    }
    let p = u32::from(b[0] - b'0');
    let h = u32::from(b[1] - b'0');
    let g = u32::from(b[2] - b'0');
    let d = u16::from(b[3] - b'0');
    if d > 8 || h > 28 {
        return text;
    }

    let power_w = p * p;
    let height_ft = 10 * 2u32.pow(h);
    let gain_term = (f64::from(power_w) / 10.0 * f64::from(g) / 2.0).sqrt();
    let miles = (2.0 * f64::from(height_ft) * gain_term).sqrt();
    report.phg = Some(Phg {
        power_w,
        height_ft,
        gain_db: g,
        directivity: (d > 0).then_some(d * 45),
        range_km: miles * MILES_TO_KM,
    });
    &text[7..]
}

/// `RNGrrrr`: omni range in miles.
fn rng<'a>(report: &mut PositionReport, text: &'a str) -> &'a str {
    let Some(field) = text.strip_prefix("RNG").and_then(|t| t.get(..4)) else {
        return text;
    };
    match field.parse::<u32>() {
        Ok(miles) => {
            report.range_km = Some(f64::from(miles) * MILES_TO_KM);
            &text[7..]
        }
        Err(_) => text,
    }
}

/// Decode and remove every `/#` + 16 character extra report.
fn extra_reports(report: &mut PositionReport, text: &str, now: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(EXTRA_TAG) {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + EXTRA_TAG.len()..];
        match after.get(..EXTRA_LEN).and_then(|f| decode_extra(report, f, now)) {
            Some(extra) => {
                report.extra.push(extra);
                rest = &after[EXTRA_LEN..];
            }
            None => {
                out.push_str(EXTRA_TAG);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_extra(report: &PositionReport, field: &str, now: DateTime<Utc>) -> Option<ExtraPosition> {
    let b = field.as_bytes();
    let dt = base64_signed(&b[..4])?;
    let dlat = base64_signed(&b[4..10])?;
    let dlon = base64_signed(&b[10..16])?;

    let position = Position::new(
        round6(report.position.latitude + dlat as f64 * 1e-6),
        round6(report.position.longitude + dlon as f64 * 1e-6),
    );
    if !position.is_valid() {
        warn!("Extra report out of range: '{}'", field);
        return None;
    }
    Some(ExtraPosition {
        position,
        time: report.time.resolve(now) + Duration::seconds(dt),
    })
}

/// Digits `'0'..='o'` (0..63), offset-binary around 64^n / 2.
fn base64_signed(digits: &[u8]) -> Option<i64> {
    let value = digits.iter().try_fold(0i64, |acc, &c| {
        if !(b'0'..=b'o').contains(&c) {
            return None;
        }
        Some(acc * 64 + i64::from(c - b'0'))
    })?;
    Some(value - 64i64.pow(digits.len() as u32) / 2)
}

/// `/A=NNNNNN` altitude in feet, anywhere in the comment.
fn altitude(report: &mut PositionReport, text: &str) -> String {
    let Some(idx) = text.find("/A=") else {
        return text.to_string();
    };
    let Some(field) = text.get(idx + 3..idx + 9) else {
        return text.to_string();
    };
    match field.trim_start().parse::<i32>() {
        Ok(feet) => {
            if report.altitude.is_none() {
                report.altitude = Some(f64::from(feet) * FEET_TO_M);
            }
            format!("{}{}", &text[..idx], &text[idx + 9..])
        }
        Err(_) => {
            warn!("Bad altitude '{}'", field);
            text.to_string()
        }
    }
}

/// `|ss1122..|`: base-91 sequence, up to five analog values and an
/// optional digital byte.
fn telemetry(report: &mut PositionReport, text: &str) -> String {
    let Some(start) = text.find('|') else {
        return text.to_string();
    };
    let Some(len) = text[start + 1..].find('|') else {
        return text.to_string();
    };
    let inner = &text[start + 1..start + 1 + len];
    let b = inner.as_bytes();
    if !(4..=14).contains(&b.len())
        || b.len() % 2 != 0
        || !b.iter().all(|c| (33..=123).contains(c))
    {
        return text.to_string();
    }
    let pair = |i: usize| u16::from(b[i] - 33) * 91 + u16::from(b[i + 1] - 33);
    let mut values: Vec<u16> = (0..b.len()).step_by(2).map(pair).collect();
    let sequence = values.remove(0);
    let digital = if values.len() > 5 {
        values.pop().map(|v| (v & 0xFF) as u8)
    } else {
        None
    };
    report.telemetry = Some(Telemetry {
        sequence,
        analog: values,
        digital,
    });
    format!("{}{}", &text[..start], &text[start + len + 2..])
}

fn phg_summary(phg: &Phg) -> String {
    format!(
        "(PHG {} W, {} dBi, {}, range {:.1} km)",
        phg.power_w,
        phg.gain_db,
        direction_name(phg.directivity),
        phg.range_km
    )
}

fn direction_name(dir: Option<u16>) -> &'static str {
    match dir {
        None => "omni",
        Some(45) => "NE",
        Some(90) => "E",
        Some(135) => "SE",
        Some(180) => "S",
        Some(225) => "SW",
        Some(270) => "W",
        Some(315) => "NW",
        Some(_) => "N",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aprs_core::ReportTime;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn report() -> PositionReport {
        PositionReport::new(Position::new(60.0, 10.0), '/', '>')
    }

    #[test]
    fn test_course_speed() {
        let mut r = report();
        apply(&mut r, "088/036/A=001234 hello", now(), true);
        assert_eq!(r.course, Some(88));
        assert!((r.speed.unwrap() - 36.0 * 1.852).abs() < 1e-9);
        assert!((r.altitude.unwrap() - 1234.0 * 0.3048).abs() < 1e-9);
        assert_eq!(r.comment, "hello");
    }

    #[test]
    fn test_course_speed_placeholders_and_disabled() {
        let mut r = report();
        apply(&mut r, ".../...rest", now(), true);
        assert_eq!(r.course, None);
        assert_eq!(r.comment, "rest");

        let mut r = report();
        apply(&mut r, "088/036", now(), false);
        assert_eq!(r.course, None);
        assert_eq!(r.comment, "088/036");
    }

    #[test]
    fn test_phg() {
        let mut r = report();
        apply(&mut r, "PHG5132Digi", now(), true);
        let phg = r.phg.clone().unwrap();
        assert_eq!(phg.power_w, 25);
        assert_eq!(phg.height_ft, 20);
        assert_eq!(phg.gain_db, 3);
        assert_eq!(phg.directivity, Some(90));
        let miles = (2.0f64 * 20.0 * (25.0f64 / 10.0 * 3.0 / 2.0).sqrt()).sqrt();
        assert!((phg.range_km - miles * MILES_TO_KM).abs() < 1e-9);
        assert!(r.comment.starts_with("Digi (PHG 25 W, 3 dBi, E, range"));
    }

    #[test]
    fn test_phg_directions_named() {
        assert_eq!(direction_name(Some(315)), "NW");
        assert_eq!(direction_name(Some(360)), "N");
        assert_eq!(direction_name(None), "omni");
    }

    #[test]
    fn test_rng() {
        let mut r = report();
        apply(&mut r, "RNG0050 wide", now(), true);
        assert!((r.range_km.unwrap() - 50.0 * MILES_TO_KM).abs() < 1e-9);
        assert_eq!(r.comment, "wide");
    }

    #[test]
    fn test_extra_reports() {
        let mut r = report();
        r.time = ReportTime::At(now());
        // Zero deltas: 'P' is 32, so "P000" is 64^4 / 2.
        let centre4 = "P000";
        let centre6 = "P00000";
        let field = format!("/#{}{}{}", centre4, centre6, centre6);
        apply(&mut r, &format!("a{}b{}c", field, field), now(), true);
        assert_eq!(r.extra.len(), 2);
        assert_eq!(r.extra[0].position, r.position);
        assert_eq!(r.extra[0].time, now());
        assert_eq!(r.comment, "abc");
    }

    #[test]
    fn test_extra_report_deltas() {
        let mut r = report();
        r.time = ReportTime::At(now());
        // +1 s, +1e-6 deg lat, -1e-6 deg lon
        let field = "/#P001P00001Oooooo";
        apply(&mut r, field, now(), true);
        let extra = &r.extra[0];
        assert_eq!(extra.time, now() + Duration::seconds(1));
        assert!((extra.position.latitude - 60.000001).abs() < 1e-9);
        assert!((extra.position.longitude - 9.999999).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_extra_kept_in_comment() {
        let mut r = report();
        apply(&mut r, "x/#zzzz", now(), true);
        assert!(r.extra.is_empty());
        assert_eq!(r.comment, "x/#zzzz");
    }

    #[test]
    fn test_telemetry() {
        let mut r = report();
        apply(&mut r, "hi |!!!\"!#!$!%!&'!| there", now(), true);
        let t = r.telemetry.clone().unwrap();
        assert_eq!(t.sequence, 0);
        assert_eq!(t.analog, vec![1, 2, 3, 4, 5]);
        assert_eq!(t.digital, Some(34));
        assert_eq!(r.comment, "hi  there");
    }
}
