// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Report timestamps: `HHMMSSh`, `DDHHMMz` and `DDHHMM/`.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use aprs_core::ReportTime;

use crate::error::DecodeError;

/// Permanent object marker.
const TIMELESS: &str = "111111z";

/// Timestamps further ahead of the receive time than this are taken to be
/// from the previous day.
const MAX_AHEAD_HOURS: i64 = 2;

/// True if `field` has the shape of a 7-character timestamp.
pub fn looks_like_timestamp(field: &str) -> bool {
    let b = field.as_bytes();
    b.len() >= 7 && b[..6].iter().all(u8::is_ascii_digit) && matches!(b[6], b'z' | b'h' | b'/')
}

/// Parse a timestamp relative to `now`. Malformed values are logged and
/// fall back to `now`.
pub fn parse_timestamp(field: &str, now: DateTime<Utc>) -> ReportTime {
    match try_parse(field, now) {
        Ok(time) => time,
        Err(e) => {
            warn!("Bad timestamp '{}': {}", field, e);
            ReportTime::At(now)
        }
    }
}

fn try_parse(field: &str, now: DateTime<Utc>) -> Result<ReportTime, DecodeError> {
    if field == TIMELESS {
        return Ok(ReportTime::Timeless);
    }
    let b = field.as_bytes();
    if b.len() != 7 || !b[..6].iter().all(u8::is_ascii_digit) {
        return Err(DecodeError::malformed("timestamp", field));
    }
    let pair = |i: usize| i64::from(b[i] - b'0') * 10 + i64::from(b[i + 1] - b'0');
    let (a, m, c) = (pair(0), pair(2), pair(4));

    match b[6] {
        b'h' => {
            if a > 24 || m > 59 || c > 59 {
                return Err(DecodeError::OutOfRange("time of day"));
            }
            let midnight = now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .ok_or(DecodeError::OutOfRange("date"))?;
            let mut t = midnight + Duration::hours(a) + Duration::minutes(m) + Duration::seconds(c);
            if t - now.naive_utc() > Duration::hours(MAX_AHEAD_HOURS) {
                t -= Duration::days(1);
            }
            Ok(ReportTime::At(Utc.from_utc_datetime(&t)))
        }
        b'z' => {
            let t = resolve_day(a, m, c, now.naive_utc())?;
            Ok(ReportTime::At(Utc.from_utc_datetime(&t)))
        }
        b'/' => {
            let t = resolve_day(a, m, c, now.with_timezone(&Local).naive_local())?;
            let local = Local
                .from_local_datetime(&t)
                .earliest()
                .ok_or(DecodeError::OutOfRange("local time"))?;
            Ok(ReportTime::At(local.with_timezone(&Utc)))
        }
        _ => Err(DecodeError::malformed("timestamp", field)),
    }
}

/// Place day-of-month/hour/minute relative to `reference`: a day after
/// today means last month, and a time well ahead of `reference` on the same
/// day means yesterday.
fn resolve_day(
    day: i64,
    hour: i64,
    minute: i64,
    reference: NaiveDateTime,
) -> Result<NaiveDateTime, DecodeError> {
    if !(1..=31).contains(&day) {
        return Err(DecodeError::OutOfRange("day"));
    }
    if hour > 24 || minute > 59 {
        return Err(DecodeError::OutOfRange("time of day"));
    }

    let today = reference.date();
    let (mut year, mut month) = (today.year(), today.month());
    let day = day as u32;
    if day > today.day() {
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(DecodeError::OutOfRange("day"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or(DecodeError::OutOfRange("date"))?;
    let mut t = midnight + Duration::hours(hour) + Duration::minutes(minute);
    if day == today.day() && t - reference > Duration::hours(MAX_AHEAD_HOURS) {
        t -= Duration::days(1);
    }
    Ok(t)
}
