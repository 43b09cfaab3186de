// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Mic-E positions.
//!
//! Latitude, hemisphere flags and the message code live in the six
//! destination characters; longitude, speed, course and symbol in the first
//! eight bytes of the information field.

use chrono::{DateTime, Utc};

use aprs_core::{Position, PositionEncoding, PositionReport};

use crate::comment;
use crate::error::DecodeError;
use crate::{knots_to_kmh, round6};

pub(crate) const STD_MESSAGES: [&str; 8] = [
    "Emergency",
    "Priority",
    "Special",
    "Committed",
    "Returning",
    "In Service",
    "En Route",
    "Off Duty",
];

/// One decoded destination character.
#[derive(Debug, Clone, Copy)]
struct DestChar {
    /// `None` for an ambiguity blank.
    digit: Option<u8>,
    /// Standard message bit (`P`..`Z`); also the N, +100 and W flags.
    std_bit: bool,
    /// Custom message bit (`A`..`K`).
    custom_bit: bool,
}

fn dest_char(c: u8) -> Option<DestChar> {
    let (digit, std_bit, custom_bit) = match c {
        b'0'..=b'9' => (Some(c - b'0'), false, false),
        b'A'..=b'J' => (Some(c - b'A'), false, true),
        b'K' => (None, false, true),
        b'L' => (None, false, false),
        b'P'..=b'Y' => (Some(c - b'P'), true, false),
        b'Z' => (None, true, false),
        _ => return None,
    };
    Some(DestChar {
        digit,
        std_bit,
        custom_bit,
    })
}

pub(crate) fn decode(
    destination: &str,
    report: &str,
    now: DateTime<Utc>,
) -> Result<PositionReport, DecodeError> {
    let call = destination.split('-').next().unwrap_or("");
    let dest: Vec<DestChar> = call
        .bytes()
        .map(dest_char)
        .collect::<Option<Vec<_>>>()
        .filter(|d| d.len() == 6)
        .ok_or_else(|| DecodeError::malformed("Mic-E destination", destination))?;

    // Information field bytes are 7-bit; collect by char so Latin-1 mapped
    // comments after them do not shift offsets.
    let info: Vec<u32> = report.chars().take(9).map(u32::from).collect();
    if info.len() < 9 {
        return Err(DecodeError::Truncated("Mic-E information field"));
    }
    if info[1..7].iter().any(|&b| !(28..=127).contains(&b)) {
        return Err(DecodeError::malformed("Mic-E information field", report));
    }

    let (latitude, ambiguity) = latitude(&dest)?;
    let north = dest[3].std_bit;
    let lon_offset = dest[4].std_bit;
    let west = dest[5].std_bit;

    let mut lon_deg = info[1] - 28;
    if lon_offset {
        lon_deg += 100;
    }
    if (180..=189).contains(&lon_deg) {
        lon_deg -= 80;
    } else if (190..=199).contains(&lon_deg) {
        lon_deg -= 190;
    }
    let mut lon_min = info[2] - 28;
    if lon_min >= 60 {
        lon_min -= 60;
    }
    let lon_hund = info[3] - 28;
    let longitude = f64::from(lon_deg) + (f64::from(lon_min) + f64::from(lon_hund) / 100.0) / 60.0;

    let position = Position::new(
        round6(if north { latitude } else { -latitude }),
        round6(if west { -longitude } else { longitude }),
    );
    if !position.is_valid() || lon_hund > 99 {
        return Err(DecodeError::OutOfRange("Mic-E position"));
    }

    let sp = info[4] - 28;
    let dc = info[5] - 28;
    let se = info[6] - 28;
    let mut speed = sp * 10 + dc / 10;
    if speed >= 800 {
        speed -= 800;
    }
    let mut course = (dc % 10) * 100 + se;
    if course >= 400 {
        course -= 400;
    }

    let symbol = char::from_u32(info[7]).unwrap_or('/');
    let table = char::from_u32(info[8]).unwrap_or('/');
    let mut pos = PositionReport::new(position, table, symbol);
    pos.encoding = PositionEncoding::MicE;
    pos.messaging = true;
    pos.ambiguity = ambiguity;
    pos.mic_e_status = Some(message_code(&dest));
    if course > 0 && course <= 360 {
        pos.course = Some(course as u16);
    }
    pos.speed = Some(knots_to_kmh(f64::from(speed)));

    let rest = report
        .char_indices()
        .nth(9)
        .map(|(i, _)| &report[i..])
        .unwrap_or("");
    let rest = mic_e_comment(&mut pos, rest);
    comment::apply(&mut pos, &rest, now, false);
    Ok(pos)
}

fn latitude(dest: &[DestChar]) -> Result<(f64, u8), DecodeError> {
    let ambiguity = dest.iter().filter(|d| d.digit.is_none()).count();
    let mut digits = [0u8; 6];
    for (i, d) in dest.iter().enumerate() {
        digits[i] = d.digit.unwrap_or(0);
    }
    // Same substitution as uncompressed ambiguity: leftmost blank is 5.
    if ambiguity > 0 && ambiguity <= 4 {
        let first_blank = 6 - ambiguity;
        digits[first_blank] = 5;
    } else if ambiguity > 4 {
        return Err(DecodeError::OutOfRange("Mic-E ambiguity"));
    }
    let deg = f64::from(digits[0] * 10 + digits[1]);
    let min = f64::from(digits[2] * 10 + digits[3]) + f64::from(digits[4] * 10 + digits[5]) / 100.0;
    if deg > 90.0 || min >= 60.0 {
        return Err(DecodeError::OutOfRange("Mic-E latitude"));
    }
    Ok((deg + min / 60.0, ambiguity as u8))
}

fn message_code(dest: &[DestChar]) -> String {
    let std = dest[..3].iter().any(|d| d.std_bit);
    let custom = dest[..3].iter().any(|d| d.custom_bit);
    let bits = dest[..3]
        .iter()
        .fold(0usize, |acc, d| (acc << 1) | usize::from(d.std_bit || d.custom_bit));
    match (std, custom) {
        (true, true) => "Unknown".to_string(),
        (false, true) => format!("Custom-{}", 7 - bits),
        _ => STD_MESSAGES[bits].to_string(),
    }
}

/// Strip the device type marker, altitude and device suffixes.
fn mic_e_comment(pos: &mut PositionReport, text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let device = match chars.first() {
        Some(&c) if matches!(c, '`' | '\'' | '>' | ']') => {
            chars.remove(0);
            Some(c)
        }
        _ => None,
    };

    if chars.len() >= 4 && chars[3] == '}' {
        let alt = chars[..3].iter().try_fold(0i64, |acc, &c| {
            let v = c as i64 - 33;
            (0..91).contains(&v).then_some(acc * 91 + v)
        });
        if let Some(alt) = alt {
            pos.altitude = Some((alt - 10000) as f64);
            chars.drain(..4);
        }
    }

    match device {
        Some('`') => {
            let trim = if chars.last() == Some(&'_') { 1 } else { 2 };
            chars.truncate(chars.len().saturating_sub(trim));
        }
        Some(']') | Some('>') => {
            if chars.last() == Some(&'=') {
                chars.pop();
            }
        }
        _ => {}
    }
    chars.into_iter().collect()
}
