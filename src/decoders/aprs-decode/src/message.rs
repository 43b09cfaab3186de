// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Messages, status reports, objects and items.

use chrono::{DateTime, Utc};

use aprs_core::{MessageKind, MessageReport, ObjectKind, ObjectReport, ReportTime, StatusReport};

use crate::error::DecodeError;
use crate::position;
use crate::timestamp::{looks_like_timestamp, parse_timestamp};

const TELEMETRY_DEFINITIONS: [&str; 4] = ["PARM.", "UNIT.", "EQNS.", "BITS."];

/// `:ADDRESSEE:text{msgid`
pub(crate) fn decode_message(report: &str) -> Result<MessageReport, DecodeError> {
    let recipient = report
        .get(1..10)
        .ok_or(DecodeError::Truncated("message addressee"))?;
    if report.as_bytes().get(10) != Some(&b':') {
        return Err(DecodeError::malformed("message", report));
    }
    let recipient = recipient.trim().to_string();
    if recipient.is_empty() {
        return Err(DecodeError::malformed("message addressee", report));
    }
    let body = &report[11..];

    for (prefix, is_ack) in [("ack", true), ("rej", false)] {
        if let Some(id) = body.strip_prefix(prefix) {
            let id = id.trim_end().to_string();
            if !id.is_empty() && id.len() <= 5 {
                let kind = if is_ack {
                    MessageKind::Ack(id)
                } else {
                    MessageKind::Rej(id)
                };
                return Ok(MessageReport {
                    recipient,
                    text: String::new(),
                    msgid: None,
                    kind,
                });
            }
        }
    }

    let (text, msgid) = match body.rsplit_once('{') {
        Some((text, id)) => {
            // Reply-ack form `{MM}AA`: the message id is before the `}`.
            let id = id.split('}').next().unwrap_or("").trim();
            if id.is_empty() || id.len() > 5 {
                (body, None)
            } else {
                (text, Some(id.to_string()))
            }
        }
        None => (body, None),
    };

    let kind = if let Some(def) = TELEMETRY_DEFINITIONS.iter().find(|p| text.starts_with(*p)) {
        MessageKind::TelemetryDefinition(def.trim_end_matches('.').to_string())
    } else if let Some(id) = recipient.strip_prefix("BLN") {
        MessageKind::Bulletin(id.to_string())
    } else {
        MessageKind::Text
    };

    Ok(MessageReport {
        recipient,
        text: text.trim_end().to_string(),
        msgid,
        kind,
    })
}

/// `>text` or `>DDHHMMztext`.
pub(crate) fn decode_status(report: &str, now: DateTime<Utc>) -> StatusReport {
    let body = report.get(1..).unwrap_or("");
    if looks_like_timestamp(body) {
        StatusReport {
            time: parse_timestamp(&body[..7], now),
            text: body[7..].trim_end().to_string(),
        }
    } else {
        StatusReport {
            time: ReportTime::Received,
            text: body.trim_end().to_string(),
        }
    }
}

/// `;NAME_____*DDHHMMz<position>`
pub(crate) fn decode_object(report: &str, now: DateTime<Utc>) -> Result<ObjectReport, DecodeError> {
    let name = report
        .get(1..10)
        .ok_or(DecodeError::Truncated("object name"))?
        .trim_end()
        .to_string();
    let flag = *report
        .as_bytes()
        .get(10)
        .ok_or(DecodeError::Truncated("object flag"))?;
    let alive = flag == b'*';
    if !alive {
        return Ok(ObjectReport {
            name,
            kind: ObjectKind::Object,
            alive,
            position: None,
        });
    }

    let ts = report
        .get(11..18)
        .ok_or(DecodeError::Truncated("object timestamp"))?;
    let body = report.get(18..).ok_or(DecodeError::Truncated("object position"))?;
    let mut pos = position::decode_body(body, now)?;
    pos.time = parse_timestamp(ts, now);
    Ok(ObjectReport {
        name,
        kind: ObjectKind::Object,
        alive,
        position: Some(pos),
    })
}

/// `)NAME!<position>` (alive) or `)NAME_...` (killed).
pub(crate) fn decode_item(report: &str, now: DateTime<Utc>) -> Result<ObjectReport, DecodeError> {
    let (idx, flag) = report
        .char_indices()
        .skip(1)
        .take(10)
        .find(|(_, c)| *c == '!' || *c == '_')
        .ok_or_else(|| DecodeError::malformed("item name", report))?;
    let name = report[1..idx].to_string();
    if name.len() < 3 {
        return Err(DecodeError::malformed("item name", report));
    }
    let alive = flag == '!';
    if !alive {
        return Ok(ObjectReport {
            name,
            kind: ObjectKind::Item,
            alive,
            position: None,
        });
    }
    let pos = position::decode_body(&report[idx + 1..], now)?;
    Ok(ObjectReport {
        name,
        kind: ObjectKind::Item,
        alive,
        position: Some(pos),
    })
}
