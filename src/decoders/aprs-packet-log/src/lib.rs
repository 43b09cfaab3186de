// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Received packet log.
//!
//! Every packet a channel delivers is appended, with its decode outcome, as
//! one JSON line to a file named from a `%YYYY%-%MM%-%DD%` template. The
//! file is reopened when the resolved name changes (daily rotation).

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use aprs_core::{AprsPacket, ReportOutcome};

fn default_packet_log_dir() -> String {
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir
            .join("aprs-node")
            .join("packets")
            .to_string_lossy()
            .to_string();
    }
    "logs/packets".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketLogConfig {
    /// Whether packet logging is enabled
    pub enabled: bool,
    /// Directory for log files
    pub dir: String,
    /// File name template
    pub file: String,
}

impl Default for PacketLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_packet_log_dir(),
            file: "APRS-%YYYY%-%MM%-%DD%.log".to_string(),
        }
    }
}

struct LogState {
    current_file_name: String,
    writer: BufWriter<File>,
}

pub struct PacketLogger {
    base_dir: PathBuf,
    file_template: String,
    state: Mutex<LogState>,
}

impl PacketLogger {
    /// Open the logger, or return `None` when logging is disabled.
    pub fn from_config(cfg: &PacketLogConfig) -> Result<Option<Arc<Self>>, String> {
        if !cfg.enabled {
            return Ok(None);
        }
        let base_dir = PathBuf::from(cfg.dir.trim());
        create_dir_all(&base_dir)
            .map_err(|e| format!("create packet log dir '{}': {}", base_dir.display(), e))?;
        Ok(Some(Arc::new(Self::open(&base_dir, &cfg.file, Utc::now())?)))
    }

    fn open(base_dir: &Path, template: &str, now: DateTime<Utc>) -> Result<Self, String> {
        let file_name = resolve_file_name(template, now);
        let writer = open_writer(&base_dir.join(&file_name))?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            file_template: template.to_string(),
            state: Mutex::new(LogState {
                current_file_name: file_name,
                writer,
            }),
        })
    }

    pub fn log(&self, packet: &AprsPacket, duplicate: bool, report: &ReportOutcome) {
        self.log_at(packet, duplicate, report, Utc::now());
    }

    fn log_at(
        &self,
        packet: &AprsPacket,
        duplicate: bool,
        report: &ReportOutcome,
        now: DateTime<Utc>,
    ) {
        let line = json!({
            "ts_ms": now.timestamp_millis(),
            "channel": packet.channel,
            "duplicate": duplicate,
            "packet": packet.to_string(),
            "report": report,
        });
        let Ok(mut state) = self.state.lock() else {
            warn!("packet log mutex poisoned");
            return;
        };

        let next_file_name = resolve_file_name(&self.file_template, now);
        if next_file_name != state.current_file_name {
            match open_writer(&self.base_dir.join(&next_file_name)) {
                Ok(writer) => {
                    state.current_file_name = next_file_name;
                    state.writer = writer;
                }
                Err(e) => {
                    warn!("packet log reopen failed: {}", e);
                    return;
                }
            }
        }

        if serde_json::to_writer(&mut state.writer, &line).is_err() {
            warn!("packet log serialization failed");
            return;
        }
        if state.writer.write_all(b"\n").is_err() {
            warn!("packet log write failed");
            return;
        }
        let _ = state.writer.flush();
    }
}

fn resolve_file_name(template: &str, now: DateTime<Utc>) -> String {
    template
        .replace("%YYYY%", &now.format("%Y").to_string())
        .replace("%MM%", &now.format("%m").to_string())
        .replace("%DD%", &now.format("%d").to_string())
}

fn open_writer(path: &Path) -> Result<BufWriter<File>, String> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .map_err(|e| format!("create packet log dir '{}': {}", parent.display(), e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("open packet log '{}': {}", path.display(), e))?;
    Ok(BufWriter::new(file))
}
