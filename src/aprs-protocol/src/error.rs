// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

/// Malformed or incomplete frame. Always recoverable: the caller drops the
/// frame and continues with the next one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated: {0}")]
    Truncated(&'static str),
    #[error("invalid callsign '{0}'")]
    BadCallsign(String),
    #[error("too many digipeaters ({0})")]
    TooManyDigipeaters(usize),
    #[error("not a UI frame (control 0x{control:02x}, pid 0x{pid:02x})")]
    NotUi { control: u8, pid: u8 },
    #[error("missing '{0}' in packet header")]
    MissingSeparator(char),
    #[error("empty packet")]
    Empty,
}
