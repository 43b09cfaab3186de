// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Wire codecs for APRS packets.
//!
//! KISS byte framing and AX.25 UI frames for TNC links, and the TNC2
//! text form (`SRC>DST,PATH:PAYLOAD`) used by APRS-IS and text-mode TNCs.

pub mod ax25;
pub mod error;
pub mod kiss;
pub mod tnc2;

pub use ax25::{Ax25Address, Ax25Frame};
pub use error::FrameError;
pub use kiss::{KissDecoder, KissFrame};
