// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Channel controller components.
//!
//! Transport-independent pieces of a channel: the connection state machine,
//! the retry policy driving reconnects and the receiver registry that
//! decoded packets are dispatched to.

pub mod events;
pub mod machine;
pub mod policies;

pub use events::{Receiver, ReceiverId, ReceiverSet};
pub use machine::{ChannelEvent, ChannelMachine, ChannelState};
pub use policies::{LinearBackoff, RetryPolicy};
