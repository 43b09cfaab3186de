// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Channels: a transport, a framing and a protocol role composed into one
//! supervised connection.

pub mod framing;
pub mod registry;
pub mod transport;
pub mod worker;

use std::sync::{Arc, Mutex};

use aprs_core::channel::{ChannelState, ReceiverSet};
use aprs_core::infra::DuplicateDetector;
use aprs_core::{AprsPacket, DynResult};

pub use framing::Framing;
pub use registry::{register_builtin_channels_on, ChannelRegistry};
pub use transport::Transport;
pub use worker::ComposedChannel;

/// Called once when a channel enters FAILED, with the channel id and reason.
pub type FailureHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Capabilities every channel exposes to the node.
pub trait Channel: Send + Sync {
    fn id(&self) -> &str;

    /// Start the connection worker. Activating a running channel is a no-op.
    fn activate(&self) -> DynResult<()>;

    /// Stop the worker and close the transport.
    fn deactivate(&self);

    fn is_active(&self) -> bool;

    fn state(&self) -> ChannelState;

    /// Queue a packet for transmission. Returns false when the channel is
    /// not active or its queue is full; never blocks.
    fn send_packet(&self, packet: &AprsPacket) -> bool;

    fn set_failure_handler(&self, handler: FailureHandler);
}

/// Protocol role of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Radio side: packets are sent as they are.
    Rf,
    /// APRS-IS: `login` is sent after connecting, keepalives while idle.
    Inet { login: String },
}

/// Node services shared by every channel.
#[derive(Clone)]
pub struct ChannelContext {
    pub callsign: Option<String>,
    pub receivers: Arc<ReceiverSet>,
    pub dedup: Arc<Mutex<DuplicateDetector>>,
}
