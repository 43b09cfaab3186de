// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Packet receivers attached to a channel.
//!
//! A channel hands every packet it reads to each registered receiver,
//! together with the duplicate flag from the node's detector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::packet::AprsPacket;

use super::machine::ChannelState;

/// Unique identifier for a registered receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

impl ReceiverId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Component that consumes packets from a channel.
pub trait Receiver: Send + Sync {
    /// Called for every packet read from the channel.
    fn receive(&self, packet: &AprsPacket, duplicate: bool);

    /// Called when the owning channel changes state.
    fn on_state_change(&self, _channel: &str, _old: &ChannelState, _new: &ChannelState) {}
}

/// Receivers registered on one channel.
#[derive(Default)]
pub struct ReceiverSet {
    receivers: Vec<(ReceiverId, Arc<dyn Receiver>)>,
}

impl ReceiverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a receiver. Returns an ID that can be used to unregister it.
    pub fn register(&mut self, receiver: Arc<dyn Receiver>) -> ReceiverId {
        let id = ReceiverId::new();
        self.receivers.push((id, receiver));
        id
    }

    pub fn unregister(&mut self, id: ReceiverId) {
        self.receivers.retain(|(rid, _)| *rid != id);
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    pub fn dispatch(&self, packet: &AprsPacket, duplicate: bool) {
        for (_, receiver) in &self.receivers {
            receiver.receive(packet, duplicate);
        }
    }

    pub fn notify_state_change(&self, channel: &str, old: &ChannelState, new: &ChannelState) {
        for (_, receiver) in &self.receivers {
            receiver.on_state_change(channel, old, new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingReceiver {
        packets: AtomicUsize,
        duplicates: AtomicUsize,
        transitions: AtomicUsize,
    }

    impl Receiver for CountingReceiver {
        fn receive(&self, _packet: &AprsPacket, duplicate: bool) {
            self.packets.fetch_add(1, Ordering::SeqCst);
            if duplicate {
                self.duplicates.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_state_change(&self, _channel: &str, _old: &ChannelState, _new: &ChannelState) {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_dispatch_reaches_all_receivers() {
        let mut set = ReceiverSet::new();
        let a = Arc::new(CountingReceiver::default());
        let b = Arc::new(CountingReceiver::default());
        set.register(a.clone());
        set.register(b.clone());

        let packet = AprsPacket::new("N0CALL", "APRS", vec![], ">hello");
        set.dispatch(&packet, false);
        set.dispatch(&packet, true);

        assert_eq!(a.packets.load(Ordering::SeqCst), 2);
        assert_eq!(b.duplicates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let mut set = ReceiverSet::new();
        let a = Arc::new(CountingReceiver::default());
        let id = set.register(a.clone());
        assert_eq!(set.len(), 1);
        set.unregister(id);
        assert!(set.is_empty());

        set.notify_state_change("rf", &ChannelState::Off, &ChannelState::Running);
        assert_eq!(a.transitions.load(Ordering::SeqCst), 0);
    }
}
