// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Channel connection state machine.
//!
//! `Off -> Starting -> Running`, `Starting/Running -> Failed` once retries
//! are exhausted, and `Deactivate` returns to `Off` from any state. The
//! machine only records transitions; transport workers drive it.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Events that can trigger state transitions.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Explicit activation (startup, config reload or failover).
    Activate,
    /// Transport connected / opened.
    Connected,
    /// A connect attempt failed; another attempt will follow.
    ConnectFailed(String),
    /// An established transport dropped.
    ConnectionLost(String),
    /// Retry policy gave up.
    RetriesExhausted(String),
    /// Explicit deactivation.
    Deactivate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data")]
pub enum ChannelState {
    #[default]
    Off,
    /// Connecting; `attempt` counts failed attempts since the last success.
    Starting { attempt: u32 },
    Running,
    Failed { reason: String },
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "OFF"),
            Self::Starting { attempt } => write!(f, "STARTING({})", attempt),
            Self::Running => write!(f, "RUNNING"),
            Self::Failed { reason } => write!(f, "FAILED({})", reason),
        }
    }
}

impl ChannelState {
    /// Active means the worker should keep running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting { .. } | Self::Running)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn attempt(&self) -> u32 {
        match self {
            Self::Starting { attempt } => *attempt,
            _ => 0,
        }
    }
}

#[derive(Debug)]
pub struct ChannelMachine {
    state: ChannelState,
    transition_count: u64,
    last_transition: Option<Instant>,
}

impl Default for ChannelMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMachine {
    /// Create a new state machine in the Off state.
    pub fn new() -> Self {
        Self {
            state: ChannelState::Off,
            transition_count: 0,
            last_transition: None,
        }
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn time_in_state(&self) -> Option<Duration> {
        self.last_transition.map(|t| t.elapsed())
    }

    /// Process an event and potentially transition to a new state.
    /// Returns true if a transition occurred.
    pub fn process_event(&mut self, event: ChannelEvent) -> bool {
        match self.next_state(event) {
            Some(state) => {
                self.state = state;
                self.transition_count += 1;
                self.last_transition = Some(Instant::now());
                true
            }
            None => false,
        }
    }

    fn next_state(&self, event: ChannelEvent) -> Option<ChannelState> {
        match (&self.state, event) {
            (ChannelState::Off | ChannelState::Failed { .. }, ChannelEvent::Activate) => {
                Some(ChannelState::Starting { attempt: 0 })
            }

            (ChannelState::Starting { .. }, ChannelEvent::Connected) => Some(ChannelState::Running),
            (ChannelState::Starting { attempt }, ChannelEvent::ConnectFailed(_)) => {
                Some(ChannelState::Starting {
                    attempt: attempt.saturating_add(1),
                })
            }

            // A dropped link restarts the retry count.
            (ChannelState::Running, ChannelEvent::ConnectionLost(_)) => {
                Some(ChannelState::Starting { attempt: 1 })
            }

            (
                ChannelState::Starting { .. } | ChannelState::Running,
                ChannelEvent::RetriesExhausted(reason),
            ) => Some(ChannelState::Failed { reason }),

            (ChannelState::Off, ChannelEvent::Deactivate) => None,
            (_, ChannelEvent::Deactivate) => Some(ChannelState::Off),

            _ => None,
        }
    }
}
