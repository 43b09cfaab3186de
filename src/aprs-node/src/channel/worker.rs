// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Channel supervisor.
//!
//! One task per active channel drives the connection state machine:
//! connect, read and dispatch packets, write queued packets, and on errors
//! wait out the retry policy's delay. Every wait is raced against the stop
//! signal so deactivation is immediate.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use aprs_core::channel::{ChannelEvent, ChannelMachine, ChannelState, LinearBackoff, RetryPolicy};
use aprs_core::{AprsPacket, DynResult};

use super::framing::{Framed, Framing};
use super::transport::{ByteStream, Transport};
use super::{Channel, ChannelContext, FailureHandler, Role};
use crate::aprsis::{self, ServerLine, KEEPALIVE_INTERVAL, KEEPALIVE_LINE};

const OUTGOING_QUEUE: usize = 64;
const READ_BUFFER: usize = 2048;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct Spec {
    transport: Transport,
    framing: Framing,
    role: Role,
    retry: LinearBackoff,
}

/// State machine tagged with the activation it belongs to, so a worker
/// outliving a deactivate/activate cycle cannot move the new run's state.
struct Slot {
    generation: u64,
    machine: ChannelMachine,
}

struct Shared {
    id: String,
    slot: Mutex<Slot>,
    ctx: ChannelContext,
    on_failed: Mutex<Option<FailureHandler>>,
}

impl Shared {
    fn state(&self) -> ChannelState {
        lock(&self.slot).machine.state().clone()
    }

    fn generation(&self) -> u64 {
        lock(&self.slot).generation
    }

    fn transition(&self, generation: u64, event: ChannelEvent) -> bool {
        let (old, new) = {
            let mut slot = lock(&self.slot);
            if slot.generation != generation {
                return false;
            }
            let old = slot.machine.state().clone();
            if !slot.machine.process_event(event) {
                return false;
            }
            (old, slot.machine.state().clone())
        };

        info!("Channel {}: {} -> {}", self.id, old, new);
        self.ctx.receivers.notify_state_change(&self.id, &old, &new);
        if let ChannelState::Failed { reason } = &new {
            let handler = lock(&self.on_failed).clone();
            if let Some(handler) = handler {
                handler(&self.id, reason);
            }
        }
        true
    }

    fn handle(&self, item: Framed) {
        match item {
            Framed::Packet(mut packet) => {
                packet.channel = Some(self.id.clone());
                let duplicate = lock(&self.ctx.dedup).is_duplicate(
                    &packet.source,
                    &packet.destination,
                    &packet.report,
                );
                self.ctx.receivers.dispatch(&packet, duplicate);
            }
            Framed::Comment(line) => match aprsis::parse_server_line(&line) {
                Some(ServerLine::LogResp { verified }) => info!(
                    "Channel {}: APRS-IS login {}",
                    self.id,
                    if verified { "verified" } else { "unverified" }
                ),
                _ => debug!("Channel {}: {}", self.id, line),
            },
            Framed::Invalid(reason) => debug!("Channel {}: dropped frame: {}", self.id, reason),
        }
    }
}

struct RunHandle {
    stop_tx: watch::Sender<bool>,
    out_tx: mpsc::Sender<AprsPacket>,
}

/// A channel assembled from a [`Transport`], a [`Framing`] and a [`Role`].
pub struct ComposedChannel {
    shared: Arc<Shared>,
    spec: Arc<Spec>,
    run: Mutex<Option<RunHandle>>,
}

impl ComposedChannel {
    pub fn new(
        id: &str,
        transport: Transport,
        framing: Framing,
        role: Role,
        retry: LinearBackoff,
        ctx: ChannelContext,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: id.to_string(),
                slot: Mutex::new(Slot {
                    generation: 0,
                    machine: ChannelMachine::new(),
                }),
                ctx,
                on_failed: Mutex::new(None),
            }),
            spec: Arc::new(Spec {
                transport,
                framing,
                role,
                retry,
            }),
            run: Mutex::new(None),
        }
    }
}

impl Channel for ComposedChannel {
    fn id(&self) -> &str {
        &self.shared.id
    }

    fn activate(&self) -> DynResult<()> {
        let mut run = lock(&self.run);
        if run.is_some() && self.is_active() {
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| format!("channel {}: {}", self.shared.id, e))?;
        if let Some(old) = run.take() {
            let _ = old.stop_tx.send(true);
        }

        let generation = {
            let mut slot = lock(&self.shared.slot);
            slot.generation += 1;
            slot.generation
        };
        self.shared.transition(generation, ChannelEvent::Activate);
        info!("Channel {}: activating ({})", self.shared.id, self.spec.transport);

        let (stop_tx, stop_rx) = watch::channel(false);
        let (out_tx, out_rx) = mpsc::channel(OUTGOING_QUEUE);
        runtime.spawn(run_worker(
            self.shared.clone(),
            self.spec.clone(),
            generation,
            stop_rx,
            out_rx,
        ));
        *run = Some(RunHandle { stop_tx, out_tx });
        Ok(())
    }

    fn deactivate(&self) {
        if let Some(run) = lock(&self.run).take() {
            let _ = run.stop_tx.send(true);
        }
        let generation = self.shared.generation();
        self.shared.transition(generation, ChannelEvent::Deactivate);
    }

    fn is_active(&self) -> bool {
        self.shared.state().is_active()
    }

    fn state(&self) -> ChannelState {
        self.shared.state()
    }

    fn send_packet(&self, packet: &AprsPacket) -> bool {
        let run = lock(&self.run);
        let Some(run) = run.as_ref() else {
            return false;
        };
        if !self.is_active() {
            return false;
        }
        match run.out_tx.try_send(packet.clone()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Channel {}: outgoing packet dropped: {}", self.shared.id, e);
                false
            }
        }
    }

    fn set_failure_handler(&self, handler: FailureHandler) {
        *lock(&self.shared.on_failed) = Some(handler);
    }
}

async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) {
    if *stop_rx.borrow() {
        return;
    }
    while stop_rx.changed().await.is_ok() {
        if *stop_rx.borrow() {
            return;
        }
    }
}

enum SessionEnd {
    Stopped,
    Lost(String),
}

async fn run_worker(
    shared: Arc<Shared>,
    spec: Arc<Spec>,
    generation: u64,
    mut stop_rx: watch::Receiver<bool>,
    mut out_rx: mpsc::Receiver<AprsPacket>,
) {
    loop {
        let connected = tokio::select! {
            result = spec.transport.connect() => result,
            _ = wait_for_stop(&mut stop_rx) => return,
        };

        let reason = match connected {
            Ok(stream) => {
                shared.transition(generation, ChannelEvent::Connected);
                match run_session(&shared, &spec, stream, &mut stop_rx, &mut out_rx).await {
                    SessionEnd::Stopped => return,
                    SessionEnd::Lost(reason) => {
                        shared.transition(generation, ChannelEvent::ConnectionLost(reason.clone()));
                        reason
                    }
                }
            }
            Err(e) => {
                let reason = e.to_string();
                shared.transition(generation, ChannelEvent::ConnectFailed(reason.clone()));
                reason
            }
        };

        let attempt = shared.state().attempt();
        if !spec.retry.should_retry(attempt) {
            error!(
                "Channel {}: giving up after {} attempts: {}",
                shared.id, attempt, reason
            );
            shared.transition(generation, ChannelEvent::RetriesExhausted(reason));
            return;
        }

        let delay = spec.retry.delay(attempt);
        warn!(
            "Channel {}: {} (attempt {}), retrying in {:?}",
            shared.id, reason, attempt, delay
        );
        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = wait_for_stop(&mut stop_rx) => return,
        }
    }
}

async fn run_session(
    shared: &Shared,
    spec: &Spec,
    stream: Box<dyn ByteStream>,
    stop_rx: &mut watch::Receiver<bool>,
    out_rx: &mut mpsc::Receiver<AprsPacket>,
) -> SessionEnd {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut frames = spec.framing.reader();
    let inet = matches!(spec.role, Role::Inet { .. });

    if let Role::Inet { login } = &spec.role {
        if let Err(e) = writer.write_all(login.as_bytes()).await {
            return SessionEnd::Lost(format!("login failed: {}", e));
        }
    }

    let mut keepalive = time::interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
    let mut buf = vec![0u8; READ_BUFFER];

    loop {
        tokio::select! {
            _ = wait_for_stop(stop_rx) => return SessionEnd::Stopped,

            read = reader.read(&mut buf) => match read {
                Ok(0) => return SessionEnd::Lost("closed by peer".to_string()),
                Ok(n) => {
                    for item in frames.push(&buf[..n]) {
                        shared.handle(item);
                    }
                }
                Err(e) => return SessionEnd::Lost(e.to_string()),
            },

            outgoing = out_rx.recv() => match outgoing {
                Some(packet) => match spec.framing.encode(&packet) {
                    Ok(bytes) => {
                        if let Err(e) = writer.write_all(&bytes).await {
                            return SessionEnd::Lost(format!("write failed: {}", e));
                        }
                        debug!("Channel {}: sent {}", shared.id, packet);
                    }
                    Err(e) => warn!("Channel {}: cannot encode {}: {}", shared.id, packet, e),
                },
                None => return SessionEnd::Stopped,
            },

            _ = keepalive.tick(), if inet => {
                if let Err(e) = writer.write_all(KEEPALIVE_LINE.as_bytes()).await {
                    return SessionEnd::Lost(format!("keepalive failed: {}", e));
                }
            }
        }
    }
}
