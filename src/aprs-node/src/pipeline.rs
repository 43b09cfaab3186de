// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receive pipeline: every packet read by any channel passes through here
//! once, after duplicate detection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use aprs_core::channel::Receiver;
use aprs_core::infra::{HeardList, InfrastructureGraph};
use aprs_core::{AprsPacket, ReportOutcome};
use aprs_packet_log::PacketLogger;

use crate::channel::Channel;
use crate::config::{ChannelConfig, NodeConfig};
use crate::igate::Igate;
use crate::stations::StationStore;

/// Channels grouped by failover chain. A chain starts at a configured
/// channel and follows `backup` links; all members share one heard list
/// and one send target.
#[derive(Debug, Clone, Default)]
pub struct ChannelGroups {
    chains: HashMap<String, Vec<String>>,
    member_of: HashMap<String, String>,
}

impl ChannelGroups {
    pub fn from_config(cfg: &NodeConfig) -> Self {
        let mut groups = Self::default();
        for head in [&cfg.igate.rf_channel, &cfg.igate.inet_channel]
            .into_iter()
            .flatten()
        {
            groups.add_chain(backup_chain(&cfg.channels, head));
        }
        groups
    }

    fn add_chain(&mut self, chain: Vec<String>) {
        let Some(head) = chain.first().cloned() else {
            return;
        };
        for id in &chain {
            self.member_of.entry(id.clone()).or_insert_with(|| head.clone());
        }
        self.chains.insert(head, chain);
    }

    /// Group key of a channel: the head of its chain, or its own id.
    pub fn group_of<'a>(&'a self, channel: &'a str) -> &'a str {
        self.member_of
            .get(channel)
            .map(String::as_str)
            .unwrap_or(channel)
    }

    /// Channels of a group in failover order.
    pub fn members<'a>(&'a self, group: &'a str) -> Vec<&'a str> {
        match self.chains.get(group) {
            Some(chain) => chain.iter().map(String::as_str).collect(),
            None => vec![group],
        }
    }
}

/// `start` followed by its backups. Stops at a repeated id.
pub fn backup_chain(channels: &[ChannelConfig], start: &str) -> Vec<String> {
    let mut chain = vec![start.to_string()];
    let mut current = start;
    while let Some(next) = channels
        .iter()
        .find(|c| c.id == current)
        .and_then(|c| c.backup.as_deref())
    {
        if chain.iter().any(|id| id == next) {
            break;
        }
        chain.push(next.to_string());
        current = next;
    }
    chain
}

#[derive(Debug, Default)]
struct Stats {
    received: AtomicU64,
    duplicates: AtomicU64,
    decoded: AtomicU64,
    parse_errors: AtomicU64,
    gated_inet: AtomicU64,
    gated_rf: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub duplicates: u64,
    pub decoded: u64,
    pub parse_errors: u64,
    pub gated_inet: u64,
    pub gated_rf: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct State {
    heard: HashMap<String, HeardList>,
    graph: InfrastructureGraph,
}

pub struct Pipeline {
    groups: ChannelGroups,
    heard_timeout: Duration,
    stations: Arc<StationStore>,
    igate: Option<Igate>,
    packet_log: Option<Arc<PacketLogger>>,
    channels: RwLock<HashMap<String, Weak<dyn Channel>>>,
    state: Mutex<State>,
    stats: Stats,
}

impl Pipeline {
    pub fn new(
        cfg: &NodeConfig,
        stations: Arc<StationStore>,
        igate: Option<Igate>,
        packet_log: Option<Arc<PacketLogger>>,
    ) -> Self {
        Self {
            groups: ChannelGroups::from_config(cfg),
            heard_timeout: Duration::minutes(i64::from(cfg.heard.timeout_mins)),
            stations,
            igate,
            packet_log,
            channels: RwLock::new(HashMap::new()),
            state: Mutex::new(State {
                heard: HashMap::new(),
                graph: InfrastructureGraph::new(),
            }),
            stats: Stats::default(),
        }
    }

    /// Make a channel reachable as a send target.
    pub fn attach(&self, channel: &Arc<dyn Channel>) {
        self.channels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel.id().to_string(), Arc::downgrade(channel));
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stations(&self) -> &StationStore {
        &self.stations
    }

    pub fn stats(&self) -> StatsSnapshot {
        let s = &self.stats;
        StatsSnapshot {
            received: s.received.load(Ordering::Relaxed),
            duplicates: s.duplicates.load(Ordering::Relaxed),
            decoded: s.decoded.load(Ordering::Relaxed),
            parse_errors: s.parse_errors.load(Ordering::Relaxed),
            gated_inet: s.gated_inet.load(Ordering::Relaxed),
            gated_rf: s.gated_rf.load(Ordering::Relaxed),
        }
    }

    pub fn stats_line(&self) -> String {
        let s = self.stats();
        let (nodes, edges) = {
            let state = self.lock();
            (state.graph.node_count(), state.graph.edge_count())
        };
        format!(
            "rx={} dup={} decoded={} errors={} to_inet={} to_rf={} stations={} nodes={} edges={}",
            s.received,
            s.duplicates,
            s.decoded,
            s.parse_errors,
            s.gated_inet,
            s.gated_rf,
            self.stations.len(),
            nodes,
            edges
        )
    }

    /// Age the infrastructure graph and drop stale heard entries. Returns
    /// the number of dropped edges.
    pub fn sweep(&self, now: DateTime<Utc>, primary_max_age: Duration, remove_age: Duration) -> usize {
        let mut state = self.lock();
        for heard in state.heard.values_mut() {
            heard.prune(now);
        }
        state.graph.sweep(now, primary_max_age, remove_age)
    }

    /// Stations heard within the timeout on a channel group.
    pub fn heard_count(&self, group: &str, now: DateTime<Utc>) -> usize {
        self.lock()
            .heard
            .get_mut(group)
            .map(|h| h.count(now))
            .unwrap_or(0)
    }

    pub fn process(&self, packet: &AprsPacket, duplicate: bool, now: DateTime<Utc>) {
        bump(&self.stats.received);
        let channel = packet.channel.as_deref().unwrap_or_default();
        let group = self.groups.group_of(channel).to_string();

        let outcome = if duplicate {
            bump(&self.stats.duplicates);
            ReportOutcome::Ignored
        } else {
            let outcome = aprs_decode::decode(packet, now);
            match &outcome {
                ReportOutcome::ParseError(e) => {
                    bump(&self.stats.parse_errors);
                    debug!("Parse error from {}: {}", packet.source, e);
                }
                ReportOutcome::Ignored => {}
                _ => bump(&self.stats.decoded),
            }
            self.stations.update(packet, &outcome, now);
            outcome
        };

        {
            let mut state = self.lock();
            if !duplicate {
                let timeout = self.heard_timeout;
                state
                    .heard
                    .entry(group.clone())
                    .or_insert_with(|| HeardList::new(timeout))
                    .record(&packet.source, &packet.path, now);
            }
            state.graph.analyze_path(
                self.stations.as_ref(),
                &packet.source,
                &packet.path,
                duplicate,
                now,
            );
        }

        if let Some(log) = &self.packet_log {
            log.log(packet, duplicate, &outcome);
        }

        if !duplicate {
            self.gate(packet, &group, now);
        }
    }

    fn gate(&self, packet: &AprsPacket, group: &str, now: DateTime<Utc>) {
        let Some(igate) = &self.igate else {
            return;
        };
        let cfg = igate.config();
        let rf_group = cfg.rf_channel.as_deref().map(|c| self.groups.group_of(c));
        let inet_group = cfg.inet_channel.as_deref().map(|c| self.groups.group_of(c));
        let (Some(rf_group), Some(inet_group)) = (rf_group, inet_group) else {
            return;
        };

        if group == rf_group {
            let heard = self.heard_count(rf_group, now);
            if let Some(reply) = igate.query_reply(packet, heard) {
                info!("Answering {} query from {}", packet.report.trim_end(), packet.source);
                self.send(rf_group, &reply);
                return;
            }
            if igate.gate_to_inet(packet) {
                let copy = igate.inet_copy(packet);
                if self.send(inet_group, &copy) {
                    bump(&self.stats.gated_inet);
                    debug!("Gated to APRS-IS: {}", copy);
                }
            }
        } else if group == inet_group {
            let object_pos = self.stations.get_pos(packet);
            let out = {
                let mut state = self.lock();
                let timeout = self.heard_timeout;
                let mut rf_heard = state
                    .heard
                    .remove(rf_group)
                    .unwrap_or_else(|| HeardList::new(timeout));
                let mut inet_heard = state
                    .heard
                    .remove(inet_group)
                    .unwrap_or_else(|| HeardList::new(timeout));
                let out = igate.gate_to_rf(packet, &mut rf_heard, &mut inet_heard, object_pos, now);
                state.heard.insert(rf_group.to_string(), rf_heard);
                state.heard.insert(inet_group.to_string(), inet_heard);
                out
            };
            if let Some(out) = out {
                if self.send(rf_group, &out) {
                    bump(&self.stats.gated_rf);
                    info!("Gated to RF: {}", out);
                }
            }
        }
    }

    /// Send on the first active channel of a group.
    fn send(&self, group: &str, packet: &AprsPacket) -> bool {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        let active = self
            .groups
            .members(group)
            .into_iter()
            .filter_map(|id| channels.get(id).and_then(Weak::upgrade))
            .find(|c| c.is_active());
        match active {
            Some(channel) if channel.send_packet(packet) => true,
            Some(channel) => {
                warn!("Channel {}: send queue full, dropping {}", channel.id(), packet);
                false
            }
            None => {
                debug!("No active channel in group {}, dropping {}", group, packet);
                false
            }
        }
    }
}

impl Receiver for Pipeline {
    fn receive(&self, packet: &AprsPacket, duplicate: bool) {
        self.process(packet, duplicate, Utc::now());
    }
}
