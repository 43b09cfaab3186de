// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Infrastructure graph inferred from digipeater paths.
//!
//! Nodes are callsigns, edges are observed RF hops (`from -> to`). An edge
//! is `primary` when a non-duplicate transmission was seen crossing it;
//! duplicates only refresh the timestamp. Aging is explicit via
//! [`InfrastructureGraph::sweep`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::packet::{is_alias, is_qa_construct, last_true_digipeater, PathElement};

pub const DEFAULT_PRIMARY_MAX_AGE_HOURS: i64 = 72;
pub const DEFAULT_REMOVE_AGE_HOURS: i64 = 240;

/// Lookup of stations already known to the node.
pub trait StationDirectory {
    fn is_known(&self, call: &str) -> bool;
}

impl<F> StationDirectory for F
where
    F: Fn(&str) -> bool,
{
    fn is_known(&self, call: &str) -> bool {
        self(call)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeInfo {
    pub call: String,
    /// Digipeated a packet after at least one earlier digipeater.
    pub wide_digi: bool,
    /// Gated packets to the internet.
    pub igate: bool,
    /// Last time a packet was seen gated by this node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub igated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeInfo {
    pub from: String,
    pub to: String,
    pub primary: bool,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InfrastructureGraph {
    nodes: HashMap<String, NodeInfo>,
    edges: HashMap<(String, String), EdgeInfo>,
}

impl InfrastructureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, call: &str) -> Option<&NodeInfo> {
        self.nodes.get(&call.to_ascii_uppercase())
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&EdgeInfo> {
        self.edges
            .get(&(from.to_ascii_uppercase(), to.to_ascii_uppercase()))
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeInfo> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Walk `path` of a packet from `source` and record the hops it took.
    ///
    /// Only elements up to the last digipeated one are walked. Aliases and
    /// stations unknown to `directory` are skipped without breaking the
    /// chain. A `qA?` construct in the second-to-last position adds an
    /// igate edge towards the last element.
    pub fn analyze_path(
        &mut self,
        directory: &dyn StationDirectory,
        source: &str,
        path: &[PathElement],
        duplicate: bool,
        now: DateTime<Utc>,
    ) {
        let primary = !duplicate;
        let mut prev: Option<&str> = directory.is_known(source).then_some(source);
        let mut hops = 0usize;

        if let Some(last) = path.iter().rposition(|e| e.digipeated) {
            for elem in &path[..=last] {
                if !elem.digipeated || is_alias(&elem.call) {
                    continue;
                }
                hops += 1;
                if !directory.is_known(&elem.call) {
                    continue;
                }
                if hops > 1 {
                    self.node_mut(&elem.call).wide_digi = true;
                }
                if let Some(from) = prev {
                    self.add_edge(from, &elem.call, primary, now);
                }
                prev = Some(elem.call.as_str());
            }
        }

        let n = path.len();
        if n >= 2 && is_qa_construct(&path[n - 2].call) {
            let igate = &path[n - 1].call;
            let from = last_true_digipeater(&path[..n - 2])
                .map(|e| e.call.as_str())
                .unwrap_or(source);
            if !from.eq_ignore_ascii_case(igate) {
                self.add_edge(from, igate, primary, now);
            }
            let node = self.node_mut(igate);
            node.igate = true;
            node.igated_at = Some(now);
        }
    }

    /// Age edges: older than `primary_max_age` lose primary status, older
    /// than `remove_age` are dropped along with nodes left without edges.
    /// Igates without edges stay until they have not gated for `remove_age`.
    /// Returns the number of removed edges.
    pub fn sweep(
        &mut self,
        now: DateTime<Utc>,
        primary_max_age: Duration,
        remove_age: Duration,
    ) -> usize {
        let before = self.edges.len();
        self.edges.retain(|_, e| now - e.updated <= remove_age);
        for edge in self.edges.values_mut() {
            if now - edge.updated > primary_max_age {
                edge.primary = false;
            }
        }
        let edges = &self.edges;
        self.nodes.retain(|call, node| {
            node.igated_at.is_some_and(|t| now - t <= remove_age)
                || edges
                    .keys()
                    .any(|(from, to)| from == call || to == call)
        });
        before - self.edges.len()
    }

    fn node_mut(&mut self, call: &str) -> &mut NodeInfo {
        let key = call.to_ascii_uppercase();
        self.nodes.entry(key.clone()).or_insert_with(|| NodeInfo {
            call: key,
            ..NodeInfo::default()
        })
    }

    fn add_edge(&mut self, from: &str, to: &str, primary: bool, now: DateTime<Utc>) {
        self.node_mut(from);
        self.node_mut(to);
        let from = from.to_ascii_uppercase();
        let to = to.to_ascii_uppercase();
        let edge = self
            .edges
            .entry((from.clone(), to.clone()))
            .or_insert_with(|| EdgeInfo {
                from,
                to,
                primary: false,
                updated: now,
            });
        edge.updated = now;
        if primary {
            edge.primary = true;
        }
    }
}
