// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Stations heard on one channel, with the path they were heard through.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::packet::PathElement;

pub const DEFAULT_TIMEOUT_MINS: i64 = 40;

/// Stale entries are swept from `record` once per this many inserts.
const PRUNE_INTERVAL: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeardEntry {
    pub call: String,
    pub time: DateTime<Utc>,
    pub path: Vec<PathElement>,
}

#[derive(Debug)]
pub struct HeardList {
    timeout: Duration,
    entries: HashMap<String, HeardEntry>,
    inserts: usize,
}

impl Default for HeardList {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_TIMEOUT_MINS))
    }
}

impl HeardList {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: HashMap::new(),
            inserts: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn record(&mut self, call: &str, path: &[PathElement], now: DateTime<Utc>) {
        let key = call.to_ascii_uppercase();
        self.entries.insert(
            key.clone(),
            HeardEntry {
                call: key,
                time: now,
                path: path.to_vec(),
            },
        );
        self.inserts += 1;
        if self.inserts >= PRUNE_INTERVAL {
            self.prune(now);
        }
    }

    /// Entry for `call` if heard within the timeout. Stale entries are
    /// dropped on lookup.
    pub fn get(&mut self, call: &str, now: DateTime<Utc>) -> Option<&HeardEntry> {
        let key = call.to_ascii_uppercase();
        let stale = self
            .entries
            .get(&key)
            .is_some_and(|e| now - e.time > self.timeout);
        if stale {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key)
    }

    pub fn contains(&mut self, call: &str, now: DateTime<Utc>) -> bool {
        self.get(call, now).is_some()
    }

    /// Number of stations heard within the timeout.
    pub fn count(&mut self, now: DateTime<Utc>) -> usize {
        self.prune(now);
        self.entries.len()
    }

    /// Entries held, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prune(&mut self, now: DateTime<Utc>) {
        let timeout = self.timeout;
        self.entries.retain(|_, e| now - e.time <= timeout);
        self.inserts = 0;
    }
}
