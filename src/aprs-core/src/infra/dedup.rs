// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Duplicate packet detection.
//!
//! Fingerprints are `from>to:payload` strings kept in insertion order. Each
//! check prunes expired fingerprints from the front of the queue, so the
//! cache never needs an external tick.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_WINDOW_SECS: i64 = 30;
pub const DEFAULT_MAX_ENTRIES: usize = 4096;

#[derive(Debug)]
pub struct DuplicateDetector {
    window: Duration,
    max_entries: usize,
    order: VecDeque<(DateTime<Utc>, String)>,
    seen: HashMap<String, DateTime<Utc>>,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_WINDOW_SECS), DEFAULT_MAX_ENTRIES)
    }
}

impl DuplicateDetector {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self {
            window,
            max_entries: max_entries.max(1),
            order: VecDeque::new(),
            seen: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// True if the same (from, to, payload) was seen within the window.
    pub fn is_duplicate(&mut self, from: &str, to: &str, payload: &str) -> bool {
        self.check_at(from, to, payload, Utc::now())
    }

    /// [`is_duplicate`](Self::is_duplicate) against an explicit clock.
    pub fn check_at(&mut self, from: &str, to: &str, payload: &str, now: DateTime<Utc>) -> bool {
        self.prune(now);

        let key = fingerprint(from, to, payload);
        if self.seen.contains_key(&key) {
            // First sighting keeps its timestamp.
            return true;
        }

        while self.seen.len() >= self.max_entries {
            match self.order.pop_front() {
                Some((_, old)) => {
                    self.seen.remove(&old);
                }
                None => break,
            }
        }
        self.seen.insert(key.clone(), now);
        self.order.push_back((now, key));
        false
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some((ts, _)) = self.order.front() {
            if now - *ts < self.window {
                break;
            }
            if let Some((ts, key)) = self.order.pop_front() {
                if self.seen.get(&key) == Some(&ts) {
                    self.seen.remove(&key);
                }
            }
        }
    }
}

fn fingerprint(from: &str, to: &str, payload: &str) -> String {
    let payload = payload.trim_end_matches(['\r', '\n', ' ']);
    format!("{}>{}:{}", from.to_ascii_uppercase(), to.to_ascii_uppercase(), payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_repeat_within_window_is_duplicate() {
        let mut dedup = DuplicateDetector::default();
        let now = t0();
        assert!(!dedup.check_at("N0CALL", "APRS", ">hello", now));
        assert!(dedup.check_at("N0CALL", "APRS", ">hello", now + Duration::seconds(5)));
        assert!(dedup.check_at("N0CALL", "APRS", ">hello", now + Duration::seconds(29)));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_repeat_after_window_is_new() {
        let mut dedup = DuplicateDetector::default();
        let now = t0();
        assert!(!dedup.check_at("N0CALL", "APRS", ">hello", now));
        assert!(!dedup.check_at("N0CALL", "APRS", ">hello", now + Duration::seconds(31)));
        assert!(dedup.check_at("N0CALL", "APRS", ">hello", now + Duration::seconds(32)));
    }

    #[test]
    fn test_duplicates_do_not_extend_window() {
        let mut dedup = DuplicateDetector::default();
        let now = t0();
        dedup.check_at("N0CALL", "APRS", ">x", now);
        dedup.check_at("N0CALL", "APRS", ">x", now + Duration::seconds(20));
        assert!(!dedup.check_at("N0CALL", "APRS", ">x", now + Duration::seconds(35)));
    }

    #[test]
    fn test_fingerprint_fields_are_distinct() {
        let mut dedup = DuplicateDetector::default();
        let now = t0();
        assert!(!dedup.check_at("N0CALL", "APRS", ">a", now));
        assert!(!dedup.check_at("N0CALL-1", "APRS", ">a", now));
        assert!(!dedup.check_at("N0CALL", "APZ", ">a", now));
        assert!(!dedup.check_at("N0CALL", "APRS", ">b", now));
        // Trailing line endings do not change identity.
        assert!(dedup.check_at("n0call", "APRS", ">a\r\n", now));
    }

    #[test]
    fn test_size_bound_evicts_oldest() {
        let mut dedup = DuplicateDetector::new(Duration::seconds(30), 2);
        let now = t0();
        dedup.check_at("A", "APRS", "1", now);
        dedup.check_at("B", "APRS", "2", now);
        dedup.check_at("C", "APRS", "3", now);
        assert_eq!(dedup.len(), 2);
        assert!(!dedup.check_at("A", "APRS", "1", now));
    }
}
