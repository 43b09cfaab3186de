// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Reconnect policy for channel transports.

use std::time::Duration;

/// Policy for retrying failed connects.
pub trait RetryPolicy: Send + Sync {
    /// Determine if another attempt should be made after `attempt` failures.
    fn should_retry(&self, attempt: u32) -> bool;

    /// Get the delay before the next attempt.
    fn delay(&self, attempt: u32) -> Duration;

    /// Maximum number of retries, 0 meaning unlimited.
    fn max_retries(&self) -> u32;
}

/// Linear backoff: `attempt * base_interval`, capped at `max_interval`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    max_retries: u32,
    base_interval: Duration,
    max_interval: Duration,
}

impl LinearBackoff {
    pub fn new(max_retries: u32, base_interval: Duration, max_interval: Duration) -> Self {
        Self {
            max_retries,
            base_interval,
            max_interval,
        }
    }

    /// Defaults for APRS channels: unlimited retries, 30 s steps, 10 min cap.
    pub fn default_channel() -> Self {
        Self {
            max_retries: 0,
            base_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(600),
        }
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::default_channel()
    }
}

impl RetryPolicy for LinearBackoff {
    fn should_retry(&self, attempt: u32) -> bool {
        self.max_retries == 0 || attempt <= self.max_retries
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_interval
            .saturating_mul(attempt.max(1))
            .min(self.max_interval)
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_delays() {
        let policy = LinearBackoff::new(5, Duration::from_secs(10), Duration::from_secs(35));

        assert_eq!(policy.delay(1), Duration::from_secs(10));
        assert_eq!(policy.delay(2), Duration::from_secs(20));
        assert_eq!(policy.delay(3), Duration::from_secs(30));
        // Should cap at max_interval
        assert_eq!(policy.delay(4), Duration::from_secs(35));
        assert_eq!(policy.delay(40), Duration::from_secs(35));
    }

    #[test]
    fn test_linear_backoff_should_retry() {
        let policy = LinearBackoff::new(3, Duration::from_millis(100), Duration::from_secs(1));

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4)); // exceeded max retries
    }

    #[test]
    fn test_unlimited_retries() {
        let policy = LinearBackoff::default();
        assert_eq!(policy.max_retries(), 0);
        assert!(policy.should_retry(10_000));
    }
}
