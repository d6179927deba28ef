// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Concurrency Limiter
//!
//! Per-sink adaptive in-flight gate with additive-increase /
//! multiplicative-decrease:
//!
//! - success: retry interval resets to the minimum; allowed concurrency
//!   grows by one toward its maximum
//! - failure: allowed concurrency halves (configurable ratio, floor 1);
//!   the retry interval grows by 1.5× up to one hour, and the failure
//!   time gates popping until the interval has passed
//!
//! State is process-local and recomputed after each acknowledgement.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Tunables with the documented defaults.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub max_allowed: u32,
    pub min_retry_interval: Duration,
    pub max_retry_interval: Duration,
    pub retry_interval_up_ratio: f64,
    pub concurrency_down_ratio: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_allowed: 8,
            min_retry_interval: Duration::from_secs(30),
            max_retry_interval: Duration::from_secs(3600),
            retry_interval_up_ratio: 1.5,
            concurrency_down_ratio: 0.5,
        }
    }
}

#[derive(Debug)]
struct AdjustState {
    current_allowed: u32,
    retry_interval: Duration,
    last_failure: Option<Instant>,
}

/// The per-sink AIMD gate.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    config: LimiterConfig,
    state: Mutex<AdjustState>,
    in_flight: AtomicU32,
}

impl ConcurrencyLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        let state = AdjustState {
            current_allowed: config.max_allowed.max(1),
            retry_interval: config.min_retry_interval,
            last_failure: None,
        };
        Self {
            config,
            state: Mutex::new(state),
            in_flight: AtomicU32::new(0),
        }
    }

    /// Whether the driver may pop another item right now.
    pub fn is_valid_to_pop(&self) -> bool {
        self.is_valid_to_pop_at(Instant::now())
    }

    pub fn is_valid_to_pop_at(&self, now: Instant) -> bool {
        let state = self.state.lock();
        if self.in_flight.load(Ordering::Acquire) >= state.current_allowed {
            return false;
        }
        match state.last_failure {
            Some(failed_at) => now.duration_since(failed_at) >= state.retry_interval,
            None => true,
        }
    }

    /// Accounts a popped item as in flight.
    pub fn post_pop(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Releases the in-flight slot once the send resolved.
    pub fn on_send_done(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Additive increase.
    pub fn on_success(&self) {
        let mut state = self.state.lock();
        state.retry_interval = self.config.min_retry_interval;
        state.last_failure = None;
        state.current_allowed = (state.current_allowed + 1).min(self.config.max_allowed);
    }

    /// Multiplicative decrease.
    pub fn on_fail(&self, now: Instant) {
        let mut state = self.state.lock();
        state.current_allowed =
            (((state.current_allowed as f64) * self.config.concurrency_down_ratio).floor() as u32).max(1);
        let grown = state.retry_interval.as_secs_f64() * self.config.retry_interval_up_ratio;
        state.retry_interval = Duration::from_secs_f64(
            grown.min(self.config.max_retry_interval.as_secs_f64()),
        );
        state.last_failure = Some(now);
    }

    pub fn current_allowed(&self) -> u32 {
        self.state.lock().current_allowed
    }

    pub fn retry_interval(&self) -> Duration {
        self.state.lock().retry_interval
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(LimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aimd_failure_sequence() {
        // The documented sequence: max 8, retry 30 s, four failures.
        let limiter = ConcurrencyLimiter::default();
        let now = Instant::now();

        let expected_allowed = [4u32, 2, 1, 1];
        let expected_retry = [45.0f64, 67.5, 101.25, 151.875];
        for i in 0..4 {
            limiter.on_fail(now);
            assert_eq!(limiter.current_allowed(), expected_allowed[i]);
            let secs = limiter.retry_interval().as_secs_f64();
            assert!((secs - expected_retry[i]).abs() < 1e-6, "step {i}: {secs}");
        }
    }

    #[test]
    fn test_retry_interval_caps_at_one_hour() {
        let limiter = ConcurrencyLimiter::default();
        let now = Instant::now();
        for _ in 0..50 {
            limiter.on_fail(now);
        }
        assert_eq!(limiter.retry_interval(), Duration::from_secs(3600));
        assert_eq!(limiter.current_allowed(), 1);
    }

    #[test]
    fn test_recovery_is_additive() {
        let limiter = ConcurrencyLimiter::default();
        let now = Instant::now();
        for _ in 0..4 {
            limiter.on_fail(now);
        }
        // max_allowed - 1 successes restore the full concurrency
        for _ in 0..7 {
            limiter.on_success();
        }
        assert_eq!(limiter.current_allowed(), 8);
        assert_eq!(limiter.retry_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_pop_gate_after_failure() {
        let limiter = ConcurrencyLimiter::default();
        let now = Instant::now();
        assert!(limiter.is_valid_to_pop_at(now));

        limiter.on_fail(now);
        assert!(!limiter.is_valid_to_pop_at(now + Duration::from_secs(1)));
        assert!(limiter.is_valid_to_pop_at(now + Duration::from_secs(46)));
    }

    #[test]
    fn test_in_flight_bound() {
        let limiter = ConcurrencyLimiter::new(LimiterConfig {
            max_allowed: 2,
            ..Default::default()
        });
        let now = Instant::now();
        limiter.post_pop();
        limiter.post_pop();
        assert!(!limiter.is_valid_to_pop_at(now), "at the in-flight cap");
        limiter.on_send_done();
        assert!(limiter.is_valid_to_pop_at(now));
    }
}
