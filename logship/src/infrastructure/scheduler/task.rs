// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduled Tasks
//!
//! The task surface the dispatcher drives: a stable name, a desired
//! interval, an optional wall-clock window, and the job body. Jobs are
//! cancellable at safe points through the token they receive; the
//! scheduler never hard-kills a tick.

use async_trait::async_trait;
use std::time::Duration;

use logship_bootstrap::shutdown::CancellationToken;
use logship_domain::AgentError;

/// One periodic job body.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Runs one tick. Implementations observe `cancel` between records
    /// and after each acknowledgement; the scheduler relies on
    /// cooperation, not termination.
    async fn run(&self, cancel: &CancellationToken) -> Result<(), AgentError>;
}

/// Wall-clock gating: the task runs only while `contains` the local hour.
/// `start == end` means always; windows may wrap midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour == self.end_hour {
            true
        } else if self.start_hour < self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Declarative description of one task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub interval: Duration,
    pub window: Option<TimeWindow>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            window: None,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }
}

/// Per-task counters since the last status export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub success: u64,
    pub error: u64,
    pub skipped: u64,
    pub dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_plain_range() {
        let window = TimeWindow {
            start_hour: 9,
            end_hour: 17,
        };
        assert!(window.contains(9));
        assert!(window.contains(16));
        assert!(!window.contains(17));
        assert!(!window.contains(3));
    }

    #[test]
    fn test_window_wraps_midnight() {
        let window = TimeWindow {
            start_hour: 22,
            end_hour: 2,
        };
        assert!(window.contains(23));
        assert!(window.contains(1));
        assert!(!window.contains(12));
    }

    #[test]
    fn test_degenerate_window_is_always_open() {
        let window = TimeWindow {
            start_hour: 5,
            end_hour: 5,
        };
        assert!(window.contains(0));
        assert!(window.contains(23));
    }
}
