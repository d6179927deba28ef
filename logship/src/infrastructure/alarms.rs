// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Operational Alarms
//!
//! A dedicated channel for conditions an operator should know about:
//! splitter garbage, regex misses, watcher overflow, checkpoint problems,
//! dead-lettered payloads. Alarms are keyed by `(kind, pipeline)` and
//! rate-limited to one emission per key per 30 seconds; suppressed
//! repetitions are counted and reported with the next emission, so nothing
//! is silent but nothing floods the log either.
//!
//! Emission goes through `tracing::warn!` and bumps a per-kind counter that
//! self-observability exports. Payload samples attached to an alarm are
//! truncated to 1 KiB.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Minimum spacing between emissions of the same alarm key.
const ALARM_INTERVAL: Duration = Duration::from_secs(30);

/// Bytes of offending data attached to an alarm at most.
pub const ALARM_SAMPLE_LIMIT: usize = 1024;

/// Alarm categories. The category is the rate-limit key together with the
/// pipeline name, and the label under which alarms are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmKind {
    SplitLogFail,
    RegexMatchFail,
    ParseTimeFail,
    WatcherOverflow,
    CheckpointFail,
    DiscardData,
    SendFail,
    DeadLetter,
    MultiConfigConflict,
    TaskOverrun,
}

impl AlarmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmKind::SplitLogFail => "split_log_fail",
            AlarmKind::RegexMatchFail => "regex_match_fail",
            AlarmKind::ParseTimeFail => "parse_time_fail",
            AlarmKind::WatcherOverflow => "watcher_overflow",
            AlarmKind::CheckpointFail => "checkpoint_fail",
            AlarmKind::DiscardData => "discard_data",
            AlarmKind::SendFail => "send_fail",
            AlarmKind::DeadLetter => "dead_letter",
            AlarmKind::MultiConfigConflict => "multi_config_conflict",
            AlarmKind::TaskOverrun => "task_overrun",
        }
    }
}

#[derive(Debug)]
struct KeyState {
    last_emitted: Instant,
    suppressed: u64,
}

/// Rate-limited alarm sink shared by every component.
#[derive(Debug, Default)]
pub struct AlarmSink {
    states: Mutex<HashMap<(AlarmKind, String), KeyState>>,
    total_emitted: AtomicU64,
    total_suppressed: AtomicU64,
}

impl AlarmSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Raises an alarm for `pipeline` (empty string for agent-wide alarms).
    ///
    /// `sample` is truncated to [`ALARM_SAMPLE_LIMIT`] bytes and rendered
    /// lossily; pass `""` when there is no offending payload.
    pub fn raise(&self, kind: AlarmKind, pipeline: &str, message: &str, sample: &[u8]) {
        let key = (kind, pipeline.to_string());
        let now = Instant::now();
        let emit = {
            let mut states = self.states.lock();
            match states.get_mut(&key) {
                Some(state) if now.duration_since(state.last_emitted) < ALARM_INTERVAL => {
                    state.suppressed += 1;
                    self.total_suppressed.fetch_add(1, Ordering::Relaxed);
                    None
                }
                Some(state) => {
                    let suppressed = std::mem::take(&mut state.suppressed);
                    state.last_emitted = now;
                    Some(suppressed)
                }
                None => {
                    states.insert(
                        key.clone(),
                        KeyState {
                            last_emitted: now,
                            suppressed: 0,
                        },
                    );
                    Some(0)
                }
            }
        };
        let Some(suppressed) = emit else { return };

        self.total_emitted.fetch_add(1, Ordering::Relaxed);
        let sample = &sample[..sample.len().min(ALARM_SAMPLE_LIMIT)];
        if sample.is_empty() {
            warn!(
                alarm = kind.as_str(),
                pipeline, suppressed, "{message}"
            );
        } else {
            warn!(
                alarm = kind.as_str(),
                pipeline,
                suppressed,
                sample = %String::from_utf8_lossy(sample),
                "{message}"
            );
        }
    }

    pub fn emitted(&self) -> u64 {
        self.total_emitted.load(Ordering::Relaxed)
    }

    pub fn suppressed(&self) -> u64 {
        self.total_suppressed.load(Ordering::Relaxed)
    }
}
