// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Dispatcher
//!
//! Single-threaded cooperative dispatcher feeding a bounded worker pool.
//! It wakes on the minimum interval (default 500 ms) and computes, per
//! task, `next_due = last_begin + interval`:
//!
//! - new tasks are hash-bucketed into their interval so tasks sharing a
//!   cadence do not stampede
//! - a task that missed N > 1 intervals records the skips, advances
//!   `last_begin` by N intervals, and runs once
//! - a task whose execution time exceeds `interval / max_execute_ratio`
//!   for `continue_exceed_count` consecutive runs is force-skipped for
//!   `ceil(last_execute / max_execute)` intervals
//! - outside a task's wall-clock window, `last_begin` is fast-forwarded so
//!   the task resumes promptly when the window opens, with no backfill
//! - submission into a full pool times out after one second and counts a
//!   dropped tick instead of blocking the dispatcher
//!
//! All interval arithmetic is signed (milliseconds as `i64`) and asserted
//! non-negative before conversion back to durations.

use chrono::Timelike;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use logship_bootstrap::shutdown::CancellationToken;

use crate::infrastructure::alarms::{AlarmKind, AlarmSink};
use crate::infrastructure::scheduler::task::{ScheduledJob, TaskCounts, TaskSpec, TimeWindow};

/// Tunables with the documented defaults.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub min_wake: Duration,
    pub workers: usize,
    pub max_execute_ratio: u32,
    pub continue_exceed_count: u32,
    pub submit_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_wake: Duration::from_millis(500),
            workers: 8,
            max_execute_ratio: 3,
            continue_exceed_count: 3,
            submit_timeout: Duration::from_secs(1),
        }
    }
}

struct TaskState {
    spec: TaskSpec,
    job: Arc<dyn ScheduledJob>,
    /// Milliseconds since epoch of the last begin.
    last_begin_ms: i64,
    running: Arc<AtomicBool>,
    last_execute_ms: i64,
    exceed_streak: u32,
    skip_remaining: u32,
    counts: TaskCounts,
}

/// The task table and dispatcher.
pub struct Scheduler {
    config: SchedulerConfig,
    tasks: Arc<Mutex<HashMap<String, TaskState>>>,
    pool: Arc<Semaphore>,
    alarms: Arc<AlarmSink>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, alarms: Arc<AlarmSink>) -> Self {
        let pool = Arc::new(Semaphore::new(config.workers));
        Self {
            config,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            pool,
            alarms,
        }
    }

    /// Installs a task. The first due time is hash-bucketed across the
    /// interval so same-cadence tasks spread out.
    pub fn add_task(&self, spec: TaskSpec, job: Arc<dyn ScheduledJob>) {
        let interval_ms = interval_ms(&spec.interval);
        let mut hasher = DefaultHasher::new();
        spec.name.hash(&mut hasher);
        let bucket = (hasher.finish() % interval_ms.max(1) as u64) as i64;
        let last_begin_ms = now_ms() - bucket;

        debug!(task = %spec.name, interval_ms, bucket, "task installed");
        self.tasks.lock().insert(
            spec.name.clone(),
            TaskState {
                spec,
                job,
                last_begin_ms,
                running: Arc::new(AtomicBool::new(false)),
                last_execute_ms: 0,
                exceed_streak: 0,
                skip_remaining: 0,
                counts: TaskCounts::default(),
            },
        );
    }

    pub fn remove_task(&self, name: &str) {
        self.tasks.lock().remove(name);
    }

    /// Takes and resets the per-task counters (the status export).
    pub fn drain_status(&self) -> Vec<(String, TaskCounts)> {
        let mut tasks = self.tasks.lock();
        let mut out: Vec<(String, TaskCounts)> = tasks
            .iter_mut()
            .map(|(name, state)| (name.clone(), std::mem::take(&mut state.counts)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// The dispatcher loop; returns when `token` cancels.
    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.min_wake);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.dispatch_due(&token),
                _ = token.cancelled() => {
                    debug!("scheduler dispatcher stopping");
                    return;
                }
            }
        }
    }

    /// One dispatcher pass: find due tasks and submit them.
    pub fn dispatch_due(&self, token: &CancellationToken) {
        let now = now_ms();
        let hour = chrono::Local::now().hour();

        let due: Vec<(String, Arc<dyn ScheduledJob>, Arc<AtomicBool>, i64)> = {
            let mut tasks = self.tasks.lock();
            let mut due = Vec::new();
            for (name, state) in tasks.iter_mut() {
                if state.running.load(Ordering::Acquire) {
                    continue;
                }
                let interval = interval_ms(&state.spec.interval);

                if let Some(window) = &state.spec.window {
                    if !window.contains(hour) {
                        // Fast-forward: resume promptly at window open,
                        // without backfilling the closed period.
                        state.last_begin_ms = now - interval;
                        continue;
                    }
                }

                let elapsed = now - state.last_begin_ms;
                debug_assert!(elapsed >= 0, "scheduler time went backwards");
                if elapsed < interval {
                    continue;
                }

                let behind = elapsed / interval;
                if behind > 1 {
                    state.counts.skipped += (behind - 1) as u64;
                    debug!(task = name, behind, "missed intervals, running once");
                }
                state.last_begin_ms += behind * interval;

                if state.skip_remaining > 0 {
                    state.skip_remaining -= 1;
                    state.counts.skipped += 1;
                    continue;
                }

                due.push((
                    name.clone(),
                    Arc::clone(&state.job),
                    Arc::clone(&state.running),
                    interval,
                ));
            }
            due
        };

        for (name, job, running, interval) in due {
            self.submit(name, job, running, interval, token.clone());
        }
    }

    fn submit(
        &self,
        name: String,
        job: Arc<dyn ScheduledJob>,
        running: Arc<AtomicBool>,
        interval_ms: i64,
        token: CancellationToken,
    ) {
        let pool = Arc::clone(&self.pool);
        let tasks = Arc::clone(&self.tasks);
        let alarms = Arc::clone(&self.alarms);
        let submit_timeout = self.config.submit_timeout;
        let ratio = self.config.max_execute_ratio.max(1);
        let exceed_limit = self.config.continue_exceed_count.max(1);

        running.store(true, Ordering::Release);
        tokio::spawn(async move {
            let permit =
                match tokio::time::timeout(submit_timeout, pool.acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    _ => {
                        // Full pool: dropped tick, counted, never blocking.
                        running.store(false, Ordering::Release);
                        if let Some(state) = tasks.lock().get_mut(&name) {
                            state.counts.dropped += 1;
                        }
                        warn!(task = %name, "worker pool full, tick dropped");
                        return;
                    }
                };

            let started = now_ms();
            let result = job.run(&token).await;
            let elapsed = now_ms() - started;
            drop(permit);
            running.store(false, Ordering::Release);

            let mut tasks = tasks.lock();
            let Some(state) = tasks.get_mut(&name) else { return };
            state.last_execute_ms = elapsed;
            match result {
                Ok(()) => state.counts.success += 1,
                Err(e) => {
                    state.counts.error += 1;
                    debug!(task = %name, error = %e, "task tick failed");
                }
            }

            // Slowness demotion
            let max_execute = (interval_ms / i64::from(ratio)).max(1);
            if elapsed > max_execute {
                state.exceed_streak += 1;
                if state.exceed_streak >= exceed_limit {
                    let skips = (elapsed + max_execute - 1) / max_execute;
                    state.skip_remaining = skips as u32;
                    state.exceed_streak = 0;
                    alarms.raise(
                        AlarmKind::TaskOverrun,
                        "",
                        &format!(
                            "task '{name}' ran {elapsed} ms against a {max_execute} ms budget; demoting for {skips} intervals"
                        ),
                        b"",
                    );
                }
            } else {
                state.exceed_streak = 0;
            }
        });
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn interval_ms(interval: &Duration) -> i64 {
    let ms = interval.as_millis().min(i64::MAX as u128) as i64;
    ms.max(1)
}
