// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Records
//!
//! Every internal component registers a [`MetricsRecord`]: a label set plus
//! a handful of named counters: with the process-wide [`WriteMetrics`]
//! list. Writers bump atomic counters with no coordination at all; the
//! single snapshot reader runs the write-then-swap protocol:
//!
//! 1. raise the `snapshotting` flag, diverting new registrations to a side
//!    list
//! 2. take the record list under the lock (a pointer-level move), then walk
//!    it outside the lock, copying each counter and resetting the source to
//!    zero, dropping records whose owner deregistered
//! 3. fuse the diverted registrations back into the main list and clear the
//!    flag
//!
//! Writers are never blocked for more than the duration of the list swap,
//! and the reader sees a consistent point-in-time copy per record.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// The fixed counter vocabulary components draw from.
pub struct MetricNames;

impl MetricNames {
    pub const IN_EVENTS_TOTAL: &'static str = "in_events_total";
    pub const OUT_EVENTS_TOTAL: &'static str = "out_events_total";
    pub const IN_SIZE_BYTES: &'static str = "in_size_bytes";
    pub const OUT_SIZE_BYTES: &'static str = "out_size_bytes";
    pub const TOTAL_DELAY_MS: &'static str = "total_delay_ms";
    pub const TOTAL_PROCESS_TIME_MS: &'static str = "total_process_time_ms";
    pub const DISCARDED_EVENTS_TOTAL: &'static str = "discarded_events_total";
}

/// One named, atomically updated counter.
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: AtomicU64,
}

impl Counter {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Returns the current value and resets the counter to zero.
    fn take(&self) -> u64 {
        self.value.swap(0, Ordering::Relaxed)
    }
}

/// One component's label set and counters.
#[derive(Debug)]
pub struct MetricsRecord {
    labels: Vec<(String, String)>,
    counters: Mutex<Vec<Arc<Counter>>>,
    deleted: AtomicBool,
}

impl MetricsRecord {
    fn new(labels: Vec<(String, String)>) -> Arc<Self> {
        Arc::new(Self {
            labels,
            counters: Mutex::new(Vec::new()),
            deleted: AtomicBool::new(false),
        })
    }

    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    /// Gets or creates the counter named `name`.
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        let mut counters = self.counters.lock();
        if let Some(existing) = counters.iter().find(|c| c.name() == name) {
            return Arc::clone(existing);
        }
        let counter = Arc::new(Counter::new(name));
        counters.push(Arc::clone(&counter));
        counter
    }

    /// Marks the record for removal at the next snapshot.
    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Relaxed);
    }

    fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Relaxed)
    }
}

/// A consistent point-in-time copy of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub labels: Vec<(String, String)>,
    pub counters: Vec<(String, u64)>,
}

/// The process-wide record list and its snapshot protocol.
#[derive(Debug, Default)]
pub struct WriteMetrics {
    head: Mutex<Vec<Arc<MetricsRecord>>>,
    diverted: Mutex<Vec<Arc<MetricsRecord>>>,
    snapshotting: AtomicBool,
}

impl WriteMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new record under the given labels.
    pub fn create_record(&self, labels: Vec<(String, String)>) -> Arc<MetricsRecord> {
        let record = MetricsRecord::new(labels);
        if self.snapshotting.load(Ordering::Acquire) {
            self.diverted.lock().push(Arc::clone(&record));
        } else {
            self.head.lock().push(Arc::clone(&record));
        }
        record
    }

    /// Runs one snapshot pass: copies and resets every live counter,
    /// drops deregistered records, and fuses diverted registrations back.
    pub fn do_snapshot(&self) -> Vec<MetricsSnapshot> {
        self.snapshotting.store(true, Ordering::Release);

        // Take the list; writers only ever see an empty or fused list.
        let records = std::mem::take(&mut *self.head.lock());

        let mut snapshots = Vec::with_capacity(records.len());
        let mut survivors = Vec::with_capacity(records.len());
        for record in records {
            if record.is_deleted() {
                continue;
            }
            let counters = record
                .counters
                .lock()
                .iter()
                .map(|c| (c.name().to_string(), c.take()))
                .collect();
            snapshots.push(MetricsSnapshot {
                labels: record.labels.clone(),
                counters,
            });
            survivors.push(record);
        }

        {
            let mut head = self.head.lock();
            // Fuse: diverted registrations first, then the surviving list.
            let mut fused = std::mem::take(&mut *self.diverted.lock());
            fused.extend(survivors);
            fused.extend(std::mem::take(&mut *head));
            *head = fused;
            self.snapshotting.store(false, Ordering::Release);
        }
        snapshots
    }

    /// Number of live records (test/diagnostic use).
    pub fn record_count(&self) -> usize {
        self.head.lock().len() + self.diverted.lock().len()
    }
}
