// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checkpoint Dumper
//!
//! The periodic task that snapshots all checkpoint state to stable storage.
//! Dumps run on a fixed cadence (default 15 s) and are additionally forced
//! before shutdown; terminal transitions dump promptly from inside the
//! store. Serialisation is small and synchronous, so each pass runs on the
//! blocking pool to keep the runtime responsive.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error};

use logship_bootstrap::shutdown::CancellationToken;

use crate::infrastructure::checkpoint::CheckpointStore;
use crate::infrastructure::metrics::MetricsService;

/// Default dump cadence.
pub const DEFAULT_DUMP_INTERVAL: Duration = Duration::from_secs(15);

/// Periodic checkpoint dumper.
pub struct CheckpointDumper {
    store: Arc<CheckpointStore>,
    metrics: Arc<MetricsService>,
    cadence: Duration,
}

impl CheckpointDumper {
    pub fn new(store: Arc<CheckpointStore>, metrics: Arc<MetricsService>, cadence: Duration) -> Self {
        Self {
            store,
            metrics,
            cadence,
        }
    }

    /// Runs until cancelled, then performs the final forced dump.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.cadence);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.dump_once().await;
                }
                _ = token.cancelled() => {
                    debug!("checkpoint dumper stopping, forcing final dump");
                    self.dump_once().await;
                    return;
                }
            }
        }
    }

    async fn dump_once(&self) {
        let store = Arc::clone(&self.store);
        let timer = self.metrics.checkpoint_dump_duration.start_timer();
        let result = tokio::task::spawn_blocking(move || store.dump()).await;
        timer.observe_duration();
        match result {
            Ok(Ok(())) => {
                self.metrics.checkpoint_dumps_total.inc();
            }
            Ok(Err(e)) => error!(error = %e, "checkpoint dump failed"),
            Err(e) => error!(error = %e, "checkpoint dump task panicked"),
        }
    }
}
