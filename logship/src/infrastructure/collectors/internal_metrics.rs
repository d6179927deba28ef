// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Internal Metrics Collector
//!
//! The single ticker reader of the metrics-record list. Each tick runs
//! one write-then-swap snapshot and emits the due categories (per the
//! self-monitor rules) as a metric event group on the owning pipeline.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use logship_domain::entities::InternalMetricsConfig;
use logship_domain::services::Collector;
use logship_domain::{AgentError, EventGroup};

use crate::infrastructure::metrics::exporter::{snapshots_to_group, ExportGate};
use crate::infrastructure::metrics::WriteMetrics;

/// Reads the process-wide metrics records on a fixed cadence.
pub struct InternalMetricsCollector {
    config: InternalMetricsConfig,
    metrics: Arc<WriteMetrics>,
    gate: Mutex<ExportGate>,
}

impl InternalMetricsCollector {
    pub fn new(config: InternalMetricsConfig, metrics: Arc<WriteMetrics>) -> Self {
        Self {
            config,
            metrics,
            gate: Mutex::new(ExportGate::default()),
        }
    }
}

#[async_trait]
impl Collector for InternalMetricsCollector {
    fn name(&self) -> &str {
        "internal_metrics"
    }

    fn interval(&self) -> Duration {
        // Tick at the finest configured category interval.
        let rules = &self.config.rules;
        let min = [
            rules.agent.interval,
            rules.runner.interval,
            rules.pipeline.interval,
            rules.plugin_source.interval,
            rules.plugin.interval,
            rules.component.interval,
        ]
        .into_iter()
        .min()
        .unwrap_or(10);
        Duration::from_secs(min.max(1))
    }

    async fn collect(&self) -> Result<Vec<EventGroup>, AgentError> {
        let now = chrono::Utc::now().timestamp();
        let due = self.gate.lock().due_categories(&self.config.rules, now);
        if due.is_empty() {
            return Ok(Vec::new());
        }
        let snapshots = self.metrics.do_snapshot();
        let group = snapshots_to_group(&snapshots, &due, now);
        if group.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![group])
        }
    }
}
