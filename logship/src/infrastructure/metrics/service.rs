// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Prometheus Metrics Service
//!
//! Agent-level counters and gauges exposed through the `/metrics` endpoint.
//! This complements the per-component [`records`](super::records) system:
//! records flow into pipelines as event groups for remote analysis, while
//! this registry answers local scrapes with the aggregate picture of the
//! whole process.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tracing::debug;

use logship_domain::AgentError;

const NAMESPACE: &str = "logship";

/// Process-wide Prometheus registry and the fixed metric set.
pub struct MetricsService {
    registry: Arc<Registry>,
    pub events_in_total: IntCounter,
    pub events_out_total: IntCounter,
    pub bytes_in_total: IntCounter,
    pub bytes_out_total: IntCounter,
    pub send_failures_total: IntCounter,
    pub dead_letter_total: IntCounter,
    pub checkpoint_dumps_total: IntCounter,
    pub active_pipelines: IntGauge,
    pub open_readers: IntGauge,
    pub queued_items: IntGauge,
    pub checkpoint_dump_duration: Histogram,
}

impl MetricsService {
    pub fn new() -> Result<Self, AgentError> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter, AgentError> {
            IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))
                .map_err(|e| AgentError::MetricsError(format!("failed to create {name}: {e}")))
        };
        let gauge = |name: &str, help: &str| -> Result<IntGauge, AgentError> {
            IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))
                .map_err(|e| AgentError::MetricsError(format!("failed to create {name}: {e}")))
        };

        let events_in_total = counter("events_in_total", "Events read from all inputs")?;
        let events_out_total = counter("events_out_total", "Events delivered to sinks")?;
        let bytes_in_total = counter("bytes_in_total", "Raw bytes read from all inputs")?;
        let bytes_out_total = counter("bytes_out_total", "Payload bytes delivered to sinks")?;
        let send_failures_total = counter("send_failures_total", "Failed send attempts")?;
        let dead_letter_total = counter("dead_letter_total", "Payloads parked in the dead-letter bucket")?;
        let checkpoint_dumps_total = counter("checkpoint_dumps_total", "Completed checkpoint dumps")?;
        let active_pipelines = gauge("pipeline_active_count", "Currently installed pipelines")?;
        let open_readers = gauge("open_readers", "Open tailing file handles")?;
        let queued_items = gauge("sender_queued_items", "Items across all sender queues")?;
        let checkpoint_dump_duration = Histogram::with_opts(
            HistogramOpts::new("checkpoint_dump_duration_seconds", "Duration of checkpoint dumps")
                .namespace(NAMESPACE),
        )
        .map_err(|e| AgentError::MetricsError(format!("failed to create dump histogram: {e}")))?;

        for metric in [
            Box::new(events_in_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(events_out_total.clone()),
            Box::new(bytes_in_total.clone()),
            Box::new(bytes_out_total.clone()),
            Box::new(send_failures_total.clone()),
            Box::new(dead_letter_total.clone()),
            Box::new(checkpoint_dumps_total.clone()),
            Box::new(active_pipelines.clone()),
            Box::new(open_readers.clone()),
            Box::new(queued_items.clone()),
            Box::new(checkpoint_dump_duration.clone()),
        ] {
            registry
                .register(metric)
                .map_err(|e| AgentError::MetricsError(format!("failed to register metric: {e}")))?;
        }

        debug!("MetricsService initialized with Prometheus registry");

        Ok(Self {
            registry: Arc::new(registry),
            events_in_total,
            events_out_total,
            bytes_in_total,
            bytes_out_total,
            send_failures_total,
            dead_letter_total,
            checkpoint_dumps_total,
            active_pipelines,
            open_readers,
            queued_items,
            checkpoint_dump_duration,
        })
    }

    /// Renders the registry in Prometheus exposition format.
    pub fn export_text(&self) -> Result<String, AgentError> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut out = Vec::new();
        encoder
            .encode(&families, &mut out)
            .map_err(|e| AgentError::MetricsError(format!("failed to encode metrics: {e}")))?;
        String::from_utf8(out).map_err(|e| AgentError::MetricsError(e.to_string()))
    }
}
