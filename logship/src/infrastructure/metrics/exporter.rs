// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Export
//!
//! Turns metrics-record snapshots into metric event groups on the same
//! pipeline as user data. Each record carries a `category` label that the
//! self-monitor rules gate: a disabled category is skipped, and each
//! category emits on its own interval. The single ticker reader lives in
//! the internal-metrics collector; this module is the pure conversion.

use std::collections::HashMap;

use logship_domain::entities::{MetricEvent, PipelineEvent, SelfMonitorRules};
use logship_domain::EventGroup;

use crate::infrastructure::metrics::records::MetricsSnapshot;

/// The label under which records declare their category.
pub const CATEGORY_LABEL: &str = "category";

/// Record categories recognised by the self-monitor rules.
pub const CATEGORIES: [&str; 6] = [
    "Agent",
    "Runner",
    "Pipeline",
    "PluginSource",
    "Plugin",
    "Component",
];

/// Per-category export gate.
#[derive(Debug, Default)]
pub struct ExportGate {
    last_emit: HashMap<String, i64>,
}

impl ExportGate {
    /// Categories due for emission at `now` per `rules`.
    pub fn due_categories(&mut self, rules: &SelfMonitorRules, now: i64) -> Vec<&'static str> {
        let mut due = Vec::new();
        for category in CATEGORIES {
            let rule = match category {
                "Agent" => &rules.agent,
                "Runner" => &rules.runner,
                "Pipeline" => &rules.pipeline,
                "PluginSource" => &rules.plugin_source,
                "Plugin" => &rules.plugin,
                _ => &rules.component,
            };
            if !rule.enable {
                continue;
            }
            let last = self.last_emit.get(category).copied().unwrap_or(0);
            if now - last >= rule.interval as i64 {
                self.last_emit.insert(category.to_string(), now);
                due.push(category);
            }
        }
        due
    }
}

/// Converts the snapshots of the given categories into one metric group.
pub fn snapshots_to_group(
    snapshots: &[MetricsSnapshot],
    categories: &[&str],
    now: i64,
) -> EventGroup {
    let mut group = EventGroup::new();
    for snapshot in snapshots {
        let category = snapshot
            .labels
            .iter()
            .find(|(key, _)| key == CATEGORY_LABEL)
            .map(|(_, value)| value.as_str())
            .unwrap_or("Component");
        if !categories.contains(&category) {
            continue;
        }
        for (name, value) in &snapshot.counters {
            let mut event = MetricEvent::new(name.clone(), *value as f64, now);
            for (key, val) in &snapshot.labels {
                event = event.with_tag(key.clone(), val.clone());
            }
            group.push_event(PipelineEvent::Metric(event));
        }
    }
    group
}
