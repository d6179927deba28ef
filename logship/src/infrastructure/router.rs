// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Router
//!
//! Computes which flushers receive an event group. The route table is
//! built once at pipeline construction: one `(flusher_index, condition)`
//! row per routed flusher plus the list of always-matched flushers (those
//! without a route entry). Evaluation is O(rows); every matching flusher
//! receives a reference to the same group, and serialisation into
//! sink-specific form happens later in per-sink copies: shared groups
//! are never mutated past the router.

use logship_domain::entities::{ConditionConfig, RouteEntry};
use logship_domain::{AgentError, EventGroup};
use logship_domain::entities::EventKind;

/// One compiled route predicate.
#[derive(Debug, Clone)]
pub enum Condition {
    EventType(EventKind),
    TagValue { key: String, value: String },
    Always,
}

impl Condition {
    pub fn build(config: &ConditionConfig) -> Result<Self, AgentError> {
        Ok(match config {
            ConditionConfig::Always => Condition::Always,
            ConditionConfig::TagValue { key, value } => Condition::TagValue {
                key: key.clone(),
                value: value.clone(),
            },
            ConditionConfig::EventType { value } => {
                let kind = match value.as_str() {
                    "log" => EventKind::Log,
                    "metric" => EventKind::Metric,
                    "span" => EventKind::Span,
                    other => {
                        return Err(AgentError::invalid_config(format!(
                            "unknown event type '{other}' in route condition"
                        )));
                    }
                };
                Condition::EventType(kind)
            }
        })
    }

    pub fn check(&self, group: &EventGroup) -> bool {
        match self {
            Condition::Always => true,
            Condition::EventType(kind) => group.kind() == Some(*kind),
            Condition::TagValue { key, value } => group.tag(key) == Some(value.as_str()),
        }
    }
}

/// The fixed per-pipeline route table.
#[derive(Debug)]
pub struct Router {
    conditions: Vec<(usize, Condition)>,
    always_matched: Vec<usize>,
}

impl Router {
    /// Builds the table. Flushers without a route entry are always-matched.
    pub fn build(route: &[RouteEntry], flusher_count: usize) -> Result<Self, AgentError> {
        let mut conditions = Vec::with_capacity(route.len());
        let mut routed = vec![false; flusher_count];
        for entry in route {
            if entry.flusher_index >= flusher_count {
                return Err(AgentError::invalid_config(format!(
                    "route references flusher {} of {}",
                    entry.flusher_index, flusher_count
                )));
            }
            routed[entry.flusher_index] = true;
            conditions.push((entry.flusher_index, Condition::build(&entry.condition)?));
        }
        let always_matched = routed
            .iter()
            .enumerate()
            .filter(|(_, routed)| !**routed)
            .map(|(i, _)| i)
            .collect();
        Ok(Self {
            conditions,
            always_matched,
        })
    }

    /// Indices of the flushers that receive `group`, ascending.
    pub fn route(&self, group: &EventGroup) -> Vec<usize> {
        let mut out: Vec<usize> = self.always_matched.clone();
        for (index, condition) in &self.conditions {
            if condition.check(group) {
                out.push(*index);
            }
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_domain::entities::{LogEvent, MetricEvent, PipelineEvent};

    fn log_group() -> EventGroup {
        let mut group = EventGroup::new();
        group.push_event(PipelineEvent::Log(LogEvent::new(1)));
        group
    }

    fn metric_group() -> EventGroup {
        let mut group = EventGroup::new();
        group.push_event(PipelineEvent::Metric(MetricEvent::new("m", 1.0, 1)));
        group
    }

    #[test]
    fn test_unrouted_flushers_receive_everything() {
        let router = Router::build(&[], 2).unwrap();
        assert_eq!(router.route(&log_group()), vec![0, 1]);
        assert_eq!(router.route(&metric_group()), vec![0, 1]);
    }

    #[test]
    fn test_event_type_condition_splits_traffic() {
        let route = vec![
            RouteEntry {
                flusher_index: 0,
                condition: ConditionConfig::EventType { value: "log".into() },
            },
            RouteEntry {
                flusher_index: 1,
                condition: ConditionConfig::EventType { value: "metric".into() },
            },
        ];
        let router = Router::build(&route, 2).unwrap();
        assert_eq!(router.route(&log_group()), vec![0]);
        assert_eq!(router.route(&metric_group()), vec![1]);
    }

    #[test]
    fn test_tag_condition_is_exact_string() {
        let route = vec![RouteEntry {
            flusher_index: 0,
            condition: ConditionConfig::TagValue {
                key: "env".into(),
                value: "prod".into(),
            },
        }];
        let router = Router::build(&route, 1).unwrap();

        let mut prod = log_group();
        prod.set_tag("env", "prod");
        assert_eq!(router.route(&prod), vec![0]);

        let mut staging = log_group();
        staging.set_tag("env", "staging");
        assert!(router.route(&staging).is_empty());
        assert!(router.route(&log_group()).is_empty());
    }

    #[test]
    fn test_mixed_routed_and_always() {
        let route = vec![RouteEntry {
            flusher_index: 1,
            condition: ConditionConfig::EventType { value: "metric".into() },
        }];
        let router = Router::build(&route, 2).unwrap();
        assert_eq!(router.route(&log_group()), vec![0]);
        assert_eq!(router.route(&metric_group()), vec![0, 1]);
    }

    #[test]
    fn test_unknown_event_type_is_refused() {
        let route = vec![RouteEntry {
            flusher_index: 0,
            condition: ConditionConfig::EventType { value: "trace".into() },
        }];
        assert!(Router::build(&route, 1).is_err());
    }

    #[test]
    fn test_empty_group_matches_no_event_type() {
        let route = vec![RouteEntry {
            flusher_index: 0,
            condition: ConditionConfig::EventType { value: "log".into() },
        }];
        let router = Router::build(&route, 1).unwrap();
        assert!(router.route(&EventGroup::new()).is_empty());
    }
}
