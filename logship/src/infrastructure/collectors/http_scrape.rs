// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Scrape Collector
//!
//! Fetches each configured URL on the task's cadence and turns the
//! response body into one event group of newline-delimited log records,
//! tagged with the scrape job and target. Targets may be static (the
//! config's `urls`) or discovered through the pull-target endpoint when
//! the operator environment is present.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Duration;

use logship_domain::entities::{HttpScrapeConfig, LogEvent, PipelineEvent};
use logship_domain::services::split::split_lines;
use logship_domain::services::Collector;
use logship_domain::{AgentError, EventGroup, SourceBuffer};

/// Scrapes a list of HTTP targets.
pub struct HttpScrapeCollector {
    config: HttpScrapeConfig,
    client: reqwest::Client,
    /// Live target list; replaced by pull-target discovery when active.
    targets: RwLock<Vec<String>>,
}

impl HttpScrapeCollector {
    pub fn new(config: HttpScrapeConfig) -> Result<Self, AgentError> {
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::invalid_config(format!("failed to build scrape client: {e}")))?;
        let targets = RwLock::new(config.urls.clone());
        Ok(Self {
            config,
            client,
            targets,
        })
    }

    pub fn job(&self) -> &str {
        &self.config.job
    }

    /// Installs a discovered target list (pull-based discovery).
    pub fn set_targets(&self, targets: Vec<String>) {
        *self.targets.write() = targets;
    }

    fn body_to_group(&self, target: &str, body: &[u8], now: i64) -> EventGroup {
        let mut buffer = SourceBuffer::with_capacity(body.len());
        let span = buffer.copy_bytes(body);
        let mut group = EventGroup::with_buffer(buffer);
        group.set_tag("job", self.config.job.clone());
        group.set_tag("instance", target.to_string());

        let lines = split_lines(body, true);
        let mut events = Vec::with_capacity(lines.records.len());
        for range in lines.records {
            if range.is_empty() {
                continue;
            }
            let mut event = LogEvent::new(now);
            let value = group.source().slice(span, range.start, range.end);
            let key = group.source_mut().copy_str("content");
            event.push_content(key, value);
            events.push(PipelineEvent::Log(event));
        }
        group.set_events(events);
        group
    }
}

#[async_trait]
impl Collector for HttpScrapeCollector {
    fn name(&self) -> &str {
        &self.config.job
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn collect(&self) -> Result<Vec<EventGroup>, AgentError> {
        let targets = self.targets.read().clone();
        let now = chrono::Utc::now().timestamp();
        let mut groups = Vec::with_capacity(targets.len());
        for target in targets {
            let response = self
                .client
                .get(&target)
                .send()
                .await
                .map_err(|e| AgentError::SendFailed(format!("scrape {target}: {e}")))?;
            if !response.status().is_success() {
                return Err(AgentError::SendFailed(format!(
                    "scrape {target}: {}",
                    response.status()
                )));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| AgentError::SendFailed(format!("scrape {target}: {e}")))?;
            groups.push(self.body_to_group(&target, &body, now));
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_splits_into_tagged_log_events() {
        let collector = HttpScrapeCollector::new(HttpScrapeConfig {
            job: "node".into(),
            urls: vec![],
            interval_secs: 30,
            timeout_secs: None,
        })
        .unwrap();

        let group = collector.body_to_group("http://n1:9100/metrics", b"metric_a 1\nmetric_b 2\n", 42);
        assert_eq!(group.len(), 2);
        assert_eq!(group.tag("job"), Some("node"));
        assert_eq!(group.tag("instance"), Some("http://n1:9100/metrics"));
        let first = group.events()[0].as_log().unwrap();
        assert_eq!(first.content(group.source(), "content"), Some(&b"metric_a 1"[..]));
        assert_eq!(first.timestamp(), 42);
    }
}
