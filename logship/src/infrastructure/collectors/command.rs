// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command Collector
//!
//! Runs one command per tick and emits its stdout as newline-delimited
//! log events. A non-zero exit is a collection error (counted by the
//! scheduler), not a crash; stderr is attached to the error for the logs.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use logship_domain::entities::{CommandInputConfig, LogEvent, PipelineEvent};
use logship_domain::services::split::split_lines;
use logship_domain::services::Collector;
use logship_domain::{AgentError, EventGroup, SourceBuffer};

/// Periodic command-output input.
pub struct CommandCollector {
    config: CommandInputConfig,
    name: String,
}

impl CommandCollector {
    pub fn new(config: CommandInputConfig) -> Self {
        let name = format!("command:{}", config.command);
        Self { config, name }
    }
}

#[async_trait]
impl Collector for CommandCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn collect(&self) -> Result<Vec<EventGroup>, AgentError> {
        let output = Command::new(&self.config.command)
            .args(&self.config.args)
            .output()
            .await
            .map_err(|e| AgentError::IoError(format!("spawn {}: {e}", self.config.command)))?;

        if !output.status.success() {
            return Err(AgentError::IoError(format!(
                "command {} exited {}: {}",
                self.config.command,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let mut buffer = SourceBuffer::with_capacity(output.stdout.len());
        let span = buffer.copy_bytes(&output.stdout);
        let mut group = EventGroup::with_buffer(buffer);
        group.set_tag("command", self.config.command.clone());

        let lines = split_lines(&output.stdout, true);
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
        Ok(vec![group])
    }
}
