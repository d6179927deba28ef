// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # JSON Parser
//!
//! Parses the source value as one top-level JSON object. String members
//! become fields verbatim; non-string members are re-serialised compactly.
//! Non-object documents and parse failures follow `discard_unmatch`.

use std::sync::Arc;

use logship_domain::entities::ParseJsonConfig;
use logship_domain::services::{ParseOutcome, Processor};
use logship_domain::{EventGroup, LogEvent, PipelineEvent};

use crate::infrastructure::alarms::AlarmKind;
use crate::infrastructure::processors::ProcessorContext;

pub struct ParseJsonProcessor {
    config: ParseJsonConfig,
    ctx: Arc<ProcessorContext>,
}

impl ParseJsonProcessor {
    pub fn new(config: ParseJsonConfig, ctx: Arc<ProcessorContext>) -> Self {
        Self { config, ctx }
    }

    fn parse_event(&self, group: &mut EventGroup, event: &mut LogEvent) -> ParseOutcome {
        let value: Vec<u8> = match event.content(group.source(), &self.config.source_key) {
            Some(v) => v.to_vec(),
            None => return ParseOutcome::Unmatched,
        };
        let parsed: serde_json::Value = match serde_json::from_slice(&value) {
            Ok(parsed) => parsed,
            Err(_) => return ParseOutcome::Unmatched,
        };
        let serde_json::Value::Object(members) = parsed else {
            return ParseOutcome::Unmatched;
        };

        for (key, member) in members {
            match member {
                serde_json::Value::String(text) => {
                    event.set_content(group.source_mut(), &key, text.as_bytes());
                }
                other => {
                    event.set_content(group.source_mut(), &key, other.to_string().as_bytes());
                }
            }
        }
        if !self.config.keep_source {
            event.remove_content(group.source(), &self.config.source_key);
        }
        ParseOutcome::Parsed
    }
}

impl Processor for ParseJsonProcessor {
    fn name(&self) -> &'static str {
        "processor_parse_json"
    }

    fn process(&self, group: &mut EventGroup) {
        let events = group.take_events();
        let mut next = Vec::with_capacity(events.len());
        for event in events {
            match event {
                PipelineEvent::Log(mut log) => match self.parse_event(group, &mut log) {
                    ParseOutcome::Parsed | ParseOutcome::TimeInvalid => {
                        next.push(PipelineEvent::Log(log))
                    }
                    ParseOutcome::Unmatched => {
                        let sample = log
                            .content(group.source(), &self.config.source_key)
                            .map(|v| v.to_vec())
                            .unwrap_or_default();
                        self.ctx.alarms.raise(
                            AlarmKind::RegexMatchFail,
                            &self.ctx.pipeline,
                            "record is not a JSON object",
                            &sample,
                        );
                        if !self.config.discard_unmatch {
                            next.push(PipelineEvent::Log(log));
                        }
                    }
                },
                other => next.push(other),
            }
        }
        group.set_events(next);
    }
}
