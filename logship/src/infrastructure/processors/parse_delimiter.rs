// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Delimiter Parser
//!
//! Splits the source value on a literal separator into the configured
//! keys. An optional quote character protects separators inside quoted
//! columns (doubled quotes escape themselves). A column-count mismatch is
//! a miss under `discard_unmatch`; surplus columns get generated
//! `__columnN__` names when the record is kept.

use std::sync::Arc;

use logship_domain::entities::ParseDelimiterConfig;
use logship_domain::services::{ParseOutcome, Processor};
use logship_domain::{EventGroup, LogEvent, PipelineEvent};

use crate::infrastructure::alarms::AlarmKind;
use crate::infrastructure::processors::ProcessorContext;

pub struct ParseDelimiterProcessor {
    config: ParseDelimiterConfig,
    ctx: Arc<ProcessorContext>,
}

impl ParseDelimiterProcessor {
    pub fn new(config: ParseDelimiterConfig, ctx: Arc<ProcessorContext>) -> Self {
        Self { config, ctx }
    }

    fn columns(&self, value: &[u8]) -> Vec<Vec<u8>> {
        let separator = self.config.separator.as_bytes();
        if separator.is_empty() {
            return vec![value.to_vec()];
        }
        let quote = self.config.quote.map(|q| q as u8);

        let mut out = Vec::new();
        let mut column = Vec::new();
        let mut i = 0usize;
        let mut in_quote = false;
        while i < value.len() {
            let byte = value[i];
            if let Some(q) = quote {
                if byte == q {
                    if in_quote && value.get(i + 1) == Some(&q) {
                        column.push(q); // doubled quote inside quotes
                        i += 2;
                        continue;
                    }
                    in_quote = !in_quote;
                    i += 1;
                    continue;
                }
            }
            if !in_quote && value[i..].starts_with(separator) {
                out.push(std::mem::take(&mut column));
                i += separator.len();
                continue;
            }
            column.push(byte);
            i += 1;
        }
        out.push(column);
        out
    }

    fn parse_event(&self, group: &mut EventGroup, event: &mut LogEvent) -> ParseOutcome {
        let value: Vec<u8> = match event.content(group.source(), &self.config.source_key) {
            Some(v) => v.to_vec(),
            None => return ParseOutcome::Unmatched,
        };
        let columns = self.columns(&value);
        if columns.len() < self.config.keys.len() {
            return ParseOutcome::Unmatched;
        }

        for (index, column) in columns.iter().enumerate() {
            let key = self
                .config
                .keys
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("__column{index}__"));
            event.set_content(group.source_mut(), &key, column);
        }
        if !self.config.keep_source {
            event.remove_content(group.source(), &self.config.source_key);
        }
        ParseOutcome::Parsed
    }
}

impl Processor for ParseDelimiterProcessor {
    fn name(&self) -> &'static str {
        "processor_parse_delimiter"
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
                            "record has fewer columns than configured keys",
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
