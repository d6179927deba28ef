// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Regex Parser
//!
//! Parses the source value into fields through one regex. Named capture
//! groups become fields under their own names; unnamed groups take names
//! from the configured `keys` list by position. A miss follows the
//! `discard_unmatch` policy and raises a rate-limited regex-miss alarm
//! carrying the first KiB of the record.

use std::sync::Arc;

use logship_domain::entities::ParseRegexConfig;
use logship_domain::services::{ParseOutcome, Processor};
use logship_domain::{AgentError, EventGroup, LogEvent, PipelineEvent};

use crate::infrastructure::alarms::AlarmKind;
use crate::infrastructure::processors::ProcessorContext;

pub struct ParseRegexProcessor {
    config: ParseRegexConfig,
    regex: regex::bytes::Regex,
    ctx: Arc<ProcessorContext>,
}

impl ParseRegexProcessor {
    pub fn new(config: ParseRegexConfig, ctx: Arc<ProcessorContext>) -> Result<Self, AgentError> {
        let regex = regex::bytes::Regex::new(&config.pattern)?;
        Ok(Self { config, regex, ctx })
    }

    fn parse_event(&self, group: &mut EventGroup, event: &mut LogEvent) -> ParseOutcome {
        let value: Vec<u8> = match event.content(group.source(), &self.config.source_key) {
            Some(v) => v.to_vec(),
            None => return ParseOutcome::Unmatched,
        };
        let Some(captures) = self.regex.captures(&value) else {
            return ParseOutcome::Unmatched;
        };

        let names: Vec<Option<&str>> = self.regex.capture_names().collect();
        let mut positional = 0usize;
        for (index, name) in names.iter().enumerate().skip(1) {
            let Some(matched) = captures.get(index) else {
                continue;
            };
            let key: String = match name {
                Some(name) => (*name).to_string(),
                None => {
                    let key = self
                        .config
                        .keys
                        .get(positional)
                        .cloned()
                        .unwrap_or_else(|| format!("__column{positional}__"));
                    positional += 1;
                    key
                }
            };
            event.set_content(group.source_mut(), &key, matched.as_bytes());
        }

        if !self.config.keep_source {
            event.remove_content(group.source(), &self.config.source_key);
        }
        ParseOutcome::Parsed
    }
}

impl Processor for ParseRegexProcessor {
    fn name(&self) -> &'static str {
        "processor_parse_regex"
    }

    fn process(&self, group: &mut EventGroup) {
        let events = group.take_events();
        let mut next = Vec::with_capacity(events.len());
        for event in events {
            match event {
                PipelineEvent::Log(mut log) => {
                    match self.parse_event(group, &mut log) {
                        ParseOutcome::Parsed => next.push(PipelineEvent::Log(log)),
                        ParseOutcome::Unmatched => {
                            let sample = log
                                .content(group.source(), &self.config.source_key)
                                .map(|v| v.to_vec())
                                .unwrap_or_default();
                            self.ctx.alarms.raise(
                                AlarmKind::RegexMatchFail,
                                &self.ctx.pipeline,
                                "regex did not match record",
                                &sample,
                            );
                            if !self.config.discard_unmatch {
                                next.push(PipelineEvent::Log(log));
                            }
                        }
                        ParseOutcome::TimeInvalid => next.push(PipelineEvent::Log(log)),
                    }
                }
                other => next.push(other),
            }
        }
        group.set_events(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::alarms::AlarmSink;
    use logship_domain::SourceBuffer;

    fn ctx() -> Arc<ProcessorContext> {
        Arc::new(ProcessorContext {
            pipeline: "p".into(),
            alarms: AlarmSink::new(),
            tag_scheme: Default::default(),
            enable_timestamp_nanosecond: false,
            hostname: "h".into(),
            host_ip: None,
            user_defined_id: None,
        })
    }

    fn group_with(content: &str) -> EventGroup {
        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        let mut event = LogEvent::new(0);
        event.add_content(group.source_mut(), "content", content.as_bytes());
        group.push_event(PipelineEvent::Log(event));
        group
    }

    fn field<'a>(group: &'a EventGroup, key: &str) -> Option<&'a [u8]> {
        group.events()[0].as_log().unwrap().content(group.source(), key)
    }

    #[test]
    fn test_named_groups_become_fields() {
        let processor = ParseRegexProcessor::new(
            ParseRegexConfig {
                source_key: "content".into(),
                pattern: r"(?P<level>\w+) (?P<msg>.*)".into(),
                keys: vec![],
                discard_unmatch: false,
                keep_source: false,
            },
            ctx(),
        )
        .unwrap();
        let mut group = group_with("ERROR disk full");
        processor.process(&mut group);

        assert_eq!(field(&group, "level"), Some(&b"ERROR"[..]));
        assert_eq!(field(&group, "msg"), Some(&b"disk full"[..]));
        assert_eq!(field(&group, "content"), None, "source is consumed");
    }

    #[test]
    fn test_positional_keys() {
        let processor = ParseRegexProcessor::new(
            ParseRegexConfig {
                source_key: "content".into(),
                pattern: r"(\S+) (\S+)".into(),
                keys: vec!["ip".into(), "verb".into()],
                discard_unmatch: false,
                keep_source: true,
            },
            ctx(),
        )
        .unwrap();
        let mut group = group_with("10.1.2.3 GET");
        processor.process(&mut group);

        assert_eq!(field(&group, "ip"), Some(&b"10.1.2.3"[..]));
        assert_eq!(field(&group, "verb"), Some(&b"GET"[..]));
        assert!(field(&group, "content").is_some(), "keep_source retains raw");
    }

    #[test]
    fn test_miss_discard_policy() {
        let make = |discard| {
            ParseRegexProcessor::new(
                ParseRegexConfig {
                    source_key: "content".into(),
                    pattern: r"^\d+$".into(),
                    keys: vec![],
                    discard_unmatch: discard,
                    keep_source: false,
                },
                ctx(),
            )
            .unwrap()
        };

        let mut kept = group_with("not a number");
        make(false).process(&mut kept);
        assert_eq!(kept.len(), 1, "miss kept unchanged");
        assert!(field(&kept, "content").is_some());

        let mut dropped = group_with("not a number");
        make(true).process(&mut dropped);
        assert!(dropped.is_empty(), "miss discarded");
    }
}
