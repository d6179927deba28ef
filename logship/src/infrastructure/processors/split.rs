// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Split Processors
//!
//! In-pipeline record splitting, for inputs that deliver multi-record
//! blobs (collectors, the plugin bridge) rather than pre-split reader
//! batches:
//!
//! - `processor_split_terminator`: split the source value on a literal
//!   terminator
//! - `processor_split_regex`: split on begin-of-record lines, with the
//!   same semantics as the reader's begin-pattern mode
//!
//! Split events inherit the original's timestamp and remaining fields;
//! their file offset is adjusted by the fragment position so position
//! meta stays accurate.

use std::sync::Arc;

use logship_domain::entities::{SplitRegexConfig, SplitTerminatorConfig};
use logship_domain::services::split::{compile_begin_pattern, split_by_begin_pattern};
use logship_domain::services::Processor;
use logship_domain::{AgentError, EventGroup, LogEvent, PipelineEvent};

use crate::infrastructure::alarms::{AlarmKind, AlarmSink};
use crate::infrastructure::processors::ProcessorContext;

/// Splits one log event's source value into per-range copies, carrying
/// the other fields over.
fn explode_event(
    group: &mut EventGroup,
    source: &LogEvent,
    source_key: &str,
    ranges: &[std::ops::Range<usize>],
    out: &mut Vec<PipelineEvent>,
) {
    let value: Vec<u8> = match source.content(group.source(), source_key) {
        Some(v) => v.to_vec(),
        None => return,
    };
    let others: Vec<(String, Vec<u8>)> = source
        .contents()
        .iter()
        .filter_map(|(k, v)| {
            let key = group.source().get_str(*k).into_owned();
            if key == source_key {
                None
            } else {
                Some((key, group.source().get(*v).to_vec()))
            }
        })
        .collect();

    for range in ranges {
        let mut event = LogEvent::new(source.timestamp());
        event.set_timestamp(source.timestamp(), source.timestamp_ns());
        event.set_file_offset(source.file_offset() + range.start as u64);
        event.add_content(group.source_mut(), source_key, &value[range.clone()]);
        for (key, val) in &others {
            event.add_content(group.source_mut(), key, val);
        }
        out.push(PipelineEvent::Log(event));
    }
}

/// split-by-terminator.
pub struct SplitTerminatorProcessor {
    config: SplitTerminatorConfig,
}

impl SplitTerminatorProcessor {
    pub fn new(config: SplitTerminatorConfig) -> Self {
        Self { config }
    }

    fn ranges(&self, value: &[u8]) -> Vec<std::ops::Range<usize>> {
        let term = self.config.terminator.as_bytes();
        if term.is_empty() {
            return vec![0..value.len()];
        }
        let mut out = Vec::new();
        let mut start = 0usize;
        let mut i = 0usize;
        while i + term.len() <= value.len() {
            if &value[i..i + term.len()] == term {
                out.push(start..i);
                i += term.len();
                start = i;
            } else {
                i += 1;
            }
        }
        if start < value.len() {
            out.push(start..value.len());
        }
        out
    }
}

impl Processor for SplitTerminatorProcessor {
    fn name(&self) -> &'static str {
        "processor_split_terminator"
    }

    fn process(&self, group: &mut EventGroup) {
        let events = group.take_events();
        let mut next = Vec::with_capacity(events.len());
        for event in events {
            match event {
                PipelineEvent::Log(log) if log.has_content(group.source(), &self.config.source_key) => {
                    let value = log
                        .content(group.source(), &self.config.source_key)
                        .map(|v| v.to_vec())
                        .unwrap_or_default();
                    let ranges = self.ranges(&value);
                    explode_event(group, &log, &self.config.source_key, &ranges, &mut next);
                }
                other => next.push(other),
            }
        }
        group.set_events(next);
    }
}

/// split-by-regex.
pub struct SplitRegexProcessor {
    config: SplitRegexConfig,
    begin: regex::bytes::Regex,
    ctx: Arc<ProcessorContext>,
}

impl SplitRegexProcessor {
    pub fn new(config: SplitRegexConfig, ctx: Arc<ProcessorContext>) -> Result<Self, AgentError> {
        let begin = compile_begin_pattern(&config.begin_pattern)?;
        Ok(Self { config, begin, ctx })
    }

    fn alarms(&self) -> &Arc<AlarmSink> {
        &self.ctx.alarms
    }
}

impl Processor for SplitRegexProcessor {
    fn name(&self) -> &'static str {
        "processor_split_regex"
    }

    fn process(&self, group: &mut EventGroup) {
        let events = group.take_events();
        let mut next = Vec::with_capacity(events.len());
        for event in events {
            match event {
                PipelineEvent::Log(log) if log.has_content(group.source(), &self.config.source_key) => {
                    let value = log
                        .content(group.source(), &self.config.source_key)
                        .map(|v| v.to_vec())
                        .unwrap_or_default();
                    let split =
                        split_by_begin_pattern(&value, &self.begin, self.config.discard_unmatch);
                    if !split.any_match {
                        self.alarms().raise(
                            AlarmKind::SplitLogFail,
                            &self.ctx.pipeline,
                            "begin pattern matched nothing in record",
                            &value,
                        );
                    }
                    if !split.discarded.is_empty() {
                        self.alarms().raise(
                            AlarmKind::DiscardData,
                            &self.ctx.pipeline,
                            &format!("discarded {} unmatched range(s)", split.discarded.len()),
                            &value[split.discarded[0].clone()],
                        );
                    }
                    explode_event(group, &log, &self.config.source_key, &split.records, &mut next);
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
    use logship_domain::SourceBuffer;

    fn group_with_content(content: &str) -> EventGroup {
        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        let mut event = LogEvent::new(7);
        event.set_file_offset(100);
        event.add_content(group.source_mut(), "content", content.as_bytes());
        event.add_content(group.source_mut(), "source", b"test");
        group.push_event(PipelineEvent::Log(event));
        group
    }

    fn contents(group: &EventGroup) -> Vec<String> {
        group
            .events()
            .iter()
            .filter_map(|e| e.as_log())
            .map(|l| {
                String::from_utf8_lossy(l.content(group.source(), "content").unwrap()).into_owned()
            })
            .collect()
    }

    #[test]
    fn test_terminator_split_preserves_fields_and_offsets() {
        let processor = SplitTerminatorProcessor::new(SplitTerminatorConfig {
            source_key: "content".into(),
            terminator: "\n".into(),
        });
        let mut group = group_with_content("a\nbb\nccc");
        processor.process(&mut group);

        assert_eq!(contents(&group), vec!["a", "bb", "ccc"]);
        let offsets: Vec<u64> = group
            .events()
            .iter()
            .filter_map(|e| e.as_log())
            .map(|l| l.file_offset())
            .collect();
        assert_eq!(offsets, vec![100, 102, 105]);
        for event in group.events() {
            let log = event.as_log().unwrap();
            assert_eq!(log.content(group.source(), "source"), Some(&b"test"[..]));
            assert_eq!(log.timestamp(), 7);
        }
    }

    #[test]
    fn test_custom_terminator() {
        let processor = SplitTerminatorProcessor::new(SplitTerminatorConfig {
            source_key: "content".into(),
            terminator: "||".into(),
        });
        let mut group = group_with_content("x||y||z");
        processor.process(&mut group);
        assert_eq!(contents(&group), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_split_regex_in_pipeline() {
        let ctx = Arc::new(ProcessorContext {
            pipeline: "p".into(),
            alarms: AlarmSink::new(),
            tag_scheme: Default::default(),
            enable_timestamp_nanosecond: false,
            hostname: "h".into(),
            host_ip: None,
            user_defined_id: None,
        });
        let processor = SplitRegexProcessor::new(
            SplitRegexConfig {
                source_key: "content".into(),
                begin_pattern: "line.*".into(),
                discard_unmatch: true,
            },
            ctx,
        )
        .unwrap();
        let mut group = group_with_content("badline1\ncontinue\nline2\ncontinue");
        processor.process(&mut group);
        assert_eq!(contents(&group), vec!["line2\ncontinue"]);
    }
}
