// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Apsara Format Parser
//!
//! Parses the bracketed tab-separated apsara line format:
//!
//! ```text
//! [2024-01-02 03:04:05.123456]\t[WARNING]\t[12345]\t[server.cpp:88]\tkey:value\tkey:value
//! ```
//!
//! The leading bracket holds a microsecond wall-clock timestamp; the next
//! brackets are level, thread, and file:line; the remainder are `key:value`
//! pairs split on the first colon. The microsecond value is also exposed as
//! the `microtime` field. The format writes local time, so the configured
//! timezone offset shifts it to UTC; `adjust_microsecond_timezone` applies
//! the same shift to the exposed microsecond value, compensating the known
//! pitfall where only the seconds part was historically adjusted.

use chrono::NaiveDateTime;
use std::sync::Arc;

use logship_domain::entities::ParseApsaraConfig;
use logship_domain::services::{ParseOutcome, Processor};
use logship_domain::{EventGroup, LogEvent, PipelineEvent};

use crate::infrastructure::alarms::AlarmKind;
use crate::infrastructure::processors::ProcessorContext;

pub struct ParseApsaraProcessor {
    config: ParseApsaraConfig,
    ctx: Arc<ProcessorContext>,
}

impl ParseApsaraProcessor {
    pub fn new(config: ParseApsaraConfig, ctx: Arc<ProcessorContext>) -> Self {
        Self { config, ctx }
    }

    /// Parses the `[...]` time prefix into (unix seconds UTC, microseconds).
    fn parse_time(&self, text: &str) -> Option<(i64, u32)> {
        let parsed = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.6f")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
            .ok()?;
        let utc = parsed.and_utc();
        let seconds = utc.timestamp() - i64::from(self.config.timezone_offset_secs);
        Some((seconds, utc.timestamp_subsec_micros()))
    }

    fn parse_event(&self, group: &mut EventGroup, event: &mut LogEvent) -> ParseOutcome {
        let value: Vec<u8> = match event.content(group.source(), &self.config.source_key) {
            Some(v) => v.to_vec(),
            None => return ParseOutcome::Unmatched,
        };
        let text = String::from_utf8_lossy(&value).into_owned();

        let mut fields = text.split('\t');
        let time_field = fields.next().unwrap_or_default();
        let time_text = time_field.strip_prefix('[').and_then(|t| t.strip_suffix(']'));
        let Some((seconds, micros)) = time_text.and_then(|t| self.parse_time(t)) else {
            return ParseOutcome::Unmatched;
        };

        let nanos = if self.ctx.enable_timestamp_nanosecond && micros > 0 {
            Some(micros * 1000)
        } else {
            None
        };
        event.set_timestamp(seconds, nanos);

        // The exposed microsecond clock; optionally shifted like seconds.
        let microtime = if self.config.adjust_microsecond_timezone {
            seconds as i128 * 1_000_000 + i128::from(micros)
        } else {
            (seconds as i128 + i128::from(self.config.timezone_offset_secs)) * 1_000_000
                + i128::from(micros)
        };
        event.set_content(
            group.source_mut(),
            "microtime",
            microtime.to_string().as_bytes(),
        );

        let mut positional = 0usize;
        for field in fields {
            if let Some(inner) = field.strip_prefix('[').and_then(|f| f.strip_suffix(']')) {
                let key = match positional {
                    0 => "__LEVEL__".to_string(),
                    1 => "__THREAD__".to_string(),
                    _ => {
                        // [file:line] or a further bracketed positional
                        if let Some((file, line)) = inner.rsplit_once(':') {
                            event.set_content(group.source_mut(), "__FILE__", file.as_bytes());
                            event.set_content(group.source_mut(), "__LINE__", line.as_bytes());
                            positional += 1;
                            continue;
                        }
                        format!("__EXTRA{}__", positional - 2)
                    }
                };
                event.set_content(group.source_mut(), &key, inner.as_bytes());
                positional += 1;
            } else if let Some((key, val)) = field.split_once(':') {
                event.set_content(group.source_mut(), key, val.as_bytes());
            } else if !field.is_empty() {
                event.set_content(group.source_mut(), field, b"");
            }
        }

        if !self.config.keep_source {
            event.remove_content(group.source(), &self.config.source_key);
        }
        ParseOutcome::Parsed
    }
}

impl Processor for ParseApsaraProcessor {
    fn name(&self) -> &'static str {
        "processor_parse_apsara"
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
                            AlarmKind::ParseTimeFail,
                            &self.ctx.pipeline,
                            "record does not start with an apsara time bracket",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::alarms::AlarmSink;
    use logship_domain::SourceBuffer;

    fn processor(tz: i32, adjust: bool) -> ParseApsaraProcessor {
        ParseApsaraProcessor::new(
            ParseApsaraConfig {
                source_key: "content".into(),
                timezone_offset_secs: tz,
                adjust_microsecond_timezone: adjust,
                keep_source: false,
                discard_unmatch: false,
            },
            Arc::new(ProcessorContext {
                pipeline: "p".into(),
                alarms: AlarmSink::new(),
                tag_scheme: Default::default(),
                enable_timestamp_nanosecond: true,
                hostname: "h".into(),
                host_ip: None,
                user_defined_id: None,
            }),
        )
    }

    fn group_with(content: &str) -> EventGroup {
        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        let mut event = LogEvent::new(0);
        event.add_content(group.source_mut(), "content", content.as_bytes());
        group.push_event(PipelineEvent::Log(event));
        group
    }

    const LINE: &str =
        "[2024-01-02 00:00:00.123456]\t[WARNING]\t[12345]\t[server.cpp:88]\tshard:7\tuser:alice";

    #[test]
    fn test_full_line_parses() {
        let mut group = group_with(LINE);
        processor(0, true).process(&mut group);

        let log = group.events()[0].as_log().unwrap();
        assert_eq!(log.timestamp(), 1_704_153_600);
        assert_eq!(log.timestamp_ns(), Some(123_456_000));
        let buf = group.source();
        assert_eq!(log.content(buf, "__LEVEL__"), Some(&b"WARNING"[..]));
        assert_eq!(log.content(buf, "__THREAD__"), Some(&b"12345"[..]));
        assert_eq!(log.content(buf, "__FILE__"), Some(&b"server.cpp"[..]));
        assert_eq!(log.content(buf, "__LINE__"), Some(&b"88"[..]));
        assert_eq!(log.content(buf, "shard"), Some(&b"7"[..]));
        assert_eq!(log.content(buf, "user"), Some(&b"alice"[..]));
        assert_eq!(
            log.content(buf, "microtime"),
            Some(&b"1704153600123456"[..])
        );
    }

    #[test]
    fn test_microsecond_timezone_adjustment() {
        // UTC+8 local time; seconds are always shifted, the micro clock
        // only with the adjustment flag.
        let mut adjusted = group_with(LINE);
        processor(8 * 3600, true).process(&mut adjusted);
        let log = adjusted.events()[0].as_log().unwrap();
        assert_eq!(log.timestamp(), 1_704_153_600 - 8 * 3600);
        let expected = ((1_704_153_600i64 - 8 * 3600) * 1_000_000 + 123_456).to_string();
        assert_eq!(
            log.content(adjusted.source(), "microtime"),
            Some(expected.as_bytes())
        );

        let mut raw = group_with(LINE);
        processor(8 * 3600, false).process(&mut raw);
        let log = raw.events()[0].as_log().unwrap();
        assert_eq!(
            log.content(raw.source(), "microtime"),
            Some(&b"1704153600123456"[..]),
            "without adjustment the micro clock stays local"
        );
    }

    #[test]
    fn test_miss_keeps_event_without_time() {
        let mut group = group_with("no brackets here");
        processor(0, false).process(&mut group);
        assert_eq!(group.len(), 1);
    }
}
