// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Timestamp Parser
//!
//! Parses one field into the event timestamp with a strftime-style format.
//! The configured timezone offset shifts the parsed wall-clock value to
//! UTC before storage; sub-second precision is kept as nanoseconds when
//! the pipeline enables nanosecond timestamps. A parse miss keeps the
//! system time recorded at read and raises a rate-limited alarm.

use chrono::NaiveDateTime;
use std::sync::Arc;

use logship_domain::entities::ParseTimestampConfig;
use logship_domain::services::Processor;
use logship_domain::{EventGroup, PipelineEvent};

use crate::infrastructure::alarms::AlarmKind;
use crate::infrastructure::processors::ProcessorContext;

pub struct ParseTimestampProcessor {
    config: ParseTimestampConfig,
    ctx: Arc<ProcessorContext>,
}

impl ParseTimestampProcessor {
    pub fn new(config: ParseTimestampConfig, ctx: Arc<ProcessorContext>) -> Self {
        Self { config, ctx }
    }

    fn parse(&self, text: &str) -> Option<(i64, u32)> {
        let parsed = NaiveDateTime::parse_from_str(text, &self.config.format).ok()?;
        let utc = parsed.and_utc();
        let seconds = utc.timestamp() - i64::from(self.config.timezone_offset_secs);
        Some((seconds, utc.timestamp_subsec_nanos()))
    }
}

impl Processor for ParseTimestampProcessor {
    fn name(&self) -> &'static str {
        "processor_parse_timestamp"
    }

    fn process(&self, group: &mut EventGroup) {
        let mut events = group.take_events();
        for event in &mut events {
            let Some(log) = event.as_log_mut() else { continue };
            let Some(raw) = log.content(group.source(), &self.config.source_key) else {
                continue;
            };
            let text = String::from_utf8_lossy(raw).into_owned();
            match self.parse(&text) {
                Some((seconds, nanos)) => {
                    let nanos = if self.ctx.enable_timestamp_nanosecond && nanos > 0 {
                        Some(nanos)
                    } else {
                        None
                    };
                    log.set_timestamp(seconds, nanos);
                }
                None => {
                    self.ctx.alarms.raise(
                        AlarmKind::ParseTimeFail,
                        &self.ctx.pipeline,
                        &format!("time value did not match format '{}'", self.config.format),
                        text.as_bytes(),
                    );
                }
            }
        }
        group.set_events(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::alarms::AlarmSink;
    use logship_domain::{LogEvent, SourceBuffer};

    fn processor(format: &str, tz: i32, ns: bool) -> ParseTimestampProcessor {
        ParseTimestampProcessor::new(
            ParseTimestampConfig {
                source_key: "time".into(),
                format: format.into(),
                timezone_offset_secs: tz,
            },
            Arc::new(ProcessorContext {
                pipeline: "p".into(),
                alarms: AlarmSink::new(),
                tag_scheme: Default::default(),
                enable_timestamp_nanosecond: ns,
                hostname: "h".into(),
                host_ip: None,
                user_defined_id: None,
            }),
        )
    }

    fn group_with_time(value: &str) -> EventGroup {
        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        let mut event = LogEvent::new(1_700_000_000);
        event.add_content(group.source_mut(), "time", value.as_bytes());
        group.push_event(PipelineEvent::Log(event));
        group
    }

    #[test]
    fn test_parse_with_timezone_shift() {
        // 2024-01-02 08:00:00 in UTC+8 is midnight UTC
        let mut group = group_with_time("2024-01-02 08:00:00");
        processor("%Y-%m-%d %H:%M:%S", 8 * 3600, false).process(&mut group);
        let log = group.events()[0].as_log().unwrap();
        assert_eq!(log.timestamp(), 1_704_153_600);
        assert_eq!(log.timestamp_ns(), None);
    }

    #[test]
    fn test_subsecond_precision_when_enabled() {
        let mut group = group_with_time("2024-01-02 00:00:00.123456");
        processor("%Y-%m-%d %H:%M:%S%.6f", 0, true).process(&mut group);
        let log = group.events()[0].as_log().unwrap();
        assert_eq!(log.timestamp_ns(), Some(123_456_000));
    }

    #[test]
    fn test_miss_keeps_read_time() {
        let mut group = group_with_time("not a time");
        processor("%Y-%m-%d %H:%M:%S", 0, false).process(&mut group);
        let log = group.events()[0].as_log().unwrap();
        assert_eq!(log.timestamp(), 1_700_000_000, "system time at read kept");
    }
}
