// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Mutating Processors
//!
//! `processor_drop` discards every event of the group (the terminal arm of
//! a routed pipeline); `processor_add_fields` installs constant fields,
//! with an overwrite toggle for already-present keys.

use logship_domain::entities::AddFieldsConfig;
use logship_domain::services::Processor;
use logship_domain::EventGroup;

/// Drops all events.
#[derive(Default)]
pub struct DropProcessor;

impl DropProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Processor for DropProcessor {
    fn name(&self) -> &'static str {
        "processor_drop"
    }

    fn process(&self, group: &mut EventGroup) {
        group.take_events();
    }
}

/// Adds constant fields to every log event.
pub struct AddFieldsProcessor {
    config: AddFieldsConfig,
}

impl AddFieldsProcessor {
    pub fn new(config: AddFieldsConfig) -> Self {
        Self { config }
    }
}

impl Processor for AddFieldsProcessor {
    fn name(&self) -> &'static str {
        "processor_add_fields"
    }

    fn process(&self, group: &mut EventGroup) {
        let mut events = group.take_events();
        for event in &mut events {
            let Some(log) = event.as_log_mut() else { continue };
            for (key, value) in &self.config.fields {
                if !self.config.overwrite && log.has_content(group.source(), key) {
                    continue;
                }
                log.set_content(group.source_mut(), key, value.as_bytes());
            }
        }
        group.set_events(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_domain::{LogEvent, PipelineEvent, SourceBuffer};
    use std::collections::BTreeMap;

    fn group_with_field(key: &str, value: &str) -> EventGroup {
        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        let mut event = LogEvent::new(0);
        event.add_content(group.source_mut(), key, value.as_bytes());
        group.push_event(PipelineEvent::Log(event));
        group
    }

    #[test]
    fn test_drop_clears_group() {
        let mut group = group_with_field("content", "x");
        DropProcessor::new().process(&mut group);
        assert!(group.is_empty());
    }

    #[test]
    fn test_add_fields_respects_overwrite_flag() {
        let mut fields = BTreeMap::new();
        fields.insert("env".to_string(), "prod".to_string());
        fields.insert("existing".to_string(), "new".to_string());

        let mut group = group_with_field("existing", "old");
        AddFieldsProcessor::new(AddFieldsConfig {
            fields: fields.clone(),
            overwrite: false,
        })
        .process(&mut group);
        let log = group.events()[0].as_log().unwrap();
        assert_eq!(log.content(group.source(), "env"), Some(&b"prod"[..]));
        assert_eq!(log.content(group.source(), "existing"), Some(&b"old"[..]));

        let mut group = group_with_field("existing", "old");
        AddFieldsProcessor::new(AddFieldsConfig {
            fields,
            overwrite: true,
        })
        .process(&mut group);
        let log = group.events()[0].as_log().unwrap();
        assert_eq!(log.content(group.source(), "existing"), Some(&b"new"[..]));
    }
}
