// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Regex Filter
//!
//! Keeps an event only when every `include` pattern fully matches its
//! field and no `exclude` pattern does. A field named by `include` that is
//! absent fails the event; an absent `exclude` field passes it.

use logship_domain::entities::FilterRegexConfig;
use logship_domain::services::Processor;
use logship_domain::{AgentError, EventGroup, LogEvent, PipelineEvent};

pub struct FilterRegexProcessor {
    include: Vec<(String, regex::bytes::Regex)>,
    exclude: Vec<(String, regex::bytes::Regex)>,
}

fn compile_full(pattern: &str) -> Result<regex::bytes::Regex, AgentError> {
    Ok(regex::bytes::Regex::new(&format!("^(?:{pattern})$"))?)
}

impl FilterRegexProcessor {
    pub fn new(config: FilterRegexConfig) -> Result<Self, AgentError> {
        let mut include = Vec::new();
        for (key, pattern) in &config.include {
            include.push((key.clone(), compile_full(pattern)?));
        }
        let mut exclude = Vec::new();
        for (key, pattern) in &config.exclude {
            exclude.push((key.clone(), compile_full(pattern)?));
        }
        Ok(Self { include, exclude })
    }

    fn keeps(&self, group: &EventGroup, log: &LogEvent) -> bool {
        for (key, regex) in &self.include {
            match log.content(group.source(), key) {
                Some(value) if regex.is_match(value) => {}
                _ => return false,
            }
        }
        for (key, regex) in &self.exclude {
            if let Some(value) = log.content(group.source(), key) {
                if regex.is_match(value) {
                    return false;
                }
            }
        }
        true
    }
}

impl Processor for FilterRegexProcessor {
    fn name(&self) -> &'static str {
        "processor_filter_regex"
    }

    fn process(&self, group: &mut EventGroup) {
        let events = group.take_events();
        let kept = events
            .into_iter()
            .filter(|event| match event {
                PipelineEvent::Log(log) => self.keeps(group, log),
                _ => true,
            })
            .collect();
        group.set_events(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_domain::SourceBuffer;
    use std::collections::BTreeMap;

    fn group_with_levels(levels: &[&str]) -> EventGroup {
        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        for level in levels {
            let mut event = LogEvent::new(0);
            event.add_content(group.source_mut(), "level", level.as_bytes());
            group.push_event(PipelineEvent::Log(event));
        }
        group
    }

    fn levels(group: &EventGroup) -> Vec<String> {
        group
            .events()
            .iter()
            .filter_map(|e| e.as_log())
            .map(|l| String::from_utf8_lossy(l.content(group.source(), "level").unwrap()).into_owned())
            .collect()
    }

    #[test]
    fn test_include_requires_full_match() {
        let mut include = BTreeMap::new();
        include.insert("level".to_string(), "WARN|ERROR".to_string());
        let filter = FilterRegexProcessor::new(FilterRegexConfig {
            include,
            exclude: BTreeMap::new(),
        })
        .unwrap();

        let mut group = group_with_levels(&["INFO", "WARN", "ERROR", "WARNING"]);
        filter.process(&mut group);
        assert_eq!(levels(&group), vec!["WARN", "ERROR"], "WARNING is not a full match");
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let mut include = BTreeMap::new();
        include.insert("level".to_string(), ".*".to_string());
        let mut exclude = BTreeMap::new();
        exclude.insert("level".to_string(), "DEBUG".to_string());
        let filter = FilterRegexProcessor::new(FilterRegexConfig { include, exclude }).unwrap();

        let mut group = group_with_levels(&["DEBUG", "INFO"]);
        filter.process(&mut group);
        assert_eq!(levels(&group), vec!["INFO"]);
    }

    #[test]
    fn test_missing_include_field_drops_event() {
        let mut include = BTreeMap::new();
        include.insert("absent".to_string(), ".*".to_string());
        let filter = FilterRegexProcessor::new(FilterRegexConfig {
            include,
            exclude: BTreeMap::new(),
        })
        .unwrap();

        let mut group = group_with_levels(&["INFO"]);
        filter.process(&mut group);
        assert!(group.is_empty());
    }
}
