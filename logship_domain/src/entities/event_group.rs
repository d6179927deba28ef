// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Event Group
//!
//! A batch of events sharing one tag set and one [`SourceBuffer`]: for
//! example, all records read from one file in one tick. The group owns the
//! arena, so every event's spans become invalid simultaneously when the
//! group is dropped; nothing downstream may hold spans past the group.
//!
//! Groups are homogeneous: the router relies on all events having the same
//! kind, which holds by construction (each input produces one kind).

use std::collections::BTreeMap;

use crate::entities::log_event::{EventKind, PipelineEvent};
use crate::value_objects::SourceBuffer;

/// Well-known group metadata, kept apart from user-visible tags.
#[derive(Debug, Clone, Default)]
pub struct GroupMetadata {
    /// Host path of the source file, when the group came from a reader.
    pub source_path: Option<String>,
    /// Derived topic per the pipeline's topic policy.
    pub topic: Option<String>,
    /// Batch identifier carried through to sinks for tracing.
    pub pack_id: Option<String>,
}

/// A set of co-tagged events over a shared arena.
#[derive(Debug, Default)]
pub struct EventGroup {
    source: SourceBuffer,
    tags: BTreeMap<String, String>,
    metadata: GroupMetadata,
    events: Vec<PipelineEvent>,
}

impl EventGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a group around an arena that already holds the raw bytes the
    /// events will reference.
    pub fn with_buffer(source: SourceBuffer) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    pub fn source(&self) -> &SourceBuffer {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut SourceBuffer {
        &mut self.source
    }

    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut Vec<PipelineEvent> {
        &mut self.events
    }

    /// Takes the event list out, leaving the group empty.
    ///
    /// Processors that rebuild the list (splitters, parsers) take the
    /// events, transform them against `source_mut`, and put the result
    /// back with [`set_events`](Self::set_events).
    pub fn take_events(&mut self) -> Vec<PipelineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_events(&mut self, events: Vec<PipelineEvent>) {
        self.events = events;
    }

    pub fn push_event(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The homogeneous kind of this group, or `None` when empty.
    pub fn kind(&self) -> Option<EventKind> {
        self.events.first().map(PipelineEvent::kind)
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn remove_tag(&mut self, key: &str) -> Option<String> {
        self.tags.remove(key)
    }

    pub fn metadata(&self) -> &GroupMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut GroupMetadata {
        &mut self.metadata
    }

    /// Total payload bytes attributable to this group (arena plus owned
    /// metric/span strings are dominated by the arena; the arena size is
    /// the accounting figure used for back-pressure budgets).
    pub fn data_size(&self) -> usize {
        self.source.used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::log_event::LogEvent;

    #[test]
    fn test_take_and_set_events() {
        let mut group = EventGroup::new();
        group.push_event(PipelineEvent::Log(LogEvent::new(1)));
        group.push_event(PipelineEvent::Log(LogEvent::new(2)));

        let events = group.take_events();
        assert_eq!(events.len(), 2);
        assert!(group.is_empty());

        group.set_events(events);
        assert_eq!(group.len(), 2);
        assert_eq!(group.kind(), Some(EventKind::Log));
    }

    #[test]
    fn test_tags_are_sorted_and_overwritable() {
        let mut group = EventGroup::new();
        group.set_tag("__path__", "/var/log/app.log");
        group.set_tag("__hostname__", "web-1");
        group.set_tag("__path__", "/var/log/app.1.log");

        let keys: Vec<_> = group.tags().keys().cloned().collect();
        assert_eq!(keys, vec!["__hostname__", "__path__"]);
        assert_eq!(group.tag("__path__"), Some("/var/log/app.1.log"));
    }

    #[test]
    fn test_empty_group_has_no_kind() {
        assert_eq!(EventGroup::new().kind(), None);
    }
}
