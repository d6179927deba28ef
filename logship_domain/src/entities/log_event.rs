// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Events
//!
//! The three event shapes a pipeline carries and the tagged variant that
//! unifies them. Log events are the hot path: their keys and values are
//! [`StrSpan`] handles into the owning group's [`SourceBuffer`], so a parser
//! that splits one raw record into twenty fields allocates nothing beyond
//! arena growth. Metric and span events are produced in small volumes (self
//! observability, scrape collectors) and own their strings outright.

use crate::value_objects::{SourceBuffer, StrSpan};

/// Event kind, used by the router's event-type predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Log,
    Metric,
    Span,
}

/// One log record: an ordered key→value content list plus a timestamp and
/// the byte offset of the record in its source file.
///
/// Content order is preserved; parsers rely on it (the raw-content key is
/// replaced in place by parsed fields).
#[derive(Debug, Clone, Default)]
pub struct LogEvent {
    timestamp: i64,
    timestamp_ns: Option<u32>,
    file_offset: u64,
    contents: Vec<(StrSpan, StrSpan)>,
}

impl LogEvent {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn timestamp_ns(&self) -> Option<u32> {
        self.timestamp_ns
    }

    pub fn set_timestamp(&mut self, secs: i64, nanos: Option<u32>) {
        self.timestamp = secs;
        self.timestamp_ns = nanos;
    }

    /// Byte offset of this record relative to the start of its file.
    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    pub fn set_file_offset(&mut self, offset: u64) {
        self.file_offset = offset;
    }

    /// Appends a content pair given pre-copied spans.
    pub fn push_content(&mut self, key: StrSpan, value: StrSpan) {
        self.contents.push((key, value));
    }

    /// Copies `key` and `value` into `buf` and appends the pair.
    pub fn add_content(&mut self, buf: &mut SourceBuffer, key: &str, value: &[u8]) {
        let k = buf.copy_str(key);
        let v = buf.copy_bytes(value);
        self.contents.push((k, v));
    }

    /// Looks up a content value by key.
    pub fn content<'a>(&self, buf: &'a SourceBuffer, key: &str) -> Option<&'a [u8]> {
        self.contents
            .iter()
            .find(|(k, _)| buf.get(*k) == key.as_bytes())
            .map(|(_, v)| buf.get(*v))
    }

    pub fn has_content(&self, buf: &SourceBuffer, key: &str) -> bool {
        self.content(buf, key).is_some()
    }

    /// Replaces the value of `key` in place, or appends if absent.
    pub fn set_content(&mut self, buf: &mut SourceBuffer, key: &str, value: &[u8]) {
        let v = buf.copy_bytes(value);
        if let Some(slot) = self
            .contents
            .iter_mut()
            .find(|(k, _)| buf.get(*k) == key.as_bytes())
        {
            slot.1 = v;
        } else {
            let k = buf.copy_str(key);
            self.contents.push((k, v));
        }
    }

    /// Removes the first content pair matching `key`; returns whether one
    /// was removed.
    pub fn remove_content(&mut self, buf: &SourceBuffer, key: &str) -> bool {
        if let Some(pos) = self
            .contents
            .iter()
            .position(|(k, _)| buf.get(*k) == key.as_bytes())
        {
            self.contents.remove(pos);
            true
        } else {
            false
        }
    }

    /// Ordered iteration over raw (key, value) span pairs.
    pub fn contents(&self) -> &[(StrSpan, StrSpan)] {
        &self.contents
    }

    pub fn content_count(&self) -> usize {
        self.contents.len()
    }
}

/// One metric sample.
#[derive(Debug, Clone)]
pub struct MetricEvent {
    pub name: String,
    pub value: f64,
    pub timestamp: i64,
    pub tags: Vec<(String, String)>,
}

impl MetricEvent {
    pub fn new(name: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }
}

/// One span. Minimal shape: identity, name, and nanosecond bounds.
#[derive(Debug, Clone)]
pub struct SpanEvent {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub start_time_ns: u64,
    pub end_time_ns: u64,
    pub tags: Vec<(String, String)>,
}

/// The tagged event variant a group carries.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Log(LogEvent),
    Metric(MetricEvent),
    Span(SpanEvent),
}

impl PipelineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PipelineEvent::Log(_) => EventKind::Log,
            PipelineEvent::Metric(_) => EventKind::Metric,
            PipelineEvent::Span(_) => EventKind::Span,
        }
    }

    pub fn as_log(&self) -> Option<&LogEvent> {
        match self {
            PipelineEvent::Log(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_log_mut(&mut self) -> Option<&mut LogEvent> {
        match self {
            PipelineEvent::Log(event) => Some(event),
            _ => None,
        }
    }
}
