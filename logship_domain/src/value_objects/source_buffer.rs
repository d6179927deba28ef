// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Source Buffer Arena
//!
//! One `SourceBuffer` is dedicated to one event group. Every piece of text an
//! event refers to: keys, values, raw record bytes: lives in this arena,
//! and events store [`StrSpan`] index handles instead of owned strings. The
//! group owns the arena, so all of its events become invalid together when
//! the group is released, and parsers can slice records into fields without
//! a single per-field allocation.
//!
//! Spans are byte offsets, not pointers, so the backing storage is free to
//! reallocate as it grows; this replaces the original shared-pointer
//! discipline with plain indices.
//!
//! Log data is bytes. Readers convert foreign encodings before the splitter
//! runs, so arena content is *usually* valid UTF-8, but nothing enforces
//! that; accessors offer both raw-byte and lossy-string views.

use std::borrow::Cow;

/// Initial arena capacity in bytes.
const FIRST_CHUNK_SIZE: usize = 4096;

/// A byte-range handle into a [`SourceBuffer`].
///
/// Spans are meaningless without the buffer they were produced by; the
/// owning `EventGroup` keeps buffer and spans together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StrSpan {
    start: u32,
    len: u32,
}

impl StrSpan {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Append-only byte arena owned by one event group.
#[derive(Debug, Default)]
pub struct SourceBuffer {
    bytes: Vec<u8>,
}

impl SourceBuffer {
    pub fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(FIRST_CHUNK_SIZE),
        }
    }

    /// Creates an arena pre-sized for a known payload, e.g. one read batch.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity.max(FIRST_CHUNK_SIZE)),
        }
    }

    /// Copies `data` into the arena and returns its span.
    pub fn copy_bytes(&mut self, data: &[u8]) -> StrSpan {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(data);
        StrSpan {
            start: start as u32,
            len: data.len() as u32,
        }
    }

    /// Copies a string into the arena and returns its span.
    pub fn copy_str(&mut self, data: &str) -> StrSpan {
        self.copy_bytes(data.as_bytes())
    }

    /// Resolves a span to its raw bytes.
    pub fn get(&self, span: StrSpan) -> &[u8] {
        &self.bytes[span.start as usize..(span.start + span.len) as usize]
    }

    /// Resolves a span to text, replacing any invalid UTF-8.
    pub fn get_str(&self, span: StrSpan) -> Cow<'_, str> {
        String::from_utf8_lossy(self.get(span))
    }

    /// Narrows `span` to the sub-range `[from, to)` of its content.
    ///
    /// Used when a parser identifies a field inside an already-stored record
    /// and wants a span for it without copying.
    pub fn slice(&self, span: StrSpan, from: usize, to: usize) -> StrSpan {
        debug_assert!(from <= to && to <= span.len());
        StrSpan {
            start: span.start + from as u32,
            len: (to - from) as u32,
        }
    }

    /// Total bytes stored.
    pub fn used(&self) -> usize {
        self.bytes.len()
    }
}
