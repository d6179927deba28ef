// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logship Domain
//!
//! The domain layer of the logship collection agent: the business rules of
//! tailing files, splitting bytes into records, checkpointing read positions,
//! and describing pipelines. It is completely independent of external concerns
//! like the file system watcher, the tokio runtime, HTTP clients, or the
//! on-disk checkpoint store.
//!
//! ## Module Structure
//!
//! ### Entities
//! Objects with identity whose state changes over time:
//!
//! - `LogEvent` / `MetricEvent` / `SpanEvent`: the records flowing through a
//!   pipeline
//! - `EventGroup`: a batch of co-tagged events sharing one `SourceBuffer`
//! - `FileCheckpoint` / `JobCheckpoint`: durable read-position records
//! - `PipelineConfig`: the immutable description of one pipeline
//! - `SenderItem`: a serialised payload owned by exactly one sender queue
//!
//! ### Value Objects
//! Immutable, attribute-equal concepts:
//!
//! - `DevInode`: file identity stable across renames
//! - `FileFingerprint`: identity plus a content signature
//! - `SourceBuffer` / `StrSpan`: the arena discipline that lets parsers work
//!   on substrings without per-record allocation
//! - `QueueKey`: the stable per-(pipeline, flusher) ordering key
//! - `TagKey` / `TagScheme`: the fixed set of semantic tag names
//!
//! ### Domain Services
//! Stateless logic and the capability traits the agent's infrastructure
//! implements:
//!
//! - `split`: whole-line, begin-pattern, and JSON record splitting
//! - `Processor`: one record transform in a pipeline
//! - `Flusher`: the terminal send operation of a sink
//! - `Collector`: a periodically scheduled input
//! - `PluginBridge`: the port to an embedded secondary runtime
//!
//! ## Business Rules and Invariants
//!
//! - For every file checkpoint, `acked_offset <= submitted_offset <= size`
//! - A checkpoint in `Finished` or `Lost` status is never modified again
//! - A job cursor never exceeds the job's file count; reaching it is terminal
//! - A pipeline has at most one value parser, tag-apply comes first, and the
//!   timestamp parser follows the value parser
//! - Within one file, emitted records preserve on-disk byte order

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
// These exports provide a clean API surface for consumers of the domain layer
pub use entities::{
    EventGroup, EventKind, FileCheckpoint, FileReadStatus, JobCheckpoint, LogEvent, PipelineConfig,
    PipelineEvent, SenderItem, SendingStatus,
};
pub use error::AgentError;
pub use value_objects::{DevInode, FileFingerprint, QueueKey, SourceBuffer, StrSpan, TagKey, TagScheme};
