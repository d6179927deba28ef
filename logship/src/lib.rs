// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logship Agent
//!
//! A host-resident collection agent that discovers log files and service
//! endpoints, tails them incrementally with durable position tracking,
//! parses raw bytes into structured records through configurable pipelines,
//! and forwards the results to one or more sinks. It runs unattended for
//! months and tolerates file rotations, container churn, partial writes,
//! sink outages, and configuration reloads without duplicating or dropping
//! data in the normal case.
//!
//! ## Architecture
//!
//! The crate follows the workspace's layered layout:
//!
//! - **Application Layer** (`application`): the `Agent` root object that
//!   owns every service, the pipeline manager that installs and tears down
//!   pipelines atomically, and the runtime pipeline itself
//! - **Infrastructure Layer** (`infrastructure`): the checkpoint store, the
//!   file-system event listener, discovery and matching, the tailing
//!   readers, processors, the router, the scheduler, the sender sub-system,
//!   collectors, self-observability, and configuration loading
//!
//! Pure domain logic (events, checkpoint entities, splitters, capability
//! traits) lives in `logship-domain`; entry-point plumbing (CLI, signals,
//! shutdown, platform) lives in `logship-bootstrap`.
//!
//! ## Data Flow
//!
//! ```text
//! listener → discovery → reader → splitter → processors → router
//!                                                           ↓
//!                      checkpoint store ← sink driver ← sender queues
//! ```
//!
//! Control flows top-down from the scheduler into readers and collectors,
//! and from sink drivers back into the checkpoint store as
//! acknowledgements.
//!
//! ## Delivery Guarantees
//!
//! At-least-once: a sink acknowledgement advances the file's acked offset,
//! the checkpoint dumper persists it on a fixed cadence, and a restart
//! resumes from the last persisted acked offset. Duplication after a crash
//! is bounded by one dump interval. Within one file and one sink queue key,
//! payload order matches on-disk byte order.

pub mod application;
pub mod infrastructure;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory

// Re-export domain types for convenient access
pub use logship_domain::{
    AgentError, DevInode, EventGroup, FileCheckpoint, FileFingerprint, FileReadStatus,
    JobCheckpoint, LogEvent, PipelineConfig, QueueKey, SenderItem, SourceBuffer,
};
