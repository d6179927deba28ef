// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sender Sub-System
//!
//! Routes finished record batches to sinks through bounded queues with
//! per-destination concurrency limiters, retry with exponential backoff,
//! and at-least-once delivery backed by the checkpoint store:
//!
//! - [`SenderQueue`]: bounded, keyed-FIFO queue; pushes block when full
//! - [`ConcurrencyLimiter`]: adaptive AIMD in-flight gate
//! - [`SinkDriver`]: the retry/backoff loop around one flusher
//! - [`sinks`]: the generic HTTP sink and the local file sink

mod driver;
mod limiter;
mod queue;
pub mod sinks;

pub use driver::{DeadLetterBucket, SinkDriver, SinkDriverConfig};
pub use limiter::{ConcurrencyLimiter, LimiterConfig};
pub use queue::{AckHandle, QueuedItem, SenderQueue};
