// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Flusher Capability
//!
//! The terminal send operation of one sink. The sink driver wraps it in the
//! retry/backoff loop; the flusher itself only performs a single delivery
//! attempt and classifies its outcome so the driver can decide between
//! acknowledge, retry, and dead-letter.

use async_trait::async_trait;

use crate::entities::SenderItem;

/// Outcome classification of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    /// 2xx-equivalent success; the driver acknowledges the checkpoint.
    Ok,
    /// Transient failure (timeout, 5xx, connection refused); retried with
    /// backoff until the item's retry budget runs out.
    Retry(String),
    /// Permanent failure (4xx-equivalent); dead-lettered immediately.
    Permanent(String),
}

/// The send side of one sink.
#[async_trait]
pub trait Flusher: Send + Sync {
    /// Stable name used in logs, metrics labels, and alarms.
    fn name(&self) -> &'static str;

    /// Performs one delivery attempt within the caller's deadline.
    async fn send(&self, item: &SenderItem) -> SendResult;
}
