// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Collector Capability
//!
//! The contract between the scheduler and every periodic input: HTTP
//! scrapes, command outputs, internal metrics, and the host-metric
//! collectors that live outside this repository. The scheduler drives
//! `collect` on the task's jittered cadence; a slow collector is demoted
//! rather than cancelled, so implementations should observe the cooperative
//! cancellation points the scheduler documents.

use async_trait::async_trait;
use std::time::Duration;

use crate::entities::EventGroup;
use crate::error::AgentError;

/// A periodically scheduled input.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable name used for task identity, logs, and metrics labels.
    fn name(&self) -> &str;

    /// Desired collection interval; the scheduler applies jitter on top.
    fn interval(&self) -> Duration;

    /// Performs one collection tick.
    async fn collect(&self) -> Result<Vec<EventGroup>, AgentError>;
}
