// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler
//!
//! Drives periodic tasks: reader ticks, pull collectors, metric exports -
//! on a bounded worker pool with jittered schedules, skip accounting for
//! missed intervals, automatic demotion of chronically slow tasks, and
//! wall-clock time windows. A single cooperative dispatcher computes due
//! times; execution happens on semaphore-bounded tokio tasks.

mod dispatcher;
mod task;

pub use dispatcher::{Scheduler, SchedulerConfig};
pub use task::{ScheduledJob, TaskCounts, TaskSpec, TimeWindow};
