// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Collectors
//!
//! Periodic inputs conforming to the scheduler's collector contract: HTTP
//! scrapes, command outputs, and the internal-metrics reader. Host-metric
//! collectors (CPU/memory/disk) live outside this repository and plug into
//! the same `Collector` capability.

mod command;
mod http_scrape;
mod internal_metrics;
mod target_allocator;

pub use command::CommandCollector;
pub use http_scrape::HttpScrapeCollector;
pub use internal_metrics::InternalMetricsCollector;
pub use target_allocator::{discover_pull_targets, OperatorEnv};
