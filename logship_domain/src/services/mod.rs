// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Services
//!
//! Stateless domain logic and the capability traits the agent's
//! infrastructure implements:
//!
//! - [`split`]: the three record-splitting algorithms (whole-line,
//!   begin-pattern, JSON)
//! - [`topic`]: topic derivation from source paths
//! - [`Processor`]: one record transform in a pipeline
//! - [`Flusher`]: the terminal send operation of a sink
//! - [`Collector`]: a periodically scheduled input
//! - [`PluginBridge`]: the port to an embedded secondary runtime

mod collector;
mod flusher;
mod plugin_bridge;
mod processor;
pub mod split;
pub mod topic;

pub use collector::Collector;
pub use flusher::{Flusher, SendResult};
pub use plugin_bridge::PluginBridge;
pub use processor::{ParseOutcome, Processor};
