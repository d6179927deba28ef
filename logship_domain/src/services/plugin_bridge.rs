// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Plugin Bridge Port
//!
//! The agent can host an embedded secondary runtime that acts as an extra
//! source/sink pair. This port is the whole contract: the agent publishes
//! back-pressure state and accepts serialised record batches and control
//! commands. The bridge implementation is replaceable at compile or
//! configuration time; the core never depends on more than this trait.

use crate::error::AgentError;
use crate::value_objects::QueueKey;

/// The port a bridge implementation plugs into.
pub trait PluginBridge: Send + Sync {
    /// Whether the sender queue behind `key` currently accepts data.
    fn is_valid_to_send(&self, key: &QueueKey) -> bool;

    /// Hands a serialised record batch to the agent's sender sub-system.
    fn send_records(&self, key: &QueueKey, payload: &[u8]) -> Result<(), AgentError>;

    /// Delivers a control command (start/stop/config) to the bridge.
    fn control(&self, command: &str, payload: &str) -> Result<(), AgentError>;
}
