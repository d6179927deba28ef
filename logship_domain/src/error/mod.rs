// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! Hierarchical error type for the agent domain. Errors are categorized so
//! callers can decide between retry, drop, and abort without string matching,
//! and every variant carries enough context to be actionable in logs.
//!
//! Parse misses are deliberately *not* errors: splitters and parsers report
//! them through `ParseOutcome` so the `discard_unmatch` policy can be applied
//! without unwinding (see `services::processor`).

mod agent_error;

pub use agent_error::AgentError;
