// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Loading
//!
//! Pipeline documents arrive as YAML or JSON; YAML is canonicalised to
//! JSON semantics before typed deserialisation, so the rest of the agent
//! only ever sees one shape. Agent-level settings load separately through
//! the layered settings file plus `LOGSHIP_*` environment overrides.

mod canon;
mod loader;
mod settings;

pub use canon::{parse_document, yaml_to_json};
pub use loader::{load_pipeline_configs, LoadOutcome};
pub use settings::AgentSettings;
