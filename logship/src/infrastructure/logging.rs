// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Initialisation
//!
//! Installs the global tracing subscriber. The CLI level is the default
//! filter; `RUST_LOG` overrides it when set, so operators can raise one
//! module's verbosity without touching the service definition. Text format
//! for humans, JSON lines for collectors (including this agent itself).

use tracing_subscriber::EnvFilter;

use logship_bootstrap::LogFormat;
use logship_domain::AgentError;

/// Installs the global subscriber once; later calls fail.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<(), AgentError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AgentError::invalid_config(format!("bad log filter '{level}': {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| AgentError::internal(format!("failed to install subscriber: {e}")))
}
