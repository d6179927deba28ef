// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logship Bootstrap
//!
//! Entry-point concerns of the agent, kept apart from both the domain and
//! the infrastructure: CLI parsing and validation, the bootstrap logger
//! (usable before the tracing subscriber exists), platform abstraction
//! (hostname, host IP, process priority), POSIX signal handling, graceful
//! shutdown coordination, and exit-code mapping.
//!
//! The binary's `main` calls [`bootstrap_cli`], builds the agent with the
//! validated options, wires [`signals`] into the [`shutdown`] coordinator,
//! and converts the final result through [`exit_code`].

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod platform;
pub mod shutdown;
pub mod signals;

// Re-export commonly used types
pub use cli::{parse_and_validate, LogFormat, ValidatedCli, ValidatedCommand};
pub use exit_code::ExitCode;
pub use shutdown::{CancellationToken, ShutdownCoordinator};

/// Parses and validates the command line in one step.
pub fn bootstrap_cli() -> Result<ValidatedCli, cli::ParseError> {
    cli::parse_and_validate()
}
