// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Codes
//!
//! The process exits 0 on graceful shutdown and non-zero on unrecoverable
//! failures. Configuration-load failures get their own code so supervisors
//! can distinguish "fix the config" from "look at the crash".

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Graceful shutdown.
    Success = 0,
    /// Unrecoverable runtime failure.
    RuntimeError = 1,
    /// Unrecoverable configuration-load failure.
    ConfigurationError = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Terminates the process with this code.
    pub fn exit(self) -> ! {
        std::process::exit(self.code())
    }
}

/// Maps a top-level result onto an exit code, treating errors whose chain
/// mentions configuration as configuration failures.
pub fn result_to_exit_code(result: &anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::Success,
        Err(error) => {
            let text = format!("{error:#}").to_ascii_lowercase();
            if text.contains("configuration") || text.contains("invalid config") {
                ExitCode::ConfigurationError
            } else {
                ExitCode::RuntimeError
            }
        }
    }
}
