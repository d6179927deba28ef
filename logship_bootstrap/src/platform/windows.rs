// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Windows platform implementation. Priority adjustment is not wired up;
//! the agent runs at the priority it was started with.

use super::{Platform, PlatformError};

#[derive(Debug, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for WindowsPlatform {
    fn platform_name(&self) -> &'static str {
        "windows"
    }

    fn cpu_count(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    fn hostname(&self) -> String {
        std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
    }

    fn set_process_priority(&self, nice: i32) -> Result<(), PlatformError> {
        if nice == 0 {
            return Ok(());
        }
        Err(PlatformError::NotSupported(
            "process priority adjustment".to_string(),
        ))
    }
}
