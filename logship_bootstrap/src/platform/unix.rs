// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Unix platform implementation: libc for hostname and priority.

use super::{Platform, PlatformError};

#[derive(Debug, Default)]
pub struct UnixPlatform;

impl UnixPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for UnixPlatform {
    fn platform_name(&self) -> &'static str {
        "unix"
    }

    fn cpu_count(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    fn hostname(&self) -> String {
        let mut buf = [0u8; 256];
        // SAFETY: buf outlives the call and the length is passed alongside.
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc == 0 {
            let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
            String::from_utf8_lossy(&buf[..end]).into_owned()
        } else {
            "localhost".to_string()
        }
    }

    fn set_process_priority(&self, nice: i32) -> Result<(), PlatformError> {
        if nice == 0 {
            return Ok(());
        }
        // SAFETY: plain syscall on our own pid.
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
        if rc == 0 {
            Ok(())
        } else {
            Err(PlatformError::Io(std::io::Error::last_os_error()))
        }
    }
}
