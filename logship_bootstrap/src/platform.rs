// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Platform Abstraction
//!
//! The host facts the agent needs and the one privileged operation it
//! performs: hostname, a routable host IP (for the `host.ip` tag), CPU
//! count, and process-priority adjustment per a pipeline's global options.
//! Trait-based so tests can fake a host.

use std::net::{IpAddr, UdpSocket};
use thiserror::Error;

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixPlatform;

#[cfg(windows)]
pub use windows::WindowsPlatform;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported on this platform: {0}")]
    NotSupported(String),

    #[error("Platform error: {0}")]
    Other(String),
}

/// Host facts and privileged operations.
pub trait Platform: Send + Sync {
    fn platform_name(&self) -> &'static str;

    fn cpu_count(&self) -> usize;

    /// The host's name, for the `__hostname__` / `host.name` tag.
    fn hostname(&self) -> String;

    /// A routable (non-loopback) address of this host, when determinable.
    fn host_ip(&self) -> Option<IpAddr> {
        routable_ip()
    }

    /// Applies a nice value to the current process. 0 is a no-op.
    fn set_process_priority(&self, nice: i32) -> Result<(), PlatformError>;
}

/// Discovers the local address the default route would use. No packet is
/// sent; connecting a UDP socket only selects a source address.
fn routable_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("203.0.113.1:9").ok()?;
    let addr = socket.local_addr().ok()?.ip();
    if addr.is_loopback() {
        None
    } else {
        Some(addr)
    }
}

#[cfg(unix)]
type PlatformImpl = UnixPlatform;

#[cfg(windows)]
type PlatformImpl = WindowsPlatform;

/// Creates the platform implementation for this build target.
pub fn create_platform() -> Box<dyn Platform> {
    Box::new(PlatformImpl::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_platform_reports_sane_facts() {
        let platform = create_platform();
        assert!(platform.cpu_count() >= 1);
        assert!(!platform.hostname().is_empty());
        assert!(!platform.platform_name().is_empty());
    }

    #[test]
    fn test_priority_zero_is_noop() {
        let platform = create_platform();
        assert!(platform.set_process_priority(0).is_ok());
    }
}
