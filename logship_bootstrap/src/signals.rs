// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Signal Handling
//!
//! Turns SIGINT/SIGTERM (Ctrl-C on Windows) into a shutdown initiation on
//! the coordinator. The listener runs as a detached task for the life of
//! the process; a second signal during the drain forces immediate exit.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::exit_code::ExitCode;
use crate::shutdown::ShutdownCoordinator;

/// Spawns the signal listener task.
pub fn spawn_signal_listener(coordinator: ShutdownCoordinator) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        coordinator.initiate_shutdown();

        // A second signal means "stop waiting for the drain"
        wait_for_signal().await;
        warn!("second shutdown signal received, exiting immediately");
        ExitCode::RuntimeError.exit();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
