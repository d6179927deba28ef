// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logship Entry Point
//!
//! Thin binary shell: parse and validate the command line, install the
//! tracing subscriber, assemble the agent, wire signals into the shutdown
//! coordinator, run, and map the outcome onto the process exit code.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use logship_bootstrap::exit_code::{result_to_exit_code, ExitCode};
use logship_bootstrap::logger::{BootstrapLogger, ConsoleLogger};
use logship_bootstrap::shutdown::ShutdownCoordinator;
use logship_bootstrap::{signals, ValidatedCommand};

use logship::application::Agent;
use logship::infrastructure::config::AgentSettings;
use logship::infrastructure::logging::init_tracing;

fn main() {
    let bootstrap_logger = ConsoleLogger::new();

    let cli = match logship_bootstrap::bootstrap_cli() {
        Ok(cli) => cli,
        Err(error) => {
            bootstrap_logger.error(&format!("invalid command line: {error}"));
            ExitCode::ConfigurationError.exit();
        }
    };

    if let Err(error) = init_tracing(&cli.log_level, cli.log_format) {
        bootstrap_logger.error(&format!("failed to initialise logging: {error}"));
        ExitCode::ConfigurationError.exit();
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            bootstrap_logger.error(&format!("failed to start runtime: {error}"));
            ExitCode::RuntimeError.exit();
        }
    };

    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(Duration::from_secs(2));
    result_to_exit_code(&result).exit();
}

async fn run(cli: logship_bootstrap::ValidatedCli) -> anyhow::Result<()> {
    let settings =
        AgentSettings::load(cli.settings.as_deref()).context("Invalid configuration: agent settings")?;
    let grace = Duration::from_secs(settings.grace_period_secs.max(1));

    let agent = Agent::build(
        cli.config_dir.clone(),
        cli.data_dir.clone(),
        settings,
        cli.metrics_port,
    )
    .context("failed to assemble agent")?;

    match cli.command {
        ValidatedCommand::Validate => {
            let count = agent
                .validate_configs()
                .context("Invalid configuration: pipeline documents")?;
            println!("{count} pipeline configuration(s) valid");
            Ok(())
        }
        ValidatedCommand::Run => {
            let coordinator = ShutdownCoordinator::new(grace);
            signals::spawn_signal_listener(coordinator.clone());

            let agent = Arc::new(agent);
            let run_coordinator = coordinator.clone();
            let outcome = tokio::spawn(agent.run(run_coordinator));

            // Wait for the run to end (shutdown or startup failure);
            // agent.run drains and completes the coordinator itself.
            let result = outcome.await.context("agent task panicked")?;
            result.map_err(|error| match &error {
                logship::AgentError::InvalidConfiguration(_)
                | logship::AgentError::ValidationError(_) => {
                    anyhow::anyhow!("Invalid configuration: {error}")
                }
                _ => anyhow::anyhow!(error),
            })?;
            Ok(())
        }
    }
}
