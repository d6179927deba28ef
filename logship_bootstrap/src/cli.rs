// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! Clap-based parsing plus a validation pass that turns raw arguments into
//! a [`ValidatedCli`] the application layer can trust: directories are
//! checked, the log level must parse, and the metrics port must be
//! non-zero. Validation failures map to the configuration exit code, since
//! a bad command line is unrecoverable by definition.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by CLI validation.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("config directory does not exist: {0}")]
    MissingConfigDir(PathBuf),

    #[error("metrics port must be non-zero")]
    InvalidMetricsPort,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line output.
    Text,
    /// JSON lines for machine consumption.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "logship",
    version,
    about = "Host-resident log collection agent",
    long_about = "Discovers and tails log files with durable checkpoints, parses records \
through configurable pipelines, and ships them to sinks with at-least-once delivery."
)]
pub struct Cli {
    /// Directory of pipeline configuration files (YAML or JSON).
    #[arg(long, default_value = "pipelines")]
    pub config_dir: PathBuf,

    /// Directory for durable agent state (checkpoints, dead letters).
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Agent settings file (TOML); defaults are used when absent.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Port of the local /metrics and /health endpoint.
    #[arg(long, default_value_t = 9363)]
    pub metrics_port: u16,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run the agent (the default when no subcommand is given).
    Run,
    /// Load and validate every pipeline configuration, then exit.
    Validate,
}

/// The validated command surface handed to the application layer.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub settings: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedCommand {
    Run,
    Validate,
}

/// Parses `std::env::args` and validates the result.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(Cli::parse())
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if !LEVELS.contains(&cli.log_level.to_ascii_lowercase().as_str()) {
        return Err(ParseError::InvalidLogLevel(cli.log_level));
    }
    if cli.metrics_port == 0 {
        return Err(ParseError::InvalidMetricsPort);
    }
    if !cli.config_dir.is_dir() {
        return Err(ParseError::MissingConfigDir(cli.config_dir));
    }

    Ok(ValidatedCli {
        command: match cli.command {
            None | Some(Commands::Run) => ValidatedCommand::Run,
            Some(Commands::Validate) => ValidatedCommand::Validate,
        },
        config_dir: cli.config_dir,
        data_dir: cli.data_dir,
        settings: cli.settings,
        log_level: cli.log_level.to_ascii_lowercase(),
        log_format: cli.log_format,
        metrics_port: cli.metrics_port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(dir: &std::path::Path) -> Cli {
        Cli {
            config_dir: dir.to_path_buf(),
            data_dir: "data".into(),
            settings: None,
            log_level: "info".into(),
            log_format: LogFormat::Text,
            metrics_port: 9363,
            command: None,
        }
    }

    #[test]
    fn test_default_command_is_run() {
        let dir = std::env::temp_dir();
        let validated = validate_cli(cli_with(&dir)).unwrap();
        assert_eq!(validated.command, ValidatedCommand::Run);
    }

    #[test]
    fn test_bad_log_level_is_rejected() {
        let dir = std::env::temp_dir();
        let mut cli = cli_with(&dir);
        cli.log_level = "loud".into();
        assert!(matches!(
            validate_cli(cli),
            Err(ParseError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_missing_config_dir_is_rejected() {
        let mut cli = cli_with(std::path::Path::new("/definitely/not/here"));
        cli.config_dir = "/definitely/not/here".into();
        assert!(matches!(
            validate_cli(cli),
            Err(ParseError::MissingConfigDir(_))
        ));
    }

    #[test]
    fn test_zero_metrics_port_is_rejected() {
        let dir = std::env::temp_dir();
        let mut cli = cli_with(&dir);
        cli.metrics_port = 0;
        assert!(matches!(validate_cli(cli), Err(ParseError::InvalidMetricsPort)));
    }
}
