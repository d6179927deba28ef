// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Error Type
//!
//! This module provides the domain error type for the collection agent.
//! Each variant represents a specific failure mode, grouped into the error
//! kinds the agent treats differently:
//!
//! - *Transient I/O*: retried with backoff (`IoError`, `Timeout`,
//!   `SendFailed`, `ResourceExhausted`)
//! - *Configuration*: refused at install time (`InvalidConfiguration`,
//!   `ValidationError`)
//! - *Checkpoint corruption*: discards the affected job only
//!   (`CheckpointCorrupt`)
//! - *Sink permanent failure*: dead-lettered, never retried
//!   (`PermanentFailure`)
//!
//! Errors never unwind across a tick boundary: a bad record does not abort
//! its group, a bad group does not abort the pipeline, and a bad sink does
//! not abort the agent. Only configuration and fatal OS errors terminate the
//! process.

use thiserror::Error;

/// Domain-specific errors for the collection agent.
///
/// ## Design Principles
///
/// - **Specific**: Each error type represents a specific failure mode
/// - **Actionable**: Error messages provide enough context for debugging
/// - **Categorized**: Errors are grouped by kind for systematic handling
/// - **Recoverable**: Some errors indicate retry-able conditions
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Watcher error: {0}")]
    WatcherError(String),

    #[error("Checkpoint corrupt: {0}")]
    CheckpointCorrupt(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Queue closed: {0}")]
    QueueClosed(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Permanent failure: {0}")]
    PermanentFailure(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Plugin error: {0}")]
    PluginError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AgentError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new checkpoint-corruption error
    pub fn checkpoint_corrupt(msg: impl Into<String>) -> Self {
        Self::CheckpointCorrupt(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error indicates a transient condition worth retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Timeout(_)
                | AgentError::ResourceExhausted(_)
                | AgentError::IoError(_)
                | AgentError::SendFailed(_)
        )
    }

    /// Gets the error category used for alarm keying and metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            AgentError::InvalidConfiguration(_) => "configuration",
            AgentError::ValidationError(_) => "configuration",
            AgentError::IoError(_) => "io",
            AgentError::WatcherError(_) => "watcher",
            AgentError::CheckpointCorrupt(_) => "checkpoint",
            AgentError::SerializationError(_) => "serialization",
            AgentError::QueueClosed(_) => "queue",
            AgentError::ResourceExhausted(_) => "resource",
            AgentError::Timeout(_) => "timeout",
            AgentError::SendFailed(_) => "send",
            AgentError::PermanentFailure(_) => "send",
            AgentError::PipelineNotFound(_) => "pipeline",
            AgentError::PluginError(_) => "plugin",
            AgentError::MetricsError(_) => "metrics",
            AgentError::Cancelled(_) => "cancellation",
            AgentError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::SerializationError(err.to_string())
    }
}

impl From<regex::Error> for AgentError {
    fn from(err: regex::Error) -> Self {
        AgentError::ValidationError(format!("invalid regex: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(AgentError::Timeout("send deadline".into()).is_recoverable());
        assert!(AgentError::IoError("temporarily busy".into()).is_recoverable());
        assert!(!AgentError::PermanentFailure("400".into()).is_recoverable());
        assert!(!AgentError::InvalidConfiguration("bad regex".into()).is_recoverable());
    }

    #[test]
    fn test_categories_are_stable() {
        assert_eq!(AgentError::CheckpointCorrupt("x".into()).category(), "checkpoint");
        assert_eq!(AgentError::SendFailed("x".into()).category(), "send");
        assert_eq!(AgentError::PermanentFailure("x".into()).category(), "send");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AgentError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AgentError::IoError(_)));
    }
}
