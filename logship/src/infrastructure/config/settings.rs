// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Settings
//!
//! Process-wide tunables, distinct from pipeline documents: a TOML file
//! layered under `LOGSHIP_*` environment overrides. Everything has a
//! default, so the agent starts with no settings file at all.

use serde::Deserialize;
use std::path::Path;

use logship_domain::AgentError;

fn default_dump_interval() -> u64 {
    15
}

fn default_scheduler_workers() -> usize {
    8
}

fn default_event_queue_capacity() -> usize {
    64
}

fn default_grace_period() -> u64 {
    5
}

fn default_watch_queue_capacity() -> usize {
    1024
}

/// Agent-level tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Checkpoint dump cadence in seconds.
    pub checkpoint_dump_interval_secs: u64,
    /// Scheduler worker pool size.
    pub scheduler_workers: usize,
    /// Capacity of each pipeline's processor input queue.
    pub event_queue_capacity: usize,
    /// Shutdown grace period in seconds.
    pub grace_period_secs: u64,
    /// Capacity of the fs-event stream.
    pub watch_queue_capacity: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            checkpoint_dump_interval_secs: default_dump_interval(),
            scheduler_workers: default_scheduler_workers(),
            event_queue_capacity: default_event_queue_capacity(),
            grace_period_secs: default_grace_period(),
            watch_queue_capacity: default_watch_queue_capacity(),
        }
    }
}

impl AgentSettings {
    /// Loads the settings file (optional) layered under `LOGSHIP_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AgentError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("LOGSHIP"))
            .build()
            .map_err(|e| AgentError::invalid_config(format!("bad agent settings: {e}")))?;
        settings
            .try_deserialize()
            .map_err(|e| AgentError::invalid_config(format!("bad agent settings: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let settings = AgentSettings::load(None).unwrap();
        assert_eq!(settings.checkpoint_dump_interval_secs, 15);
        assert_eq!(settings.scheduler_workers, 8);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "checkpoint_dump_interval_secs = 5").unwrap();
        writeln!(file, "scheduler_workers = 2").unwrap();

        let settings = AgentSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.checkpoint_dump_interval_secs, 5);
        assert_eq!(settings.scheduler_workers, 2);
        assert_eq!(settings.grace_period_secs, 5, "untouched keys keep defaults");
    }
}
