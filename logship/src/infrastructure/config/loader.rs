// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Config Loader
//!
//! Reads every `*.yaml` / `*.yml` / `*.json` document in the config
//! directory, canonicalises, deserialises, and validates. A document
//! without a `name` key takes its file stem. Invalid documents are
//! collected, not fatal: the caller refuses to install them and keeps the
//! previous configuration for those names.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use logship_domain::{AgentError, PipelineConfig};

use crate::infrastructure::config::canon::parse_document;

/// Result of one directory load.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub configs: Vec<PipelineConfig>,
    pub failures: Vec<(PathBuf, AgentError)>,
}

/// Loads and validates every pipeline document under `dir`, in file-name
/// order (the load order that decides multi-config conflicts).
pub fn load_pipeline_configs(dir: &Path) -> Result<LoadOutcome, AgentError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml") | Some("json")
            )
        })
        .collect();
    paths.sort();

    let mut outcome = LoadOutcome::default();
    let mut seen_names = std::collections::HashSet::new();
    for path in paths {
        match load_one(&path) {
            Ok(config) => {
                if !seen_names.insert(config.name.clone()) {
                    outcome.failures.push((
                        path,
                        AgentError::invalid_config(format!(
                            "duplicate pipeline name '{}'",
                            config.name
                        )),
                    ));
                    continue;
                }
                info!(pipeline = %config.name, path = %path.display(), "loaded pipeline config");
                outcome.configs.push(config);
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "refusing pipeline config");
                outcome.failures.push((path, error));
            }
        }
    }
    Ok(outcome)
}

fn load_one(path: &Path) -> Result<PipelineConfig, AgentError> {
    let content = std::fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let document = parse_document(&content, is_yaml)?;
    let mut config: PipelineConfig = serde_json::from_value(document)
        .map_err(|e| AgentError::invalid_config(format!("bad pipeline document: {e}")))?;
    if config.name.is_empty() {
        config.name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
    }
    config.validate()?;
    Ok(config)
}
