// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Container Registry
//!
//! Container mode turns each live container's rootfs into a search origin
//! and attaches container metadata as event-group tags. The set of live
//! containers arrives as an external command: a JSON object
//! `{"AllCmd": [...]}` whose entries carry `ID`, `Path`, and a flat `Tags`
//! array of alternating keys and values.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use logship_domain::AgentError;

#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(rename = "AllCmd")]
    all_cmd: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Tags", default)]
    tags: Vec<String>,
}

/// One live container: its rootfs and metadata tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub path: PathBuf,
    pub tags: BTreeMap<String, String>,
}

/// The current set of live containers, replaced wholesale per command.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: HashMap<String, ContainerInfo>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the registry from an `{"AllCmd": [...]}` document.
    /// Returns the ids that disappeared (their readers should wind down).
    pub fn apply_command(&mut self, json: &str) -> Result<Vec<String>, AgentError> {
        let raw: RawCommand = serde_json::from_str(json)
            .map_err(|e| AgentError::invalid_config(format!("bad container command: {e}")))?;

        let mut next = HashMap::with_capacity(raw.all_cmd.len());
        for entry in raw.all_cmd {
            let mut tags = BTreeMap::new();
            for pair in entry.tags.chunks(2) {
                if let [key, value] = pair {
                    tags.insert(key.clone(), value.clone());
                }
            }
            next.insert(
                entry.id.clone(),
                ContainerInfo {
                    id: entry.id,
                    path: PathBuf::from(entry.path),
                    tags,
                },
            );
        }

        let removed = self
            .containers
            .keys()
            .filter(|id| !next.contains_key(*id))
            .cloned()
            .collect();
        self.containers = next;
        Ok(removed)
    }

    pub fn containers(&self) -> impl Iterator<Item = &ContainerInfo> {
        self.containers.values()
    }

    pub fn get(&self, id: &str) -> Option<&ContainerInfo> {
        self.containers.get(id)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Group tags for a container per the input's tag-lifting maps:
    /// `external_k8s_label_tag` / `external_env_tag` rename container tags
    /// onto user tag names.
    pub fn lifted_tags(
        &self,
        id: &str,
        label_map: &BTreeMap<String, String>,
        env_map: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let Some(info) = self.containers.get(id) else {
            return out;
        };
        for (source, target) in label_map.iter().chain(env_map.iter()) {
            if let Some(value) = info.tags.get(source) {
                out.insert(target.clone(), value.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMAND: &str = r#"{
        "AllCmd": [
            {"ID": "abc123", "Path": "/containers/abc123/rootfs",
             "Tags": ["io.kubernetes.pod.name", "web-0", "APP_ENV", "prod"]},
            {"ID": "def456", "Path": "/containers/def456/rootfs", "Tags": []}
        ]
    }"#;

    #[test]
    fn test_apply_command_parses_flat_tags() {
        let mut registry = ContainerRegistry::new();
        let removed = registry.apply_command(COMMAND).unwrap();
        assert!(removed.is_empty());
        assert_eq!(registry.len(), 2);

        let web = registry.get("abc123").unwrap();
        assert_eq!(web.path, PathBuf::from("/containers/abc123/rootfs"));
        assert_eq!(web.tags.get("APP_ENV").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_removed_containers_are_reported() {
        let mut registry = ContainerRegistry::new();
        registry.apply_command(COMMAND).unwrap();
        let removed = registry
            .apply_command(r#"{"AllCmd": [{"ID": "abc123", "Path": "/containers/abc123/rootfs", "Tags": []}]}"#)
            .unwrap();
        assert_eq!(removed, vec!["def456".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lifted_tags_follow_rename_maps() {
        let mut registry = ContainerRegistry::new();
        registry.apply_command(COMMAND).unwrap();

        let mut labels = BTreeMap::new();
        labels.insert("io.kubernetes.pod.name".to_string(), "pod_name".to_string());
        let mut envs = BTreeMap::new();
        envs.insert("APP_ENV".to_string(), "environment".to_string());

        let tags = registry.lifted_tags("abc123", &labels, &envs);
        assert_eq!(tags.get("pod_name").map(String::as_str), Some("web-0"));
        assert_eq!(tags.get("environment").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_malformed_command_is_an_error() {
        let mut registry = ContainerRegistry::new();
        assert!(registry.apply_command("{}").is_err());
    }
}
