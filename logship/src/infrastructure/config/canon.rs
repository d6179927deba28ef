// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # YAML Canonicalisation
//!
//! Parses a YAML document into a JSON value tree. Mapping keys must be
//! scalars and are stringified (YAML allows `1:` where JSON requires
//! `"1":`); anchors and merges are resolved by the YAML parser before we
//! see the tree. Tagged values and other YAML-only constructs are
//! rejected rather than silently mangled.

use serde_json::Value as Json;
use serde_yaml::Value as Yaml;

use logship_domain::AgentError;

/// Parses one pipeline document, YAML or JSON, into a JSON value.
pub fn parse_document(content: &str, is_yaml: bool) -> Result<Json, AgentError> {
    if is_yaml {
        yaml_to_json(content)
    } else {
        serde_json::from_str(content)
            .map_err(|e| AgentError::invalid_config(format!("bad JSON document: {e}")))
    }
}

/// Parses YAML and converts the tree to JSON semantics.
pub fn yaml_to_json(content: &str) -> Result<Json, AgentError> {
    let mut yaml: Yaml = serde_yaml::from_str(content)
        .map_err(|e| AgentError::invalid_config(format!("bad YAML document: {e}")))?;
    yaml.apply_merge()
        .map_err(|e| AgentError::invalid_config(format!("bad YAML merge: {e}")))?;
    convert(yaml)
}

fn convert(value: Yaml) -> Result<Json, AgentError> {
    Ok(match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Json::from(i)
            } else if let Some(u) = n.as_u64() {
                Json::from(u)
            } else {
                serde_json::Number::from_f64(n.as_f64().unwrap_or(0.0))
                    .map(Json::Number)
                    .ok_or_else(|| AgentError::invalid_config("non-finite number in YAML"))?
            }
        }
        Yaml::String(s) => Json::String(s),
        Yaml::Sequence(seq) => {
            Json::Array(seq.into_iter().map(convert).collect::<Result<_, _>>()?)
        }
        Yaml::Mapping(mapping) => {
            let mut object = serde_json::Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => {
                        return Err(AgentError::invalid_config(format!(
                            "unsupported YAML mapping key: {other:?}"
                        )));
                    }
                };
                object.insert(key, convert(value)?);
            }
            Json::Object(object)
        }
        Yaml::Tagged(tagged) => {
            return Err(AgentError::invalid_config(format!(
                "unsupported YAML tag '{}'",
                tagged.tag
            )));
        }
    })
}
