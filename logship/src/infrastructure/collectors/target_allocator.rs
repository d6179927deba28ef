// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pull-Target Discovery
//!
//! When the agent acts as a pull-based scrape client under an operator,
//! configured service-discovery blocks are replaced with a single HTTP SD
//! source:
//!
//! ```text
//! http://{OPERATOR_HOST}:{OPERATOR_PORT}/jobs/{job}/targets?collector_id={POD_NAME}
//! ```
//!
//! carrying the `X-Prometheus-Refresh-Interval-Seconds` header. The
//! response is the standard HTTP SD document: an array of
//! `{"targets": [...], "labels": {...}}` entries.

use serde::Deserialize;
use std::time::Duration;

use logship_domain::AgentError;

/// The operator coordinates from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorEnv {
    pub host: String,
    pub port: u16,
    pub pod_name: String,
}

impl OperatorEnv {
    /// Reads `OPERATOR_HOST`, `OPERATOR_PORT`, `POD_NAME`; absent host
    /// means pull-target discovery is off.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPERATOR_HOST").ok()?;
        if host.is_empty() {
            return None;
        }
        let port = std::env::var("OPERATOR_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8888);
        let pod_name = std::env::var("POD_NAME").unwrap_or_default();
        Some(Self {
            host,
            port,
            pod_name,
        })
    }

    pub fn targets_url(&self, job: &str) -> String {
        format!(
            "http://{}:{}/jobs/{}/targets?collector_id={}",
            self.host, self.port, job, self.pod_name
        )
    }
}

#[derive(Debug, Deserialize)]
struct SdEntry {
    #[serde(default)]
    targets: Vec<String>,
}

/// Fetches the live target list for `job` from the operator.
pub async fn discover_pull_targets(
    env: &OperatorEnv,
    job: &str,
    refresh_interval: Duration,
) -> Result<Vec<String>, AgentError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| AgentError::internal(format!("failed to build sd client: {e}")))?;

    let response = client
        .get(env.targets_url(job))
        .header(
            "X-Prometheus-Refresh-Interval-Seconds",
            refresh_interval.as_secs().to_string(),
        )
        .send()
        .await
        .map_err(|e| AgentError::SendFailed(format!("target discovery for {job}: {e}")))?;
    if !response.status().is_success() {
        return Err(AgentError::SendFailed(format!(
            "target discovery for {job}: {}",
            response.status()
        )));
    }

    let entries: Vec<SdEntry> = response
        .json()
        .await
        .map_err(|e| AgentError::SerializationError(format!("target discovery for {job}: {e}")))?;
    Ok(entries.into_iter().flat_map(|entry| entry.targets).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_url_shape() {
        let env = OperatorEnv {
            host: "operator.kube-system".into(),
            port: 8888,
            pod_name: "logship-0".into(),
        };
        assert_eq!(
            env.targets_url("node-exporter"),
            "http://operator.kube-system:8888/jobs/node-exporter/targets?collector_id=logship-0"
        );
    }

    #[test]
    fn test_sd_document_parses() {
        let doc = r#"[
            {"targets": ["10.0.0.1:9100", "10.0.0.2:9100"], "labels": {"zone": "a"}},
            {"targets": ["10.0.0.3:9100"]}
        ]"#;
        let entries: Vec<SdEntry> = serde_json::from_str(doc).unwrap();
        let targets: Vec<String> = entries.into_iter().flat_map(|e| e.targets).collect();
        assert_eq!(targets.len(), 3);
    }
}
