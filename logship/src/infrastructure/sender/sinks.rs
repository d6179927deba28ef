// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sinks
//!
//! The terminal flushers shipped with the agent:
//!
//! - [`HttpFlusher`]: POSTs newline-delimited JSON payloads to one
//!   endpoint with a configurable deadline, classifying status codes into
//!   retryable (timeouts, 408/429, 5xx, connect failures) and permanent
//!   (remaining 4xx)
//! - [`FileFlusher`]: appends payloads to a local file; used by tests and
//!   as a debugging sink
//!
//! Protocol codecs beyond this generic surface are out of scope; richer
//! sinks implement the same `Flusher` capability elsewhere.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use logship_domain::entities::{FileFlusherConfig, HttpFlusherConfig};
use logship_domain::services::{Flusher, SendResult};
use logship_domain::{AgentError, SenderItem};

/// Generic HTTP sink.
pub struct HttpFlusher {
    config: HttpFlusherConfig,
    client: reqwest::Client,
}

impl HttpFlusher {
    pub fn new(config: HttpFlusherConfig) -> Result<Arc<Self>, AgentError> {
        // Connect gets its own, shorter budget; the overall deadline is
        // the configured send timeout.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::invalid_config(format!("failed to build http client: {e}")))?;
        Ok(Arc::new(Self { config, client }))
    }
}

#[async_trait]
impl Flusher for HttpFlusher {
    fn name(&self) -> &'static str {
        "flusher_http"
    }

    async fn send(&self, item: &SenderItem) -> SendResult {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/x-ndjson")
            .body(item.data.clone());
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return SendResult::Retry(format!("timeout: {e}")),
            Err(e) if e.is_connect() => return SendResult::Retry(format!("connect: {e}")),
            Err(e) => return SendResult::Retry(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            trace!(endpoint = %self.config.endpoint, "bulk payload accepted");
            return SendResult::Ok;
        }

        let body = response.text().await.unwrap_or_default();
        let reason = format!("{status}: {}", body.chars().take(256).collect::<String>());
        if status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error() {
            SendResult::Retry(reason)
        } else {
            SendResult::Permanent(reason)
        }
    }
}

/// Local file sink, newline-delimited.
pub struct FileFlusher {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl FileFlusher {
    pub fn new(config: FileFlusherConfig) -> Arc<Self> {
        Arc::new(Self {
            path: PathBuf::from(config.path),
            file: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Flusher for FileFlusher {
    fn name(&self) -> &'static str {
        "flusher_file"
    }

    async fn send(&self, item: &SenderItem) -> SendResult {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return SendResult::Retry(format!("mkdir {}: {e}", parent.display()));
                }
            }
            match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
            {
                Ok(file) => *guard = Some(file),
                Err(e) => return SendResult::Retry(format!("open {}: {e}", self.path.display())),
            }
            debug!(path = %self.path.display(), "file sink opened");
        }

        let file = guard.as_mut().expect("opened above");
        let write = async {
            file.write_all(&item.data).await?;
            if !item.data.ends_with(b"\n") {
                file.write_all(b"\n").await?;
            }
            file.flush().await
        };
        match write.await {
            Ok(()) => SendResult::Ok,
            Err(e) => {
                *guard = None; // reopen next attempt
                SendResult::Retry(format!("write {}: {e}", self.path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_domain::QueueKey;
    use tempfile::TempDir;

    fn item(data: &[u8]) -> SenderItem {
        SenderItem::new(data.to_vec(), data.len(), QueueKey::new("p", 0), 0)
    }

    #[tokio::test]
    async fn test_file_flusher_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/payloads.jsonl");
        let flusher = FileFlusher::new(FileFlusherConfig {
            path: path.display().to_string(),
            queue_capacity: 8,
        });

        assert_eq!(flusher.send(&item(br#"{"a":1}"#)).await, SendResult::Ok);
        assert_eq!(flusher.send(&item(br#"{"b":2}"#)).await, SendResult::Ok);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"a\":1}\n{\"b\":2}\n");
    }

    #[tokio::test]
    async fn test_http_flusher_classifies_connect_failure_as_retry() {
        // Nothing listens on this port
        let flusher = HttpFlusher::new(HttpFlusherConfig {
            endpoint: "http://127.0.0.1:1/logs".into(),
            headers: Default::default(),
            timeout_secs: 1,
            max_retries: 3,
            max_concurrency: 2,
            queue_capacity: 8,
        })
        .unwrap();

        match flusher.send(&item(b"{}")).await {
            SendResult::Retry(_) => {}
            other => panic!("expected retry, got {other:?}"),
        }
    }
}
