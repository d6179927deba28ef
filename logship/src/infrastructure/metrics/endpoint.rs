// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Endpoint
//!
//! A lightweight HTTP server exposing the Prometheus registry:
//!
//! - `GET /metrics`: exposition-format metrics, generated fresh per request
//! - `GET /health`: "OK" for liveness probes
//!
//! Raw tokio `TcpListener` with a one-line request parser; the agent does
//! not carry an HTTP framework for two endpoints. Connections are handled
//! concurrently; individual request errors are logged and never stop the
//! server.

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use logship_domain::AgentError;

use crate::infrastructure::metrics::service::MetricsService;

/// HTTP server for `/metrics` and `/health`.
pub struct MetricsEndpoint {
    metrics_service: Arc<MetricsService>,
    port: u16,
}

impl MetricsEndpoint {
    pub fn new(metrics_service: Arc<MetricsService>, port: u16) -> Self {
        Self {
            metrics_service,
            port,
        }
    }

    /// Binds and serves until the process shuts down.
    pub async fn start(&self) -> Result<(), AgentError> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AgentError::internal(format!("failed to bind metrics endpoint: {e}")))?;

        info!("Prometheus metrics endpoint started on http://{}/metrics", addr);

        loop {
            match listener.accept().await {
                Ok((mut stream, _)) => {
                    let metrics_service = Arc::clone(&self.metrics_service);
                    tokio::spawn(async move {
                        if let Err(e) = handle_request(&mut stream, metrics_service).await {
                            error!("Error handling metrics request: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting metrics connection: {}", e);
                }
            }
        }
    }
}

async fn handle_request(
    stream: &mut TcpStream,
    metrics_service: Arc<MetricsService>,
) -> Result<(), AgentError> {
    let mut buffer = [0u8; 1024];
    let read = stream.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..read]);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let response = match path {
        "/metrics" => match metrics_service.export_text() {
            Ok(body) => format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            ),
            Err(e) => format!(
                "HTTP/1.1 500 Internal Server Error\r\nContent-Length: {}\r\n\r\n{}",
                e.to_string().len(),
                e
            ),
        },
        "/health" => "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nOK".to_string(),
        _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_string(),
    };

    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener as TestListener;

    async fn request(addr: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {path} HTTP/1.1\r\nHost: x\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match tokio::time::timeout(std::time::Duration::from_millis(500), stream.read(&mut buf)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => out.extend_from_slice(&buf[..n]),
                Ok(Err(_)) => break,
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    #[tokio::test]
    async fn test_health_and_metrics_paths() {
        let service = Arc::new(MetricsService::new().unwrap());
        service.events_in_total.inc();

        // Bind on an ephemeral port, then run the same accept loop inline
        let listener = TestListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let serve_service = Arc::clone(&service);
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let service = Arc::clone(&serve_service);
                tokio::spawn(async move {
                    let _ = handle_request(&mut stream, service).await;
                });
            }
        });

        let health = request(&addr, "/health").await;
        assert!(health.contains("200 OK"));
        assert!(health.ends_with("OK"));

        let metrics = request(&addr, "/metrics").await;
        assert!(metrics.contains("logship_events_in_total 1"));

        let missing = request(&addr, "/nope").await;
        assert!(missing.contains("404"));
    }
}
