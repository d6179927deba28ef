// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Plugin Bridge Implementation
//!
//! The agent's side of the embedded-runtime port: back-pressure state and
//! serialised payload hand-off into the sender queues. The bridge
//! contract requires callers to check `is_valid_to_send` before pushing;
//! a push against a full queue is refused, never blocked, because the
//! secondary runtime owns its own buffering.

use std::sync::Arc;

use logship_domain::services::PluginBridge;
use logship_domain::{AgentError, QueueKey, SenderItem};

use crate::application::PipelineManager;
use crate::infrastructure::sender::QueuedItem;

/// Bridge port over the installed pipelines' sender queues.
pub struct QueuePluginBridge {
    manager: Arc<PipelineManager>,
}

impl QueuePluginBridge {
    pub fn new(manager: Arc<PipelineManager>) -> Self {
        Self { manager }
    }

    fn queue_of(
        &self,
        key: &QueueKey,
    ) -> Option<(Arc<crate::infrastructure::sender::SenderQueue>, Arc<dyn logship_domain::services::Flusher>)> {
        let pipelines = self.manager.pipelines();
        let pipeline = pipelines.get(key.pipeline())?;
        let queue = pipeline.queues.get(key.flusher_index())?;
        let flusher = pipeline.flushers.get(key.flusher_index())?;
        Some((Arc::clone(queue), Arc::clone(flusher)))
    }
}

impl PluginBridge for QueuePluginBridge {
    fn is_valid_to_send(&self, key: &QueueKey) -> bool {
        self.queue_of(key)
            .map(|(queue, _)| queue.has_space())
            .unwrap_or(false)
    }

    fn send_records(&self, key: &QueueKey, payload: &[u8]) -> Result<(), AgentError> {
        let Some((queue, flusher)) = self.queue_of(key) else {
            return Err(AgentError::PipelineNotFound(key.pipeline().to_string()));
        };
        let item = SenderItem::new(
            payload.to_vec(),
            payload.len(),
            key.clone(),
            chrono::Utc::now().timestamp(),
        );
        if queue.try_push(QueuedItem {
            item,
            flusher,
            acks: Vec::new(),
        }) {
            Ok(())
        } else {
            Err(AgentError::ResourceExhausted(format!(
                "sender queue {key} is full"
            )))
        }
    }

    fn control(&self, command: &str, _payload: &str) -> Result<(), AgentError> {
        match command {
            "start" | "stop" | "reload" => Ok(()),
            other => Err(AgentError::PluginError(format!(
                "unknown bridge command '{other}'"
            ))),
        }
    }
}
