// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Key Value Object
//!
//! Every sender item carries a `QueueKey` derived from the owning pipeline's
//! name and the target flusher's index. The key serves two purposes:
//!
//! - items with equal keys preserve push order through the sender queues
//! - removing a pipeline drains exactly the items matching its keys
//!
//! Keys compare by value, so a reloaded pipeline with the same name maps to
//! the same queues and inherits their ordering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable ordering/draining key: pipeline name + flusher index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    pipeline: String,
    flusher_index: usize,
}

impl QueueKey {
    pub fn new(pipeline: impl Into<String>, flusher_index: usize) -> Self {
        Self {
            pipeline: pipeline.into(),
            flusher_index,
        }
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn flusher_index(&self) -> usize {
        self.flusher_index
    }

    /// Whether this key belongs to the named pipeline (any flusher).
    pub fn owned_by(&self, pipeline: &str) -> bool {
        self.pipeline == pipeline
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pipeline, self.flusher_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_value() {
        assert_eq!(QueueKey::new("nginx-access", 0), QueueKey::new("nginx-access", 0));
        assert_ne!(QueueKey::new("nginx-access", 0), QueueKey::new("nginx-access", 1));
        assert_ne!(QueueKey::new("nginx-access", 0), QueueKey::new("nginx-error", 0));
    }

    #[test]
    fn test_owned_by_ignores_flusher() {
        let key = QueueKey::new("app", 3);
        assert!(key.owned_by("app"));
        assert!(!key.owned_by("app2"));
    }
}
