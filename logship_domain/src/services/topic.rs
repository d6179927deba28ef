// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Topic Derivation
//!
//! Derives an event group's topic from the source path per the pipeline's
//! topic policy. The `default` policy mirrors long-standing collector
//! behaviour: drop the final extension, collapse any `@suffix` host segment
//! up to its next path separator, and strip a leftover trailing `.log`.

use crate::entities::TopicPolicy;

/// Derives the topic for a group read from `path`.
pub fn derive_topic(path: &str, policy: &TopicPolicy, group_topic: Option<&str>) -> Option<String> {
    match policy {
        TopicPolicy::None => None,
        TopicPolicy::GroupTopic => group_topic.map(str::to_string),
        TopicPolicy::Custom(topic) => Some(topic.clone()),
        TopicPolicy::DefaultPath => Some(default_topic(path)),
    }
}

fn default_topic(path: &str) -> String {
    let dot = path.rfind('.').unwrap_or(path.len());
    let mut topic = String::new();
    if let Some(at) = path.find('@') {
        if let Some(slash) = path[at..].find('/').map(|i| at + i) {
            if slash < dot {
                topic = format!("{}{}", &path[..at], &path[slash..dot]);
            }
        }
    }
    if topic.is_empty() {
        topic = path[..dot].to_string();
    }
    // A double extension like app.log.1 leaves ".log" behind; strip it.
    if topic.to_ascii_lowercase().ends_with(".log") {
        topic.truncate(topic.len() - 4);
    }
    topic
}
