// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Desensitize Processor
//!
//! Replaces sensitive substrings in one field before records leave the
//! host: every match (or the first, per `replace_all`) of the configured
//! pattern is substituted with the literal replacement.

use logship_domain::entities::DesensitizeConfig;
use logship_domain::services::Processor;
use logship_domain::{AgentError, EventGroup, PipelineEvent};

pub struct DesensitizeProcessor {
    config: DesensitizeConfig,
    regex: regex::bytes::Regex,
}

impl DesensitizeProcessor {
    pub fn new(config: DesensitizeConfig) -> Result<Self, AgentError> {
        let regex = regex::bytes::Regex::new(&config.pattern)?;
        Ok(Self { config, regex })
    }
}

impl Processor for DesensitizeProcessor {
    fn name(&self) -> &'static str {
        "processor_desensitize"
    }

    fn process(&self, group: &mut EventGroup) {
        let mut events = group.take_events();
        for event in &mut events {
            let Some(log) = event.as_log_mut() else { continue };
            let Some(value) = log.content(group.source(), &self.config.source_key) else {
                continue;
            };
            if !self.regex.is_match(value) {
                continue;
            }
            let replacement = self.config.replacement.as_bytes();
            let masked = if self.config.replace_all {
                self.regex.replace_all(value, replacement).into_owned()
            } else {
                self.regex.replace(value, replacement).into_owned()
            };
            log.set_content(group.source_mut(), &self.config.source_key, &masked);
        }
        group.set_events(events);
    }
}
