// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tag Processor
//!
//! Always the first processor when present. Appends host tags under the
//! pipeline's tag scheme (`host.name`/`host.ip` modern,
//! `__hostname__`/`__user_defined_id__` legacy) and applies the
//! `pipeline_meta_tag` renames, mapping a tag's canonical name onto a
//! user-chosen one.

use std::sync::Arc;

use logship_domain::entities::TagProcessorConfig;
use logship_domain::services::Processor;
use logship_domain::value_objects::{TagKey, TagScheme};
use logship_domain::EventGroup;

use crate::infrastructure::processors::ProcessorContext;

pub struct TagProcessor {
    config: TagProcessorConfig,
    ctx: Arc<ProcessorContext>,
}

impl TagProcessor {
    pub fn new(config: TagProcessorConfig, ctx: Arc<ProcessorContext>) -> Self {
        Self { config, ctx }
    }
}

impl Processor for TagProcessor {
    fn name(&self) -> &'static str {
        "processor_tag"
    }

    fn process(&self, group: &mut EventGroup) {
        if self.config.append_host_tags {
            group.set_tag(
                TagKey::HostName.render(self.ctx.tag_scheme),
                self.ctx.hostname.clone(),
            );
            match self.ctx.tag_scheme {
                TagScheme::Modern => {
                    if let Some(ip) = &self.ctx.host_ip {
                        group.set_tag(TagKey::HostIp.render(TagScheme::Modern), ip.clone());
                    }
                }
                TagScheme::Legacy => {
                    if let Some(id) = &self.ctx.user_defined_id {
                        group.set_tag(TagKey::UserDefinedId.render(TagScheme::Legacy), id.clone());
                    }
                }
            }
        }

        for (from, to) in &self.config.pipeline_meta_tag {
            if let Some(value) = group.remove_tag(from) {
                group.set_tag(to.clone(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ctx(scheme: TagScheme) -> Arc<ProcessorContext> {
        Arc::new(ProcessorContext {
            pipeline: "p".into(),
            alarms: crate::infrastructure::alarms::AlarmSink::new(),
            tag_scheme: scheme,
            enable_timestamp_nanosecond: false,
            hostname: "web-1".into(),
            host_ip: Some("10.0.0.5".into()),
            user_defined_id: Some("fleet-a".into()),
        })
    }

    #[test]
    fn test_modern_host_tags() {
        let processor = TagProcessor::new(
            TagProcessorConfig {
                pipeline_meta_tag: BTreeMap::new(),
                append_host_tags: true,
            },
            ctx(TagScheme::Modern),
        );
        let mut group = EventGroup::new();
        processor.process(&mut group);
        assert_eq!(group.tag("host.name"), Some("web-1"));
        assert_eq!(group.tag("host.ip"), Some("10.0.0.5"));
    }

    #[test]
    fn test_legacy_host_tags_use_user_defined_id() {
        let processor = TagProcessor::new(
            TagProcessorConfig {
                pipeline_meta_tag: BTreeMap::new(),
                append_host_tags: true,
            },
            ctx(TagScheme::Legacy),
        );
        let mut group = EventGroup::new();
        processor.process(&mut group);
        assert_eq!(group.tag("__hostname__"), Some("web-1"));
        assert_eq!(group.tag("__user_defined_id__"), Some("fleet-a"));
        assert_eq!(group.tag("host.ip"), None);
    }

    #[test]
    fn test_meta_tag_rename() {
        let mut renames = BTreeMap::new();
        renames.insert("__path__".to_string(), "file".to_string());
        let processor = TagProcessor::new(
            TagProcessorConfig {
                pipeline_meta_tag: renames,
                append_host_tags: false,
            },
            ctx(TagScheme::Legacy),
        );
        let mut group = EventGroup::new();
        group.set_tag("__path__", "/var/log/app.log");
        processor.process(&mut group);
        assert_eq!(group.tag("file"), Some("/var/log/app.log"));
        assert_eq!(group.tag("__path__"), None);
    }
}
