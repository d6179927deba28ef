// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processors
//!
//! The ordered record transforms of a pipeline. Each kind is a small
//! struct implementing the domain `Processor` capability; a single sum
//! type enumerates the supported variants and resolves configuration
//! names to them at pipeline construction.
//!
//! Composition rules (one value parser, tag first, timestamp after the
//! parser, filter/desensitize after the parser) are enforced by
//! `PipelineConfig::validate` before any variant is built.

mod desensitize;
mod filter;
mod mutate;
mod parse_apsara;
mod parse_delimiter;
mod parse_json;
mod parse_regex;
mod parse_timestamp;
mod split;
mod tag;

pub use desensitize::DesensitizeProcessor;
pub use filter::FilterRegexProcessor;
pub use mutate::{AddFieldsProcessor, DropProcessor};
pub use parse_apsara::ParseApsaraProcessor;
pub use parse_delimiter::ParseDelimiterProcessor;
pub use parse_json::ParseJsonProcessor;
pub use parse_regex::ParseRegexProcessor;
pub use parse_timestamp::ParseTimestampProcessor;
pub use split::{SplitRegexProcessor, SplitTerminatorProcessor};
pub use tag::TagProcessor;

use std::sync::Arc;

use logship_domain::entities::ProcessorConfig;
use logship_domain::services::Processor;
use logship_domain::value_objects::TagScheme;
use logship_domain::{AgentError, EventGroup};

use crate::infrastructure::alarms::AlarmSink;

/// Everything a processor may need beyond its own configuration.
#[derive(Debug)]
pub struct ProcessorContext {
    pub pipeline: String,
    pub alarms: Arc<AlarmSink>,
    pub tag_scheme: TagScheme,
    pub enable_timestamp_nanosecond: bool,
    pub hostname: String,
    pub host_ip: Option<String>,
    pub user_defined_id: Option<String>,
}

/// The tagged variant enumerating every supported processor.
pub enum ProcessorVariant {
    Tag(TagProcessor),
    SplitTerminator(SplitTerminatorProcessor),
    SplitRegex(SplitRegexProcessor),
    ParseRegex(ParseRegexProcessor),
    ParseJson(ParseJsonProcessor),
    ParseDelimiter(ParseDelimiterProcessor),
    ParseTimestamp(ParseTimestampProcessor),
    ParseApsara(ParseApsaraProcessor),
    FilterRegex(FilterRegexProcessor),
    Desensitize(DesensitizeProcessor),
    Drop(DropProcessor),
    AddFields(AddFieldsProcessor),
}

impl ProcessorVariant {
    /// Resolves one processor config to its variant.
    pub fn build(config: &ProcessorConfig, ctx: &Arc<ProcessorContext>) -> Result<Self, AgentError> {
        Ok(match config {
            ProcessorConfig::Tag(c) => Self::Tag(TagProcessor::new(c.clone(), Arc::clone(ctx))),
            ProcessorConfig::SplitTerminator(c) => {
                Self::SplitTerminator(SplitTerminatorProcessor::new(c.clone()))
            }
            ProcessorConfig::SplitRegex(c) => {
                Self::SplitRegex(SplitRegexProcessor::new(c.clone(), Arc::clone(ctx))?)
            }
            ProcessorConfig::ParseRegex(c) => {
                Self::ParseRegex(ParseRegexProcessor::new(c.clone(), Arc::clone(ctx))?)
            }
            ProcessorConfig::ParseJson(c) => {
                Self::ParseJson(ParseJsonProcessor::new(c.clone(), Arc::clone(ctx)))
            }
            ProcessorConfig::ParseDelimiter(c) => {
                Self::ParseDelimiter(ParseDelimiterProcessor::new(c.clone(), Arc::clone(ctx)))
            }
            ProcessorConfig::ParseTimestamp(c) => {
                Self::ParseTimestamp(ParseTimestampProcessor::new(c.clone(), Arc::clone(ctx)))
            }
            ProcessorConfig::ParseApsara(c) => {
                Self::ParseApsara(ParseApsaraProcessor::new(c.clone(), Arc::clone(ctx)))
            }
            ProcessorConfig::FilterRegex(c) => {
                Self::FilterRegex(FilterRegexProcessor::new(c.clone())?)
            }
            ProcessorConfig::Desensitize(c) => {
                Self::Desensitize(DesensitizeProcessor::new(c.clone())?)
            }
            ProcessorConfig::Drop(_) => Self::Drop(DropProcessor::new()),
            ProcessorConfig::AddFields(c) => Self::AddFields(AddFieldsProcessor::new(c.clone())),
        })
    }

    fn inner(&self) -> &dyn Processor {
        match self {
            Self::Tag(p) => p,
            Self::SplitTerminator(p) => p,
            Self::SplitRegex(p) => p,
            Self::ParseRegex(p) => p,
            Self::ParseJson(p) => p,
            Self::ParseDelimiter(p) => p,
            Self::ParseTimestamp(p) => p,
            Self::ParseApsara(p) => p,
            Self::FilterRegex(p) => p,
            Self::Desensitize(p) => p,
            Self::Drop(p) => p,
            Self::AddFields(p) => p,
        }
    }
}

impl Processor for ProcessorVariant {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn process(&self, group: &mut EventGroup) {
        self.inner().process(group)
    }
}

/// The content key raw records arrive under.
pub const DEFAULT_CONTENT_KEY: &str = "content";
