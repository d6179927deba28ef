// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Configuration
//!
//! The immutable description of one pipeline: a globally unique name, an
//! ordered input list, an ordered processor list, aggregators, an ordered
//! flusher list, an optional route table, and a global options block. The
//! configuration loader parses YAML or JSON into this model (YAML is
//! canonicalised to JSON semantics first) and calls [`PipelineConfig::validate`]
//! before installation; an invalid pipeline is refused and the previous
//! snapshot stays live.
//!
//! ## Composition rules (enforced by `validate`)
//!
//! - at most one *value parser* (regex / json / delimiter / apsara)
//! - the tag-apply processor, when present, must be first
//! - splitters must precede the value parser
//! - the timestamp parser must follow the value parser
//! - filter and desensitize may appear anywhere after the value parser
//! - every route entry must point at an existing flusher, at most once
//! - every configured regex must compile (the `regex` crate dialect:
//!   named groups yes, look-around and backreferences no)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AgentError;
use crate::value_objects::TagScheme;

/// Character encoding of a tailed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Gbk,
}

/// How a group's topic is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum TopicPolicy {
    /// No topic.
    #[default]
    None,
    /// Derive from the file path (extension stripped, `@host` collapsed,
    /// trailing `.log` removed).
    DefaultPath,
    /// Use the pipeline's configured group topic.
    GroupTopic,
    /// A literal topic string.
    Custom(String),
}

impl From<String> for TopicPolicy {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" | "customized" => TopicPolicy::None,
            "default" => TopicPolicy::DefaultPath,
            "group_topic" => TopicPolicy::GroupTopic,
            _ => TopicPolicy::Custom(s),
        }
    }
}

impl From<TopicPolicy> for String {
    fn from(p: TopicPolicy) -> Self {
        match p {
            TopicPolicy::None => "none".into(),
            TopicPolicy::DefaultPath => "default".into(),
            TopicPolicy::GroupTopic => "group_topic".into(),
            TopicPolicy::Custom(s) => s,
        }
    }
}

/// The pipeline-wide options block.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalOptions {
    pub topic_policy: TopicPolicy,
    pub group_topic: Option<String>,
    /// Nice value applied to the agent while this pipeline runs; 0 = leave.
    pub process_priority: i32,
    pub enable_timestamp_nanosecond: bool,
    pub tag_scheme: TagScheme,
    pub user_defined_id: Option<String>,
}

/// Record-splitting mode of a file input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MultilineMode {
    #[default]
    WholeLine,
    BeginPattern,
    Json,
}

/// Multi-line assembly options of a file input.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MultilineConfig {
    pub mode: MultilineMode,
    pub begin_pattern: Option<String>,
    pub discard_unmatch: bool,
}

impl MultilineConfig {
    /// A begin pattern of `.*` matches every line; normalise it to
    /// whole-line mode so the reader skips the regex entirely.
    pub fn normalized(mut self) -> Self {
        if self.mode == MultilineMode::BeginPattern {
            match self.begin_pattern.as_deref() {
                None | Some("") | Some(".*") => {
                    self.mode = MultilineMode::WholeLine;
                    self.begin_pattern = None;
                }
                _ => {}
            }
        }
        self
    }
}

fn default_close_unused_secs() -> u64 {
    3600
}

fn default_tick_interval_ms() -> u64 {
    1000
}

/// A file-tailing input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInputConfig {
    /// Configured glob paths: plain dir + pattern, wildcard path, or `**`.
    pub file_paths: Vec<String>,
    /// Search depth below a wildcard prefix; 0 means the directory itself.
    #[serde(default)]
    pub max_dir_search_depth: usize,
    /// Blacklist: absolute directory paths.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    /// Blacklist: wildcarded directory paths.
    #[serde(default)]
    pub exclude_dir_patterns: Vec<String>,
    /// Blacklist: file-name patterns.
    #[serde(default)]
    pub exclude_file_patterns: Vec<String>,
    /// Collecting directly from `/` is forbidden without this.
    #[serde(default)]
    pub allow_root_collection: bool,
    /// A file may be claimed by more than one pipeline only with this.
    #[serde(default)]
    pub allow_multi_config: bool,
    #[serde(default)]
    pub encoding: TextEncoding,
    #[serde(default)]
    pub multiline: MultilineConfig,
    #[serde(default = "default_close_unused_secs")]
    pub close_unused_reader_interval_sec: u64,
    /// Attach `__file_offset__` / `log.file.offset` to every record.
    #[serde(default)]
    pub enable_log_position_meta: bool,
    /// Bounded job over a fixed file list, consumed in order.
    #[serde(default)]
    pub adhoc: bool,
    /// Treat container rootfs paths as search origins.
    #[serde(default)]
    pub enable_container_discovery: bool,
    /// Container k8s labels to lift into group tags: label name → tag name.
    #[serde(default)]
    pub external_k8s_label_tag: BTreeMap<String, String>,
    /// Container environment values to lift into group tags: env → tag name.
    #[serde(default)]
    pub external_env_tag: BTreeMap<String, String>,
    /// Reader tick interval driven by the scheduler.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_scrape_interval() -> u64 {
    30
}

/// A periodic HTTP scrape input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpScrapeConfig {
    pub job: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default = "default_scrape_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// A periodic command-output input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInputConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_scrape_interval")]
    pub interval_secs: u64,
}

fn default_self_monitor_interval() -> u64 {
    10
}

/// One category row of the self-monitor rules block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfMonitorRule {
    #[serde(rename = "Enable", default = "default_true")]
    pub enable: bool,
    #[serde(rename = "Interval", default = "default_self_monitor_interval")]
    pub interval: u64,
}

fn default_true() -> bool {
    true
}

impl Default for SelfMonitorRule {
    fn default() -> Self {
        Self {
            enable: true,
            interval: default_self_monitor_interval(),
        }
    }
}

/// Which metric categories the internal-metrics input emits.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SelfMonitorRules {
    #[serde(rename = "Agent")]
    pub agent: SelfMonitorRule,
    #[serde(rename = "Runner")]
    pub runner: SelfMonitorRule,
    #[serde(rename = "Pipeline")]
    pub pipeline: SelfMonitorRule,
    #[serde(rename = "PluginSource")]
    pub plugin_source: SelfMonitorRule,
    #[serde(rename = "Plugin")]
    pub plugin: SelfMonitorRule,
    #[serde(rename = "Component")]
    pub component: SelfMonitorRule,
}

/// The internal-metrics input.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InternalMetricsConfig {
    pub rules: SelfMonitorRules,
}

/// One input of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputConfig {
    #[serde(rename = "input_file")]
    File(FileInputConfig),
    #[serde(rename = "input_http")]
    HttpScrape(HttpScrapeConfig),
    #[serde(rename = "input_command")]
    Command(CommandInputConfig),
    #[serde(rename = "input_internal_metrics")]
    InternalMetrics(InternalMetricsConfig),
}

fn default_content_key() -> String {
    "content".into()
}

/// tag-apply: rename pipeline meta tags and optionally append host tags.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TagProcessorConfig {
    /// Semantic tag renames: canonical name → user name.
    pub pipeline_meta_tag: BTreeMap<String, String>,
    pub append_host_tags: bool,
}

/// split-by-terminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitTerminatorConfig {
    #[serde(default = "default_content_key")]
    pub source_key: String,
    #[serde(default = "default_newline")]
    pub terminator: String,
}

fn default_newline() -> String {
    "\n".into()
}

/// split-by-regex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRegexConfig {
    #[serde(default = "default_content_key")]
    pub source_key: String,
    pub begin_pattern: String,
    #[serde(default)]
    pub discard_unmatch: bool,
}

/// parse-regex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseRegexConfig {
    #[serde(default = "default_content_key")]
    pub source_key: String,
    pub pattern: String,
    /// Names for positional capture groups; named groups win over these.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub discard_unmatch: bool,
    #[serde(default)]
    pub keep_source: bool,
}

/// parse-json.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ParseJsonConfig {
    #[serde(default = "default_content_key")]
    pub source_key: String,
    pub discard_unmatch: bool,
    pub keep_source: bool,
}

/// parse-delimiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseDelimiterConfig {
    #[serde(default = "default_content_key")]
    pub source_key: String,
    #[serde(default = "default_tab")]
    pub separator: String,
    #[serde(default)]
    pub quote: Option<char>,
    pub keys: Vec<String>,
    #[serde(default)]
    pub discard_unmatch: bool,
    #[serde(default)]
    pub keep_source: bool,
}

fn default_tab() -> String {
    "\t".into()
}

fn default_time_key() -> String {
    "time".into()
}

/// parse-timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseTimestampConfig {
    #[serde(default = "default_time_key")]
    pub source_key: String,
    /// strftime-style format string.
    pub format: String,
    #[serde(default)]
    pub timezone_offset_secs: i32,
}

/// parse-apsara-format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ParseApsaraConfig {
    #[serde(default = "default_content_key")]
    pub source_key: String,
    pub timezone_offset_secs: i32,
    /// Compensates the known microsecond-timezone pitfall of the format.
    pub adjust_microsecond_timezone: bool,
    pub keep_source: bool,
    pub discard_unmatch: bool,
}

/// filter-by-regex: every include pattern must match, no exclude may.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FilterRegexConfig {
    pub include: BTreeMap<String, String>,
    pub exclude: BTreeMap<String, String>,
}

/// desensitize-substring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesensitizeConfig {
    #[serde(default = "default_content_key")]
    pub source_key: String,
    /// Pattern selecting the sensitive substring.
    pub pattern: String,
    pub replacement: String,
    #[serde(default = "default_true")]
    pub replace_all: bool,
}

/// drop: discards every event of the group.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DropConfig {}

/// add-fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AddFieldsConfig {
    pub fields: BTreeMap<String, String>,
    pub overwrite: bool,
}

/// One processor of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessorConfig {
    #[serde(rename = "processor_tag")]
    Tag(TagProcessorConfig),
    #[serde(rename = "processor_split_terminator")]
    SplitTerminator(SplitTerminatorConfig),
    #[serde(rename = "processor_split_regex")]
    SplitRegex(SplitRegexConfig),
    #[serde(rename = "processor_parse_regex")]
    ParseRegex(ParseRegexConfig),
    #[serde(rename = "processor_parse_json")]
    ParseJson(ParseJsonConfig),
    #[serde(rename = "processor_parse_delimiter")]
    ParseDelimiter(ParseDelimiterConfig),
    #[serde(rename = "processor_parse_timestamp")]
    ParseTimestamp(ParseTimestampConfig),
    #[serde(rename = "processor_parse_apsara")]
    ParseApsara(ParseApsaraConfig),
    #[serde(rename = "processor_filter_regex")]
    FilterRegex(FilterRegexConfig),
    #[serde(rename = "processor_desensitize")]
    Desensitize(DesensitizeConfig),
    #[serde(rename = "processor_drop")]
    Drop(DropConfig),
    #[serde(rename = "processor_add_fields")]
    AddFields(AddFieldsConfig),
}

impl ProcessorConfig {
    /// Whether this is a member of the "parse a record's value into fields"
    /// family, of which a pipeline may have at most one.
    pub fn is_value_parser(&self) -> bool {
        matches!(
            self,
            ProcessorConfig::ParseRegex(_)
                | ProcessorConfig::ParseJson(_)
                | ProcessorConfig::ParseDelimiter(_)
                | ProcessorConfig::ParseApsara(_)
        )
    }

    pub fn is_splitter(&self) -> bool {
        matches!(
            self,
            ProcessorConfig::SplitTerminator(_) | ProcessorConfig::SplitRegex(_)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ProcessorConfig::Tag(_) => "processor_tag",
            ProcessorConfig::SplitTerminator(_) => "processor_split_terminator",
            ProcessorConfig::SplitRegex(_) => "processor_split_regex",
            ProcessorConfig::ParseRegex(_) => "processor_parse_regex",
            ProcessorConfig::ParseJson(_) => "processor_parse_json",
            ProcessorConfig::ParseDelimiter(_) => "processor_parse_delimiter",
            ProcessorConfig::ParseTimestamp(_) => "processor_parse_timestamp",
            ProcessorConfig::ParseApsara(_) => "processor_parse_apsara",
            ProcessorConfig::FilterRegex(_) => "processor_filter_regex",
            ProcessorConfig::Desensitize(_) => "processor_desensitize",
            ProcessorConfig::Drop(_) => "processor_drop",
            ProcessorConfig::AddFields(_) => "processor_add_fields",
        }
    }
}

fn default_batch_events() -> usize {
    1024
}

fn default_batch_bytes() -> usize {
    512 * 1024
}

/// The default aggregator batches groups by event count and byte size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub max_events: usize,
    pub max_bytes: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_events: default_batch_events(),
            max_bytes: default_batch_bytes(),
        }
    }
}

fn default_send_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_concurrency() -> u32 {
    8
}

fn default_queue_capacity() -> usize {
    1024
}

/// Generic HTTP sink: newline-delimited JSON POSTed to one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpFlusherConfig {
    pub endpoint: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Local file sink: newline-delimited JSON appended to one path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFlusherConfig {
    pub path: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// One flusher of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlusherConfig {
    #[serde(rename = "flusher_http")]
    Http(HttpFlusherConfig),
    #[serde(rename = "flusher_file")]
    File(FileFlusherConfig),
}

impl FlusherConfig {
    pub fn queue_capacity(&self) -> usize {
        match self {
            FlusherConfig::Http(c) => c.queue_capacity,
            FlusherConfig::File(c) => c.queue_capacity,
        }
    }
}

/// Route predicate, evaluated against a whole group.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum ConditionConfig {
    /// `log | metric | span` against the group's homogeneous kind.
    EventType { value: String },
    /// Exact-string comparison of one tag.
    TagValue { key: String, value: String },
    /// The sink receives every group.
    #[default]
    Always,
}

/// One row of the route table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    pub flusher_index: usize,
    #[serde(default)]
    pub condition: ConditionConfig,
}

/// The immutable description of one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Globally unique; the loader fills it from the file name when the
    /// document has no `name` key.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub global: GlobalOptions,
    pub inputs: Vec<InputConfig>,
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
    #[serde(default)]
    pub aggregators: Vec<AggregatorConfig>,
    pub flushers: Vec<FlusherConfig>,
    #[serde(default)]
    pub route: Vec<RouteEntry>,
}

impl PipelineConfig {
    /// Index of the value parser in `processors`, if any.
    pub fn value_parser_index(&self) -> Option<usize> {
        self.processors.iter().position(ProcessorConfig::is_value_parser)
    }

    /// The effective aggregator (default identity batching when absent).
    pub fn aggregator(&self) -> AggregatorConfig {
        self.aggregators.first().cloned().unwrap_or_default()
    }

    /// Checks the composition rules; an `Err` refuses installation.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.name.is_empty() {
            return Err(AgentError::invalid_config("pipeline name is empty"));
        }
        if self.inputs.is_empty() {
            return Err(AgentError::invalid_config(format!(
                "pipeline '{}' has no inputs",
                self.name
            )));
        }
        if self.flushers.is_empty() {
            return Err(AgentError::invalid_config(format!(
                "pipeline '{}' has no flushers",
                self.name
            )));
        }

        let parser_positions: Vec<usize> = self
            .processors
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_value_parser())
            .map(|(i, _)| i)
            .collect();
        if parser_positions.len() > 1 {
            return Err(AgentError::invalid_config(format!(
                "pipeline '{}' has {} value parsers; at most one is allowed",
                self.name,
                parser_positions.len()
            )));
        }
        let parser_at = parser_positions.first().copied();

        for (i, processor) in self.processors.iter().enumerate() {
            match processor {
                ProcessorConfig::Tag(_) if i != 0 => {
                    return Err(AgentError::invalid_config(format!(
                        "pipeline '{}': processor_tag must be first, found at {}",
                        self.name, i
                    )));
                }
                ProcessorConfig::ParseTimestamp(_) => match parser_at {
                    Some(p) if p < i => {}
                    _ => {
                        return Err(AgentError::invalid_config(format!(
                            "pipeline '{}': processor_parse_timestamp must follow the value parser",
                            self.name
                        )));
                    }
                },
                ProcessorConfig::FilterRegex(_) | ProcessorConfig::Desensitize(_) => {
                    match parser_at {
                        Some(p) if p < i => {}
                        _ => {
                            return Err(AgentError::invalid_config(format!(
                                "pipeline '{}': {} must appear after a value parser",
                                self.name,
                                processor.type_name()
                            )));
                        }
                    }
                }
                p if p.is_splitter() => {
                    if let Some(parser) = parser_at {
                        if parser < i {
                            return Err(AgentError::invalid_config(format!(
                                "pipeline '{}': {} must precede the value parser",
                                self.name,
                                p.type_name()
                            )));
                        }
                    }
                }
                _ => {}
            }
        }

        self.validate_regexes()?;
        self.validate_inputs()?;
        self.validate_route()?;
        Ok(())
    }

    fn validate_regexes(&self) -> Result<(), AgentError> {
        let mut compile = |pattern: &str, what: &str| -> Result<(), AgentError> {
            regex::bytes::Regex::new(pattern).map(|_| ()).map_err(|e| {
                AgentError::invalid_config(format!(
                    "pipeline '{}': invalid {what} regex '{pattern}': {e}",
                    self.name
                ))
            })
        };
        for input in &self.inputs {
            if let InputConfig::File(file) = input {
                if let Some(pattern) = &file.multiline.begin_pattern {
                    compile(pattern, "multiline begin")?;
                }
            }
        }
        for processor in &self.processors {
            match processor {
                ProcessorConfig::SplitRegex(c) => compile(&c.begin_pattern, "split begin")?,
                ProcessorConfig::ParseRegex(c) => compile(&c.pattern, "parse")?,
                ProcessorConfig::Desensitize(c) => compile(&c.pattern, "desensitize")?,
                ProcessorConfig::FilterRegex(c) => {
                    for pattern in c.include.values().chain(c.exclude.values()) {
                        compile(pattern, "filter")?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn validate_inputs(&self) -> Result<(), AgentError> {
        for input in &self.inputs {
            if let InputConfig::File(file) = input {
                if file.file_paths.is_empty() {
                    return Err(AgentError::invalid_config(format!(
                        "pipeline '{}': input_file has no file_paths",
                        self.name
                    )));
                }
                for path in &file.file_paths {
                    let collects_root = std::path::Path::new(path)
                        .parent()
                        .map(|p| p.as_os_str() == "/")
                        .unwrap_or(false)
                        || path == "/";
                    if collects_root && !file.allow_root_collection {
                        return Err(AgentError::invalid_config(format!(
                            "pipeline '{}': collecting from '/' requires allow_root_collection",
                            self.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_route(&self) -> Result<(), AgentError> {
        let mut seen = vec![false; self.flushers.len()];
        for entry in &self.route {
            if entry.flusher_index >= self.flushers.len() {
                return Err(AgentError::invalid_config(format!(
                    "pipeline '{}': route references flusher {} but only {} exist",
                    self.name,
                    entry.flusher_index,
                    self.flushers.len()
                )));
            }
            if seen[entry.flusher_index] {
                return Err(AgentError::invalid_config(format!(
                    "pipeline '{}': route has duplicate entries for flusher {}",
                    self.name, entry.flusher_index
                )));
            }
            seen[entry.flusher_index] = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(processors: Vec<ProcessorConfig>) -> PipelineConfig {
        PipelineConfig {
            name: "test".into(),
            global: GlobalOptions::default(),
            inputs: vec![InputConfig::File(FileInputConfig {
                file_paths: vec!["/var/log/*.log".into()],
                max_dir_search_depth: 0,
                exclude_dirs: vec![],
                exclude_dir_patterns: vec![],
                exclude_file_patterns: vec![],
                allow_root_collection: false,
                allow_multi_config: false,
                encoding: TextEncoding::Utf8,
                multiline: MultilineConfig::default(),
                close_unused_reader_interval_sec: 3600,
                enable_log_position_meta: false,
                adhoc: false,
                enable_container_discovery: false,
                external_k8s_label_tag: BTreeMap::new(),
                external_env_tag: BTreeMap::new(),
                tick_interval_ms: 1000,
            })],
            processors,
            aggregators: vec![],
            flushers: vec![FlusherConfig::File(FileFlusherConfig {
                path: "/tmp/out.jsonl".into(),
                queue_capacity: 16,
            })],
            route: vec![],
        }
    }

    fn parse_regex() -> ProcessorConfig {
        ProcessorConfig::ParseRegex(ParseRegexConfig {
            source_key: "content".into(),
            pattern: r"(?P<level>\w+) (?P<msg>.*)".into(),
            keys: vec![],
            discard_unmatch: false,
            keep_source: false,
        })
    }

    #[test]
    fn test_valid_minimal_pipeline() {
        assert!(minimal_config(vec![]).validate().is_ok());
        assert!(minimal_config(vec![parse_regex()]).validate().is_ok());
    }

    #[test]
    fn test_at_most_one_value_parser() {
        let config = minimal_config(vec![parse_regex(), parse_regex()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tag_must_be_first() {
        let config = minimal_config(vec![
            parse_regex(),
            ProcessorConfig::Tag(TagProcessorConfig::default()),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timestamp_must_follow_parser() {
        let lone = minimal_config(vec![ProcessorConfig::ParseTimestamp(ParseTimestampConfig {
            source_key: "time".into(),
            format: "%Y-%m-%d %H:%M:%S".into(),
            timezone_offset_secs: 0,
        })]);
        assert!(lone.validate().is_err());

        let ordered = minimal_config(vec![
            parse_regex(),
            ProcessorConfig::ParseTimestamp(ParseTimestampConfig {
                source_key: "time".into(),
                format: "%Y-%m-%d %H:%M:%S".into(),
                timezone_offset_secs: 0,
            }),
        ]);
        assert!(ordered.validate().is_ok());
    }

    #[test]
    fn test_invalid_regex_is_refused() {
        let config = minimal_config(vec![ProcessorConfig::ParseRegex(ParseRegexConfig {
            source_key: "content".into(),
            pattern: "(unclosed".into(),
            keys: vec![],
            discard_unmatch: false,
            keep_source: false,
        })]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_root_collection_requires_flag() {
        let mut config = minimal_config(vec![]);
        if let InputConfig::File(file) = &mut config.inputs[0] {
            file.file_paths = vec!["/*.log".into()];
        }
        assert!(config.validate().is_err());

        if let InputConfig::File(file) = &mut config.inputs[0] {
            file.allow_root_collection = true;
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_route_bounds_and_duplicates() {
        let mut config = minimal_config(vec![]);
        config.route = vec![RouteEntry {
            flusher_index: 1,
            condition: ConditionConfig::Always,
        }];
        assert!(config.validate().is_err());

        config.route = vec![
            RouteEntry {
                flusher_index: 0,
                condition: ConditionConfig::Always,
            },
            RouteEntry {
                flusher_index: 0,
                condition: ConditionConfig::EventType { value: "log".into() },
            },
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_topic_policy_parsing() {
        assert_eq!(TopicPolicy::from("none".to_string()), TopicPolicy::None);
        assert_eq!(TopicPolicy::from("Default".to_string()), TopicPolicy::DefaultPath);
        assert_eq!(TopicPolicy::from("group_topic".to_string()), TopicPolicy::GroupTopic);
        assert_eq!(
            TopicPolicy::from("orders".to_string()),
            TopicPolicy::Custom("orders".into())
        );
    }

    #[test]
    fn test_begin_pattern_dot_star_normalises_to_whole_line() {
        let multiline = MultilineConfig {
            mode: MultilineMode::BeginPattern,
            begin_pattern: Some(".*".into()),
            discard_unmatch: false,
        }
        .normalized();
        assert_eq!(multiline.mode, MultilineMode::WholeLine);
        assert!(multiline.begin_pattern.is_none());
    }

    #[test]
    fn test_deserialize_json_document() {
        let doc = serde_json::json!({
            "name": "nginx-access",
            "inputs": [
                {"type": "input_file", "file_paths": ["/var/log/nginx/*.log"]}
            ],
            "processors": [
                {"type": "processor_parse_regex",
                 "pattern": "(?P<ip>\\S+) (?P<rest>.*)"}
            ],
            "flushers": [
                {"type": "flusher_http", "endpoint": "http://collector:8080/v1/logs"}
            ],
            "route": [
                {"flusher_index": 0,
                 "condition": {"match": "event_type", "value": "log"}}
            ]
        });
        let config: PipelineConfig = serde_json::from_value(doc).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.value_parser_index(), Some(0));
        match &config.flushers[0] {
            FlusherConfig::Http(http) => {
                assert_eq!(http.timeout_secs, 15);
                assert_eq!(http.max_retries, 3);
            }
            other => panic!("unexpected flusher {other:?}"),
        }
    }
}
