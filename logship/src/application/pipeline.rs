// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Runtime Pipeline
//!
//! The installed form of one pipeline config: compiled processors in
//! order, the route table, one flusher + bounded queue per sink, and the
//! pipeline's metrics record. Immutable after construction; a reload
//! builds a new instance and swaps it in, while in-flight items keep
//! their `Arc` references to the old flushers until their sends resolve.

use std::sync::Arc;

use logship_domain::entities::{AggregatorConfig, FlusherConfig};
use logship_domain::services::{Flusher, Processor};
use logship_domain::{AgentError, EventGroup, PipelineConfig, PipelineEvent, QueueKey};

use crate::infrastructure::metrics::exporter::CATEGORY_LABEL;
use crate::infrastructure::metrics::records::MetricsRecord;
use crate::infrastructure::metrics::{MetricNames, WriteMetrics};
use crate::infrastructure::processors::{ProcessorContext, ProcessorVariant};
use crate::infrastructure::router::Router;
use crate::infrastructure::sender::sinks::{FileFlusher, HttpFlusher};
use crate::infrastructure::sender::{AckHandle, QueuedItem, SenderQueue};

/// One installed pipeline.
pub struct RuntimePipeline {
    pub config: PipelineConfig,
    pub ctx: Arc<ProcessorContext>,
    processors: Vec<ProcessorVariant>,
    router: Router,
    pub flushers: Vec<Arc<dyn Flusher>>,
    pub queues: Vec<Arc<SenderQueue>>,
    pub queue_keys: Vec<QueueKey>,
    aggregator: AggregatorConfig,
    metrics: Arc<MetricsRecord>,
}

impl RuntimePipeline {
    /// Compiles a validated config into its runtime form.
    pub fn build(
        config: PipelineConfig,
        ctx: Arc<ProcessorContext>,
        write_metrics: &WriteMetrics,
    ) -> Result<Arc<Self>, AgentError> {
        config.validate()?;

        let mut processors = Vec::with_capacity(config.processors.len());
        for processor_config in &config.processors {
            processors.push(ProcessorVariant::build(processor_config, &ctx)?);
        }

        let router = Router::build(&config.route, config.flushers.len())?;

        let mut flushers: Vec<Arc<dyn Flusher>> = Vec::with_capacity(config.flushers.len());
        let mut queues = Vec::with_capacity(config.flushers.len());
        let mut queue_keys = Vec::with_capacity(config.flushers.len());
        for (index, flusher_config) in config.flushers.iter().enumerate() {
            let flusher: Arc<dyn Flusher> = match flusher_config {
                FlusherConfig::Http(http) => HttpFlusher::new(http.clone())?,
                FlusherConfig::File(file) => FileFlusher::new(file.clone()),
            };
            flushers.push(flusher);
            queues.push(SenderQueue::new(flusher_config.queue_capacity()));
            queue_keys.push(QueueKey::new(&config.name, index));
        }

        let metrics = write_metrics.create_record(vec![
            (CATEGORY_LABEL.to_string(), "Pipeline".to_string()),
            ("pipeline".to_string(), config.name.clone()),
        ]);

        let aggregator = config.aggregator();
        Ok(Arc::new(Self {
            config,
            ctx,
            processors,
            router,
            flushers,
            queues,
            queue_keys,
            aggregator,
            metrics,
        }))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn aggregator(&self) -> &AggregatorConfig {
        &self.aggregator
    }

    pub fn metrics(&self) -> &Arc<MetricsRecord> {
        &self.metrics
    }

    /// Runs the ordered processor list over one group.
    pub fn process_group(&self, group: &mut EventGroup) {
        let events_in = group.len() as u64;
        let bytes_in = group.data_size() as u64;
        self.metrics.counter(MetricNames::IN_EVENTS_TOTAL).add(events_in);
        self.metrics.counter(MetricNames::IN_SIZE_BYTES).add(bytes_in);

        let started = std::time::Instant::now();
        for processor in &self.processors {
            processor.process(group);
            if group.is_empty() {
                break;
            }
        }
        self.metrics
            .counter(MetricNames::TOTAL_PROCESS_TIME_MS)
            .add(started.elapsed().as_millis() as u64);

        let events_out = group.len() as u64;
        self.metrics.counter(MetricNames::OUT_EVENTS_TOTAL).add(events_out);
        if events_out < events_in {
            self.metrics
                .counter(MetricNames::DISCARDED_EVENTS_TOTAL)
                .add(events_in - events_out);
        }
    }

    /// Routes a processed group and enqueues one serialised copy per
    /// matched sink. Pushing suspends on full queues (back-pressure).
    pub async fn dispatch(&self, group: &EventGroup, acks: &[AckHandle]) {
        if group.is_empty() {
            return;
        }
        let matched = self.router.route(group);
        if matched.is_empty() {
            return;
        }
        // Sink-specific copies: the shared group itself is never mutated.
        let payload = serialize_group(group);
        let raw_size = group.data_size();
        let now = chrono::Utc::now().timestamp();
        for index in matched {
            let item = logship_domain::SenderItem::new(
                payload.clone(),
                raw_size,
                self.queue_keys[index].clone(),
                now,
            );
            self.metrics
                .counter(MetricNames::OUT_SIZE_BYTES)
                .add(item.wire_size() as u64);
            self.queues[index]
                .push(QueuedItem {
                    item,
                    flusher: Arc::clone(&self.flushers[index]),
                    acks: acks.to_vec(),
                })
                .await;
        }
    }
}

/// Serialises one group as newline-delimited JSON, one line per event.
pub fn serialize_group(group: &EventGroup) -> Vec<u8> {
    let mut out = Vec::with_capacity(group.data_size() + 256);
    let tags: serde_json::Map<String, serde_json::Value> = group
        .tags()
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    let topic = group.metadata().topic.clone();
    let pack_id = group.metadata().pack_id.clone();

    for event in group.events() {
        let mut line = serde_json::Map::new();
        match event {
            PipelineEvent::Log(log) => {
                line.insert("time".into(), log.timestamp().into());
                if let Some(ns) = log.timestamp_ns() {
                    line.insert("time_ns".into(), ns.into());
                }
                let mut contents = serde_json::Map::new();
                for (key, value) in log.contents() {
                    contents.insert(
                        group.source().get_str(*key).into_owned(),
                        serde_json::Value::String(group.source().get_str(*value).into_owned()),
                    );
                }
                line.insert("contents".into(), contents.into());
            }
            PipelineEvent::Metric(metric) => {
                line.insert("time".into(), metric.timestamp.into());
                line.insert("name".into(), metric.name.clone().into());
                line.insert("value".into(), metric.value.into());
                let labels: serde_json::Map<String, serde_json::Value> = metric
                    .tags
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                line.insert("labels".into(), labels.into());
            }
            PipelineEvent::Span(span) => {
                line.insert("trace_id".into(), span.trace_id.clone().into());
                line.insert("span_id".into(), span.span_id.clone().into());
                line.insert("name".into(), span.name.clone().into());
                line.insert("start_time_ns".into(), span.start_time_ns.into());
                line.insert("end_time_ns".into(), span.end_time_ns.into());
            }
        }
        if !tags.is_empty() {
            line.insert("tags".into(), tags.clone().into());
        }
        if let Some(topic) = &topic {
            line.insert("topic".into(), topic.clone().into());
        }
        if let Some(pack_id) = &pack_id {
            line.insert("pack_id".into(), pack_id.clone().into());
        }
        // A map of plain JSON values cannot fail to serialise
        let rendered = serde_json::to_vec(&serde_json::Value::Object(line)).unwrap_or_default();
        out.extend_from_slice(&rendered);
        out.push(b'\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::alarms::AlarmSink;
    use logship_domain::entities::{
        FileFlusherConfig, FileInputConfig, InputConfig, LogEvent, ParseRegexConfig,
        ProcessorConfig,
    };
    use logship_domain::SourceBuffer;

    fn test_config(name: &str) -> PipelineConfig {
        PipelineConfig {
            name: name.into(),
            global: Default::default(),
            inputs: vec![InputConfig::File(FileInputConfig {
                file_paths: vec!["/var/log/*.log".into()],
                max_dir_search_depth: 0,
                exclude_dirs: vec![],
                exclude_dir_patterns: vec![],
                exclude_file_patterns: vec![],
                allow_root_collection: false,
                allow_multi_config: false,
                encoding: Default::default(),
                multiline: Default::default(),
                close_unused_reader_interval_sec: 3600,
                enable_log_position_meta: false,
                adhoc: false,
                enable_container_discovery: false,
                external_k8s_label_tag: Default::default(),
                external_env_tag: Default::default(),
                tick_interval_ms: 1000,
            })],
            processors: vec![ProcessorConfig::ParseRegex(ParseRegexConfig {
                source_key: "content".into(),
                pattern: r"(?P<level>\w+) (?P<msg>.*)".into(),
                keys: vec![],
                discard_unmatch: true,
                keep_source: false,
            })],
            aggregators: vec![],
            flushers: vec![FlusherConfig::File(FileFlusherConfig {
                path: "/tmp/x.jsonl".into(),
                queue_capacity: 8,
            })],
            route: vec![],
        }
    }

    fn ctx() -> Arc<ProcessorContext> {
        Arc::new(ProcessorContext {
            pipeline: "p".into(),
            alarms: AlarmSink::new(),
            tag_scheme: Default::default(),
            enable_timestamp_nanosecond: false,
            hostname: "h".into(),
            host_ip: None,
            user_defined_id: None,
        })
    }

    #[test]
    fn test_build_and_process() {
        let metrics = WriteMetrics::new();
        let pipeline = RuntimePipeline::build(test_config("t"), ctx(), &metrics).unwrap();

        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        for line in ["INFO started", "garbage-without-space"] {
            let mut event = LogEvent::new(1);
            event.add_content(group.source_mut(), "content", line.as_bytes());
            group.push_event(PipelineEvent::Log(event));
        }
        pipeline.process_group(&mut group);

        assert_eq!(group.len(), 1, "unmatched record was discarded");
        let snapshot = metrics.do_snapshot();
        let counters = &snapshot[0].counters;
        let get = |name: &str| {
            counters
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| *v)
                .unwrap_or(0)
        };
        assert_eq!(get(MetricNames::IN_EVENTS_TOTAL), 2);
        assert_eq!(get(MetricNames::OUT_EVENTS_TOTAL), 1);
        assert_eq!(get(MetricNames::DISCARDED_EVENTS_TOTAL), 1);
    }

    #[test]
    fn test_serialize_group_shape() {
        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        group.set_tag("__path__", "/var/log/a.log");
        group.metadata_mut().topic = Some("app".into());
        let mut event = LogEvent::new(1700000000);
        event.add_content(group.source_mut(), "level", b"WARN");
        group.push_event(PipelineEvent::Log(event));

        let payload = serialize_group(&group);
        let line: serde_json::Value =
            serde_json::from_slice(payload.strip_suffix(b"\n").unwrap()).unwrap();
        assert_eq!(line["time"], 1700000000i64);
        assert_eq!(line["contents"]["level"], "WARN");
        assert_eq!(line["tags"]["__path__"], "/var/log/a.log");
        assert_eq!(line["topic"], "app");
    }

    #[tokio::test]
    async fn test_dispatch_enqueues_per_routed_sink() {
        let metrics = WriteMetrics::new();
        let pipeline = RuntimePipeline::build(test_config("t"), ctx(), &metrics).unwrap();

        let mut group = EventGroup::with_buffer(SourceBuffer::new());
        let mut event = LogEvent::new(1);
        event.add_content(group.source_mut(), "level", b"WARN");
        group.push_event(PipelineEvent::Log(event));

        pipeline.dispatch(&group, &[]).await;
        assert_eq!(pipeline.queues[0].len(), 1);
    }
}
