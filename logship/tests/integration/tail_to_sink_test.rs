// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The complete path: a tailed file through the pump, the processor
//! chain, the sender queue, and a sink driver into the file sink -
//! including rotation continuity and checkpoint acknowledgement.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use logship::application::{FilePump, PumpMsg, RuntimePipeline};
use logship::infrastructure::alarms::AlarmSink;
use logship::infrastructure::checkpoint::CheckpointStore;
use logship::infrastructure::discovery::{ContainerRegistry, DiscoveryEvent};
use logship::infrastructure::metrics::{MetricsService, WriteMetrics};
use logship::infrastructure::processors::ProcessorContext;
use logship::infrastructure::reader::file_dev_inode;
use logship::infrastructure::sender::{ConcurrencyLimiter, SinkDriver, SinkDriverConfig};
use logship_bootstrap::shutdown::CancellationToken;
use logship_domain::entities::{
    FileFlusherConfig, FileInputConfig, FlusherConfig, InputConfig, ParseRegexConfig,
    PipelineConfig, ProcessorConfig,
};

fn file_input(dir: &Path) -> FileInputConfig {
    FileInputConfig {
        file_paths: vec![format!("{}/*.log", dir.display())],
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
        external_k8s_label_tag: BTreeMap::new(),
        external_env_tag: BTreeMap::new(),
        tick_interval_ms: 50,
    }
}

fn pipeline_config(name: &str, input_dir: &Path, sink_path: &Path) -> PipelineConfig {
    PipelineConfig {
        name: name.into(),
        global: Default::default(),
        inputs: vec![InputConfig::File(file_input(input_dir))],
        processors: vec![ProcessorConfig::ParseRegex(ParseRegexConfig {
            source_key: "content".into(),
            pattern: r"(?P<level>\w+) (?P<msg>.*)".into(),
            keys: vec![],
            discard_unmatch: false,
            keep_source: false,
        })],
        aggregators: vec![],
        flushers: vec![FlusherConfig::File(FileFlusherConfig {
            path: sink_path.display().to_string(),
            queue_capacity: 64,
        })],
        route: vec![],
    }
}

struct Harness {
    pipeline: Arc<RuntimePipeline>,
    store: Arc<CheckpointStore>,
    tx: tokio::sync::mpsc::Sender<PumpMsg>,
    token: CancellationToken,
    pump_task: tokio::task::JoinHandle<()>,
    driver_task: tokio::task::JoinHandle<()>,
}

async fn start(name: &str, input_dir: &Path, data_dir: &Path, sink_path: &Path) -> Harness {
    let alarms = AlarmSink::new();
    let store = Arc::new(CheckpointStore::new(
        data_dir.join("checkpoints"),
        Arc::clone(&alarms),
    ));
    let metrics = Arc::new(MetricsService::new().unwrap());
    let write_metrics = WriteMetrics::new();

    let config = pipeline_config(name, input_dir, sink_path);
    let ctx = Arc::new(ProcessorContext {
        pipeline: name.into(),
        alarms: Arc::clone(&alarms),
        tag_scheme: Default::default(),
        enable_timestamp_nanosecond: false,
        hostname: "test-host".into(),
        host_ip: None,
        user_defined_id: None,
    });
    let pipeline = RuntimePipeline::build(config.clone(), ctx, &write_metrics).unwrap();

    let token = CancellationToken::new();
    let driver = SinkDriver::new(
        format!("{name}#0"),
        SinkDriverConfig::default(),
        Arc::clone(&pipeline.queues[0]),
        Arc::new(ConcurrencyLimiter::default()),
        Arc::clone(&store),
        Arc::clone(&metrics),
        Arc::clone(&alarms),
    );
    let driver_task = tokio::spawn(driver.run(token.clone()));

    let input = match &config.inputs[0] {
        InputConfig::File(file) => file.clone(),
        _ => unreachable!(),
    };
    let pump = FilePump::new(
        Arc::clone(&pipeline),
        input,
        Arc::clone(&store),
        alarms,
        metrics,
        Arc::new(RwLock::new(ContainerRegistry::new())),
    );
    let (tx, rx) = FilePump::channel(64);
    let pump_task = tokio::spawn(pump.run(rx, token.clone()));

    Harness {
        pipeline,
        store,
        tx,
        token,
        pump_task,
        driver_task,
    }
}

impl Harness {
    async fn appeared(&self, path: &Path) {
        self.tx
            .send(PumpMsg::Discovery(DiscoveryEvent::FileAppeared {
                pipeline: self.pipeline.name().to_string(),
                path: path.to_path_buf(),
            }))
            .await
            .unwrap();
    }

    async fn tick(&self) {
        self.tx.send(PumpMsg::Tick).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    async fn finish(self) {
        // Let the queue drain before cancelling
        for _ in 0..50 {
            if self.pipeline.queues[0].is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.token.cancel();
        let _ = self.pump_task.await;
        let _ = tokio::time::timeout(Duration::from_secs(2), self.driver_task).await;
    }
}

fn sink_lines(path: &Path) -> Vec<serde_json::Value> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tail_process_send_ack() {
    let input_dir = tempfile::TempDir::new().unwrap();
    let data_dir = tempfile::TempDir::new().unwrap();
    let sink = data_dir.path().join("sink.jsonl");

    let log = input_dir.path().join("app.log");
    std::fs::write(&log, b"INFO started\nWARN low disk\n").unwrap();

    let harness = start("e2e", input_dir.path(), data_dir.path(), &sink).await;
    harness.appeared(&log).await;
    harness.tick().await;

    let identity = file_dev_inode(&log).unwrap();
    let store = Arc::clone(&harness.store);
    harness.finish().await;

    let lines = sink_lines(&sink);
    assert_eq!(lines.len(), 2, "one JSON line per record");
    assert_eq!(lines[0]["contents"]["level"], "INFO");
    assert_eq!(lines[0]["contents"]["msg"], "started");
    assert_eq!(lines[1]["contents"]["level"], "WARN");
    assert_eq!(
        lines[0]["tags"]["__path__"],
        log.display().to_string(),
        "file path tag attached under the legacy scheme"
    );

    // The sink acknowledgement reached the checkpoint store
    let cp = store.get_file_checkpoint("e2e", &identity).unwrap();
    assert_eq!(cp.acked_offset, 28, "all submitted bytes were acked");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rotation_no_loss_no_duplication() {
    let input_dir = tempfile::TempDir::new().unwrap();
    let data_dir = tempfile::TempDir::new().unwrap();
    let sink = data_dir.path().join("sink.jsonl");

    let log = input_dir.path().join("app.log");
    std::fs::write(&log, b"INFO one\nINFO two\n").unwrap();

    let harness = start("rot", input_dir.path(), data_dir.path(), &sink).await;
    harness.appeared(&log).await;
    harness.tick().await;

    // Rotate: rename, append a late line to the rotated file, create anew
    let rotated = input_dir.path().join("app.log.1");
    std::fs::rename(&log, &rotated).unwrap();
    {
        use std::io::Write;
        let mut old = std::fs::OpenOptions::new().append(true).open(&rotated).unwrap();
        old.write_all(b"INFO three\n").unwrap();
    }
    std::fs::write(&log, b"INFO new-gen\n").unwrap();
    harness.appeared(&log).await;
    harness.tick().await;
    harness.tick().await;

    harness.finish().await;

    let mut messages: Vec<String> = sink_lines(&sink)
        .iter()
        .map(|line| line["contents"]["msg"].as_str().unwrap().to_string())
        .collect();
    let unsorted = messages.clone();
    messages.sort();
    messages.dedup();
    assert_eq!(
        messages,
        vec!["new-gen", "one", "three", "two"],
        "every record delivered exactly once: {unsorted:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_resumes_from_acked_offset() {
    let input_dir = tempfile::TempDir::new().unwrap();
    let data_dir = tempfile::TempDir::new().unwrap();
    let sink = data_dir.path().join("sink.jsonl");

    let log = input_dir.path().join("app.log");
    std::fs::write(&log, b"INFO first\n").unwrap();

    // First run: deliver, ack, dump
    {
        let harness = start("resume", input_dir.path(), data_dir.path(), &sink).await;
        harness.appeared(&log).await;
        harness.tick().await;
        let store = Arc::clone(&harness.store);
        harness.finish().await;
        store.dump().unwrap();
    }

    // Append while the agent is "down"
    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
        file.write_all(b"INFO second\n").unwrap();
    }

    // Second run over the same data dir resumes past the acked bytes
    {
        let harness = start("resume", input_dir.path(), data_dir.path(), &sink).await;
        harness.store.load().unwrap();
        harness.appeared(&log).await;
        harness.tick().await;
        harness.finish().await;
    }

    let messages: Vec<String> = sink_lines(&sink)
        .iter()
        .map(|line| line["contents"]["msg"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(messages, vec!["first", "second"], "no replay, no gap");
}
