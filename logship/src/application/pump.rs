// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Pump
//!
//! One pump task per pipeline owns all of that pipeline's readers. It
//! receives discovery events (files appearing, changing, vanishing) and
//! scheduler ticks, drives each reader's incremental read, wraps the
//! resulting records into event groups with the file tags and topic, runs
//! the processor chain, and dispatches to the sender queues: suspending
//! there when a queue is full, which is exactly how back-pressure parks
//! the readers.
//!
//! Readers are keyed by file identity, so a rename of a tailed file moves
//! its path, never its reader. Ad-hoc (bounded) inputs read their fixed
//! file list front to back through the job-checkpoint cursor and finish.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use logship_bootstrap::shutdown::CancellationToken;
use logship_domain::entities::{FileInputConfig, LogEvent, PipelineEvent};
use logship_domain::services::topic::derive_topic;
use logship_domain::value_objects::TagKey;
use logship_domain::{AgentError, DevInode, EventGroup, FileCheckpoint, SourceBuffer};

use crate::infrastructure::alarms::AlarmSink;
use crate::infrastructure::checkpoint::CheckpointStore;
use crate::infrastructure::discovery::{ContainerRegistry, DiscoveryEvent};
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::processors::DEFAULT_CONTENT_KEY;
use crate::infrastructure::reader::{file_dev_inode, RawRecord, TailReader, TailReaderConfig};
use crate::infrastructure::scheduler::ScheduledJob;
use crate::infrastructure::sender::AckHandle;

use crate::application::RuntimePipeline;

/// Messages the pump consumes.
#[derive(Debug)]
pub enum PumpMsg {
    Discovery(DiscoveryEvent),
    Tick,
}

/// The scheduler-facing tick job: nudges the pump without blocking; a
/// full pump inbox means the previous tick is still working, and the
/// scheduler's skip accounting covers the gap.
pub struct PumpTickJob {
    tx: mpsc::Sender<PumpMsg>,
}

#[async_trait]
impl ScheduledJob for PumpTickJob {
    async fn run(&self, _cancel: &CancellationToken) -> Result<(), AgentError> {
        match self.tx.try_send(PumpMsg::Tick) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(AgentError::QueueClosed("pump inbox closed".into()))
            }
        }
    }
}

/// Per-pipeline reader owner.
pub struct FilePump {
    pipeline: Arc<RuntimePipeline>,
    input: FileInputConfig,
    store: Arc<CheckpointStore>,
    alarms: Arc<AlarmSink>,
    metrics: Arc<MetricsService>,
    containers: Arc<RwLock<ContainerRegistry>>,
    readers: HashMap<DevInode, TailReader>,
    by_path: HashMap<PathBuf, DevInode>,
    /// Prefix of this pump's pack ids; unique per pump incarnation.
    pack_prefix: String,
    pack_seq: u64,
}

impl FilePump {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline: Arc<RuntimePipeline>,
        input: FileInputConfig,
        store: Arc<CheckpointStore>,
        alarms: Arc<AlarmSink>,
        metrics: Arc<MetricsService>,
        containers: Arc<RwLock<ContainerRegistry>>,
    ) -> Self {
        Self {
            pipeline,
            input,
            store,
            alarms,
            metrics,
            containers,
            readers: HashMap::new(),
            by_path: HashMap::new(),
            pack_prefix: uuid::Uuid::new_v4().simple().to_string()[..16].to_string(),
            pack_seq: 0,
        }
    }

    /// Builds the pump's inbox and its scheduler tick job.
    pub fn channel(capacity: usize) -> (mpsc::Sender<PumpMsg>, mpsc::Receiver<PumpMsg>) {
        mpsc::channel(capacity)
    }

    pub fn tick_job(tx: mpsc::Sender<PumpMsg>) -> Arc<dyn ScheduledJob> {
        Arc::new(PumpTickJob { tx })
    }

    fn reader_config(&self) -> TailReaderConfig {
        TailReaderConfig {
            pipeline: self.pipeline.name().to_string(),
            encoding: self.input.encoding,
            multiline: self.input.multiline.clone(),
            close_unused_secs: self.input.close_unused_reader_interval_sec,
            max_read_bytes: 512 * 1024,
            force_flush_ticks: 3,
        }
    }

    /// Runs until cancelled; the final pass force-flushes and drains.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<PumpMsg>, token: CancellationToken) {
        if self.input.adhoc {
            self.run_adhoc(&mut inbox, &token).await;
            return;
        }
        loop {
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(PumpMsg::Discovery(event)) => self.handle_discovery(event).await,
                    Some(PumpMsg::Tick) => self.tick_all(false).await,
                    None => break,
                },
                _ = token.cancelled() => break,
            }
        }
        debug!(pipeline = %self.pipeline.name(), "pump stopping, final flush");
        self.tick_all(true).await;
        self.metrics.open_readers.sub(self.readers.len() as i64);
    }

    async fn handle_discovery(&mut self, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::FileAppeared { path, .. } => {
                self.open_or_follow(path);
            }
            DiscoveryEvent::FileModified { path, .. } => {
                if let Some(id) = self.by_path.get(&path).copied() {
                    self.tick_one(id, false).await;
                }
            }
            DiscoveryEvent::FileRemoved { path, .. } => {
                // The reader drains to EOF on its next tick and retires.
                if let Some(id) = self.by_path.remove(&path) {
                    self.tick_one(id, false).await;
                }
            }
            DiscoveryEvent::WatchDir(_) => {}
        }
    }

    /// Opens a reader for `path`, or follows a rename when the identity
    /// already has one.
    fn open_or_follow(&mut self, path: PathBuf) {
        match file_dev_inode(&path) {
            Ok(identity) => {
                if let Some(reader) = self.readers.get_mut(&identity) {
                    let old = reader.path().clone();
                    if old != path {
                        self.by_path.remove(&old);
                        reader.set_path(path.clone());
                        self.by_path.insert(path, identity);
                    }
                    return;
                }
                match TailReader::open(
                    path.clone(),
                    self.reader_config(),
                    Arc::clone(&self.store),
                    Arc::clone(&self.alarms),
                ) {
                    Ok(reader) => {
                        info!(pipeline = %self.pipeline.name(), path = %path.display(), "tailing file");
                        self.metrics.open_readers.inc();
                        self.by_path.insert(path, identity);
                        self.readers.insert(identity, reader);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to open reader");
                    }
                }
            }
            Err(e) => debug!(path = %path.display(), error = %e, "appeared file is gone again: {e}"),
        }
    }

    async fn tick_all(&mut self, force: bool) {
        let identities: Vec<DevInode> = self.readers.keys().copied().collect();
        for identity in identities {
            self.tick_one(identity, force).await;
        }
    }

    /// Ticks one reader; returns `(reached_eof, record_count)` when the
    /// reader exists and ticked.
    async fn tick_one(&mut self, identity: DevInode, force: bool) -> Option<(bool, usize)> {
        let Some(reader) = self.readers.get_mut(&identity) else {
            return None;
        };
        let path = reader.path().clone();

        let result = match reader.tick(force) {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "reader tick failed");
                return None;
            }
        };
        reader.maybe_close_idle();

        let retire = (result.vanished || result.rotated_away) && result.reached_eof && result.records.is_empty();

        if !result.records.is_empty() {
            self.metrics.events_in_total.inc_by(result.records.len() as u64);
            let bytes: usize = result.records.iter().map(|r| r.bytes.len()).sum();
            self.metrics.bytes_in_total.inc_by(bytes as u64);

            // The aggregator bounds each dispatched group; the sink
            // acknowledgement rides on the final chunk only, so the acked
            // offset never passes bytes still waiting in a queue.
            let aggregator = self.pipeline.aggregator().clone();
            let chunks = chunk_records(&result.records, aggregator.max_events, aggregator.max_bytes);
            let last = chunks.len().saturating_sub(1);
            for (index, chunk) in chunks.into_iter().enumerate() {
                let mut group = self.build_group(&path, identity, chunk);
                let acks = if index == last {
                    vec![AckHandle {
                        job: self.pipeline.name().to_string(),
                        dev_inode: identity,
                        offset: result.end_offset,
                    }]
                } else {
                    Vec::new()
                };
                self.pipeline.process_group(&mut group);
                // Suspension point: a full sender queue parks this pump
                // here; no further bytes are read until capacity returns.
                self.pipeline.dispatch(&group, &acks).await;
            }
        }

        let record_count = result.records.len();
        if retire {
            debug!(path = %path.display(), id = %identity, "retiring drained reader");
            self.readers.remove(&identity);
            self.by_path.retain(|_, id| *id != identity);
            self.metrics.open_readers.dec();
        }
        Some((result.reached_eof, record_count))
    }

    /// Wraps raw records into a tagged event group.
    fn build_group(&mut self, path: &std::path::Path, identity: DevInode, records: &[RawRecord]) -> EventGroup {
        let total: usize = records.iter().map(|r| r.bytes.len()).sum();
        let mut buffer = SourceBuffer::with_capacity(total);
        let content_key = buffer.copy_str(DEFAULT_CONTENT_KEY);
        let offset_key = buffer.copy_str(TagKey::FileOffset.render(self.pipeline.ctx.tag_scheme));
        let mut group = EventGroup::with_buffer(buffer);

        let now = chrono::Utc::now().timestamp();
        let mut events = Vec::with_capacity(records.len());
        for record in records {
            let mut event = LogEvent::new(now);
            event.set_file_offset(record.offset);
            let value = group.source_mut().copy_bytes(&record.bytes);
            event.push_content(content_key, value);
            if self.input.enable_log_position_meta {
                let offset = group.source_mut().copy_str(&record.offset.to_string());
                event.push_content(offset_key, offset);
            }
            events.push(PipelineEvent::Log(event));
        }
        group.set_events(events);

        let scheme = self.pipeline.ctx.tag_scheme;
        let path_str = path.display().to_string();
        group.set_tag(TagKey::FilePath.render(scheme), path_str.clone());
        group.set_tag(TagKey::FileInode.render(scheme), identity.inode.to_string());
        self.pack_seq += 1;
        group.metadata_mut().pack_id = Some(format!("{}-{:x}", self.pack_prefix, self.pack_seq));
        group.metadata_mut().source_path = Some(path_str.clone());
        group.metadata_mut().topic = derive_topic(
            &path_str,
            &self.pipeline.config.global.topic_policy,
            self.pipeline.config.global.group_topic.as_deref(),
        );

        if self.input.enable_container_discovery {
            let containers = self.containers.read();
            if let Some(info) = containers
                .containers()
                .find(|c| path.starts_with(&c.path))
            {
                let lifted = containers.lifted_tags(
                    &info.id,
                    &self.input.external_k8s_label_tag,
                    &self.input.external_env_tag,
                );
                for (key, value) in lifted {
                    group.set_tag(key, value);
                }
            };
        }
        group
    }

    /// Ad-hoc mode: consume the fixed file list in order, front to back,
    /// then finish. Files are discovered once (initial scan events) and
    /// the job-checkpoint cursor tracks progress durably.
    async fn run_adhoc(&mut self, inbox: &mut mpsc::Receiver<PumpMsg>, token: &CancellationToken) {
        // Gather the bounded file list from the initial discovery burst.
        let mut files: Vec<PathBuf> = Vec::new();
        let settle = tokio::time::sleep(std::time::Duration::from_millis(500));
        tokio::pin!(settle);
        loop {
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(PumpMsg::Discovery(DiscoveryEvent::FileAppeared { path, .. })) => {
                        files.push(path);
                    }
                    Some(_) => {}
                    None => break,
                },
                _ = &mut settle => break,
                _ = token.cancelled() => return,
            }
        }
        files.sort();
        let job_name = self.pipeline.name().to_string();
        info!(pipeline = %job_name, files = files.len(), "starting ad-hoc job");

        let now = chrono::Utc::now().timestamp();
        let mut checkpoints = Vec::with_capacity(files.len());
        for path in &files {
            let mut cp = FileCheckpoint::new(&job_name, path.display().to_string(), now);
            if let Ok(identity) = file_dev_inode(path) {
                if let Ok(size) = std::fs::metadata(path).map(|m| m.len()) {
                    cp.size = size;
                }
                cp.fingerprint.dev_inode = identity;
            }
            checkpoints.push(cp);
        }
        let job = self.store.create_adhoc_job(&job_name, checkpoints);

        for path in files {
            if token.is_cancelled() {
                return;
            }
            self.open_or_follow(path.clone());
            let Some(identity) = self.by_path.get(&path).copied() else {
                // Unopenable file: skip it, marking the cursor entry lost.
                let key = job.read().current_file().map(|cp| cp.fingerprint);
                if let Some(key) = key {
                    job.write().update_current(&key, now, |cp| cp.mark_lost(now));
                }
                continue;
            };

            // Drain this file completely before moving on.
            loop {
                match self.tick_one(identity, true).await {
                    Some((reached_eof, records)) if reached_eof && records == 0 => break,
                    Some(_) => continue,
                    None => break,
                }
            }
            self.readers.remove(&identity);
            self.by_path.remove(&path);

            let cursor_key = job.read().current_file().map(|cp| cp.fingerprint);
            if let Some(key) = cursor_key {
                let size = self
                    .store
                    .get_file_checkpoint(&job_name, &key.dev_inode)
                    .map(|cp| cp.size)
                    .unwrap_or(0);
                job.write().update_current(&key, now, |cp| {
                    cp.begin_loading(now);
                    cp.advance_submitted(size, size, now);
                    cp.ack(size, now)
                });
            }
            let _ = self.store.dump_job(&job_name);
        }
        info!(pipeline = %job_name, "ad-hoc job complete");
    }
}

/// Splits a record batch into aggregator-bounded chunks, preserving
/// order. Every chunk holds at least one record, so an oversized single
/// record still flows.
fn chunk_records(records: &[RawRecord], max_events: usize, max_bytes: usize) -> Vec<&[RawRecord]> {
    let max_events = max_events.max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut bytes = 0usize;
    for (i, record) in records.iter().enumerate() {
        let over_events = i - start >= max_events;
        let over_bytes = i > start && bytes + record.bytes.len() > max_bytes;
        if over_events || over_bytes {
            chunks.push(&records[start..i]);
            start = i;
            bytes = 0;
        }
        bytes += record.bytes.len();
    }
    if start < records.len() {
        chunks.push(&records[start..]);
    }
    chunks
}
