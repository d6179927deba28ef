// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sink Driver
//!
//! The generic retry loop around one sink's `send` operation:
//!
//! 1. wait until the limiter admits another pop, then pop an eligible item
//! 2. send with the flusher's deadline
//! 3. success → acknowledge the item's source offsets into the checkpoint
//!    store, `on_success` the limiter, release the slot
//! 4. retryable failure → bump the try count, `on_fail`, re-queue at the
//!    head; beyond the retry budget the item parks in the dead-letter
//!    bucket (capped, oldest-evicting)
//! 5. permanent failure → drop, count, `on_fail`
//!
//! Sends run concurrently up to the limiter's current allowance; one key
//! is never concurrent with itself (the queue serialises keys).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use logship_bootstrap::shutdown::CancellationToken;
use logship_domain::services::SendResult;
use logship_domain::SenderItem;

use crate::infrastructure::alarms::{AlarmKind, AlarmSink};
use crate::infrastructure::checkpoint::CheckpointStore;
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::sender::{ConcurrencyLimiter, QueuedItem, SenderQueue};

/// Capped, oldest-evicting parking lot for items beyond their retry
/// budget.
pub struct DeadLetterBucket {
    items: Mutex<VecDeque<SenderItem>>,
    capacity: usize,
}

impl DeadLetterBucket {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Parks an item, evicting the oldest when full. Returns whether an
    /// eviction happened.
    pub fn park(&self, item: SenderItem) -> bool {
        let mut items = self.items.lock();
        let evicted = items.len() >= self.capacity;
        if evicted {
            items.pop_front();
        }
        items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Driver tunables.
#[derive(Debug, Clone)]
pub struct SinkDriverConfig {
    /// Attempts before an item dead-letters (first try included).
    pub max_try_count: u32,
    pub dead_letter_capacity: usize,
    /// Poll spacing while the limiter gate is closed.
    pub gate_poll: Duration,
}

impl Default for SinkDriverConfig {
    fn default() -> Self {
        Self {
            max_try_count: 3,
            dead_letter_capacity: 256,
            gate_poll: Duration::from_millis(100),
        }
    }
}

/// The per-sink send loop.
pub struct SinkDriver {
    name: String,
    config: SinkDriverConfig,
    queue: Arc<SenderQueue>,
    limiter: Arc<ConcurrencyLimiter>,
    store: Arc<CheckpointStore>,
    metrics: Arc<MetricsService>,
    alarms: Arc<AlarmSink>,
    dead_letter: Arc<DeadLetterBucket>,
}

impl SinkDriver {
    pub fn new(
        name: impl Into<String>,
        config: SinkDriverConfig,
        queue: Arc<SenderQueue>,
        limiter: Arc<ConcurrencyLimiter>,
        store: Arc<CheckpointStore>,
        metrics: Arc<MetricsService>,
        alarms: Arc<AlarmSink>,
    ) -> Arc<Self> {
        let dead_letter = Arc::new(DeadLetterBucket::new(config.dead_letter_capacity));
        Arc::new(Self {
            name: name.into(),
            config,
            queue,
            limiter,
            store,
            metrics,
            alarms,
            dead_letter,
        })
    }

    pub fn dead_letter(&self) -> &Arc<DeadLetterBucket> {
        &self.dead_letter
    }

    /// Runs until cancelled; in-flight sends resolve before return.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        loop {
            if token.is_cancelled() && self.queue.is_empty() {
                return;
            }
            if !self.limiter.is_valid_to_pop() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.gate_poll) => continue,
                    _ = token.cancelled() => continue,
                }
            }
            let Some(queued) = self.queue.try_pop() else {
                tokio::select! {
                    _ = self.queue.wait_ready() => continue,
                    _ = tokio::time::sleep(self.config.gate_poll) => continue,
                    _ = token.cancelled() => continue,
                }
            };

            self.limiter.post_pop();
            let driver = Arc::clone(&self);
            tokio::spawn(async move {
                driver.send_one(queued).await;
            });
        }
    }

    /// One complete send attempt with all its bookkeeping.
    pub async fn send_one(&self, mut queued: QueuedItem) {
        let key = queued.item.queue_key.clone();
        queued.item.begin_send(chrono::Utc::now().timestamp());

        let result = queued.flusher.send(&queued.item).await;
        self.limiter.on_send_done();

        match result {
            SendResult::Ok => {
                let now = chrono::Utc::now().timestamp();
                for ack in &queued.acks {
                    self.store.ack(&ack.job, &ack.dev_inode, ack.offset, now);
                }
                self.limiter.on_success();
                self.metrics.bytes_out_total.inc_by(queued.item.wire_size() as u64);
                self.queue.on_done(&key, true);
                debug!(sink = %self.name, bytes = queued.item.wire_size(), "payload delivered");
            }
            SendResult::Retry(reason) => {
                self.limiter.on_fail(Instant::now());
                self.metrics.send_failures_total.inc();
                if queued.item.try_count >= self.config.max_try_count {
                    self.alarms.raise(
                        AlarmKind::DeadLetter,
                        key.pipeline(),
                        &format!(
                            "payload exhausted {} attempts against sink '{}': {reason}",
                            queued.item.try_count, self.name
                        ),
                        b"",
                    );
                    self.metrics.dead_letter_total.inc();
                    if self.dead_letter.park(queued.item) {
                        warn!(sink = %self.name, "dead-letter bucket full, oldest payload evicted");
                    }
                    self.queue.on_done(&key, true);
                } else {
                    self.alarms.raise(
                        AlarmKind::SendFail,
                        key.pipeline(),
                        &format!("retryable send failure against sink '{}': {reason}", self.name),
                        b"",
                    );
                    queued.item.requeue(chrono::Utc::now().timestamp());
                    self.queue.requeue_front(queued);
                    self.queue.on_done(&key, false);
                }
            }
            SendResult::Permanent(reason) => {
                self.limiter.on_fail(Instant::now());
                self.metrics.send_failures_total.inc();
                self.alarms.raise(
                    AlarmKind::SendFail,
                    key.pipeline(),
                    &format!("permanent send failure against sink '{}', dropping: {reason}", self.name),
                    b"",
                );
                self.queue.on_done(&key, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sender::{AckHandle, LimiterConfig};
    use async_trait::async_trait;
    use logship_domain::services::Flusher;
    use logship_domain::{DevInode, FileCheckpoint, FileFingerprint, QueueKey};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct ScriptedFlusher {
        calls: AtomicU32,
        fail_first: u32,
        permanent: bool,
    }

    #[async_trait]
    impl Flusher for ScriptedFlusher {
        fn name(&self) -> &'static str {
            "scripted"
        }
        async fn send(&self, _item: &SenderItem) -> SendResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.permanent {
                SendResult::Permanent("400".into())
            } else if call < self.fail_first {
                SendResult::Retry("503".into())
            } else {
                SendResult::Ok
            }
        }
    }

    fn driver(dir: &TempDir, max_try: u32) -> (Arc<SinkDriver>, Arc<SenderQueue>, Arc<CheckpointStore>) {
        let alarms = AlarmSink::new();
        let store = Arc::new(CheckpointStore::new(dir.path().join("ckpt"), Arc::clone(&alarms)));
        let queue = SenderQueue::new(16);
        let limiter = Arc::new(ConcurrencyLimiter::new(LimiterConfig::default()));
        let metrics = Arc::new(MetricsService::new().unwrap());
        let driver = SinkDriver::new(
            "test-sink",
            SinkDriverConfig {
                max_try_count: max_try,
                dead_letter_capacity: 4,
                gate_poll: Duration::from_millis(10),
            },
            Arc::clone(&queue),
            limiter,
            Arc::clone(&store),
            metrics,
            alarms,
        );
        (driver, queue, store)
    }

    fn seed_checkpoint(store: &CheckpointStore, inode: u64) -> DevInode {
        let dev_inode = DevInode::new(7, inode);
        let mut cp = FileCheckpoint::new("p", "/logs/a.log", 0);
        cp.fingerprint = FileFingerprint::new(dev_inode, 4, 1);
        cp.begin_loading(0);
        cp.advance_submitted(100, 100, 0);
        store.job("p").write().add_file(cp);
        dev_inode
    }

    fn queued(flusher: Arc<dyn Flusher>, acks: Vec<AckHandle>) -> QueuedItem {
        QueuedItem {
            item: SenderItem::new(b"payload".to_vec(), 7, QueueKey::new("p", 0), 0),
            flusher,
            acks,
        }
    }

    #[tokio::test]
    async fn test_success_acks_checkpoint() {
        let dir = TempDir::new().unwrap();
        let (driver, queue, store) = driver(&dir, 3);
        let dev_inode = seed_checkpoint(&store, 1);
        let flusher = Arc::new(ScriptedFlusher {
            calls: AtomicU32::new(0),
            fail_first: 0,
            permanent: false,
        });

        let item = queued(flusher, vec![AckHandle { job: "p".into(), dev_inode, offset: 80 }]);
        queue.push(item).await;
        let popped = queue.try_pop().unwrap();
        driver.limiter.post_pop();
        driver.send_one(popped).await;

        let cp = store.get_file_checkpoint("p", &dev_inode).unwrap();
        assert_eq!(cp.acked_offset, 80);
    }

    #[tokio::test]
    async fn test_retry_then_dead_letter() {
        let dir = TempDir::new().unwrap();
        let (driver, queue, _store) = driver(&dir, 2);
        let flusher = Arc::new(ScriptedFlusher {
            calls: AtomicU32::new(0),
            fail_first: 10,
            permanent: false,
        });

        queue.push(queued(flusher, vec![])).await;
        // Attempt 1: retry, re-queued at head
        let first = queue.try_pop().unwrap();
        driver.limiter.post_pop();
        driver.send_one(first).await;
        assert_eq!(queue.len(), 1);
        assert!(driver.dead_letter().is_empty());

        // Attempt 2: budget exhausted, parked
        let second = queue.try_pop().unwrap();
        driver.limiter.post_pop();
        driver.send_one(second).await;
        assert_eq!(queue.len(), 0);
        assert_eq!(driver.dead_letter().len(), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_drops_without_dead_letter() {
        let dir = TempDir::new().unwrap();
        let (driver, queue, _store) = driver(&dir, 3);
        let flusher = Arc::new(ScriptedFlusher {
            calls: AtomicU32::new(0),
            fail_first: 0,
            permanent: true,
        });

        queue.push(queued(flusher, vec![])).await;
        let popped = queue.try_pop().unwrap();
        driver.limiter.post_pop();
        driver.send_one(popped).await;

        assert_eq!(queue.len(), 0);
        assert!(driver.dead_letter().is_empty());
    }

    #[test]
    fn test_dead_letter_evicts_oldest() {
        let bucket = DeadLetterBucket::new(2);
        for i in 0..3u8 {
            bucket.park(SenderItem::new(vec![i], 1, QueueKey::new("p", 0), 0));
        }
        assert_eq!(bucket.len(), 2);
        let items = bucket.items.lock();
        assert_eq!(items[0].data, vec![1], "oldest was evicted");
    }
}
