// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sender Queue
//!
//! Per-sink bounded FIFO of finished payloads. Pushes beyond the capacity
//! suspend the producer, which pauses the owning reader upstream. Items
//! with equal queue keys preserve push order; each key is additionally
//! serialised: at most one item per key is out with a driver at a time -
//! so concurrent sends across keys can never reorder one key's payloads.
//! Removing a pipeline drains exactly the items carrying its keys.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

use logship_domain::{DevInode, QueueKey, SenderItem};
use logship_domain::services::Flusher;

/// What a successful send acknowledges into the checkpoint store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckHandle {
    pub job: String,
    pub dev_inode: DevInode,
    /// Ack through this submitted offset.
    pub offset: u64,
}

/// One queued payload plus its delivery context. The `flusher` reference
/// keeps the owning pipeline's sink configuration alive across hot
/// reloads until the in-flight send resolves.
pub struct QueuedItem {
    pub item: SenderItem,
    pub flusher: Arc<dyn Flusher>,
    pub acks: Vec<AckHandle>,
}

#[derive(Default)]
struct QueueInner {
    /// Round-robin order of keys having queued items.
    order: VecDeque<QueueKey>,
    by_key: HashMap<QueueKey, VecDeque<QueuedItem>>,
    /// Keys currently out with the driver.
    busy: std::collections::HashSet<QueueKey>,
    len: usize,
}

/// Bounded keyed-FIFO queue for one sink.
pub struct SenderQueue {
    inner: Mutex<QueueInner>,
    space: Semaphore,
    ready: Notify,
    capacity: usize,
}

impl SenderQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(QueueInner::default()),
            space: Semaphore::new(capacity),
            ready: Notify::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes one item, suspending while the queue is full. This is the
    /// back-pressure point that ultimately parks readers.
    pub async fn push(&self, item: QueuedItem) {
        let permit = self
            .space
            .acquire()
            .await
            .expect("sender queue semaphore never closes");
        permit.forget();
        self.enqueue(item, false);
    }

    /// Non-blocking push; `false` when the queue is full. The plugin
    /// bridge uses this behind its `is_valid_to_send` check.
    pub fn try_push(&self, item: QueuedItem) -> bool {
        match self.space.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.enqueue(item, false);
                true
            }
            Err(_) => false,
        }
    }

    /// Whether a push would currently succeed.
    pub fn has_space(&self) -> bool {
        self.space.available_permits() > 0
    }

    /// Re-inserts a failed item at the head of its key, without consuming
    /// capacity (the item's permit is still outstanding).
    pub fn requeue_front(&self, item: QueuedItem) {
        self.enqueue(item, true);
    }

    fn enqueue(&self, item: QueuedItem, front: bool) {
        let key = item.item.queue_key.clone();
        {
            let mut inner = self.inner.lock();
            let slot = inner.by_key.entry(key.clone()).or_default();
            if slot.is_empty() {
                inner.order.push_back(key.clone());
            }
            let slot = inner.by_key.get_mut(&key).expect("just inserted");
            if front {
                slot.push_front(item);
            } else {
                slot.push_back(item);
            }
            inner.len += 1;
        }
        self.ready.notify_one();
    }

    /// Pops the next item whose key is not busy, marking the key busy.
    /// Returns `None` when nothing is currently eligible.
    pub fn try_pop(&self) -> Option<QueuedItem> {
        let mut inner = self.inner.lock();
        let mut rotations = inner.order.len();
        while rotations > 0 {
            rotations -= 1;
            let Some(key) = inner.order.pop_front() else { break };
            if inner.busy.contains(&key) {
                inner.order.push_back(key);
                continue;
            }
            let Some(slot) = inner.by_key.get_mut(&key) else { continue };
            let Some(item) = slot.pop_front() else { continue };
            if !slot.is_empty() {
                inner.order.push_back(key.clone());
            }
            inner.busy.insert(key);
            inner.len -= 1;
            return Some(item);
        }
        None
    }

    /// Waits until an item may be eligible.
    pub async fn wait_ready(&self) {
        self.ready.notified().await;
    }

    /// Completes one pop: unmarks the key and, when the item is done for
    /// good, releases its capacity permit.
    pub fn on_done(&self, key: &QueueKey, consumed: bool) {
        {
            let mut inner = self.inner.lock();
            inner.busy.remove(key);
            if let Some(slot) = inner.by_key.get(key) {
                if slot.is_empty() {
                    inner.by_key.remove(key);
                }
            }
        }
        if consumed {
            self.space.add_permits(1);
        }
        // The key may have eligible items again
        self.ready.notify_one();
    }

    /// Drains every item owned by `pipeline`; used at pipeline removal.
    /// Returns the number of items dropped.
    pub fn drain_pipeline(&self, pipeline: &str) -> usize {
        let mut dropped = 0usize;
        {
            let mut inner = self.inner.lock();
            let keys: Vec<QueueKey> = inner
                .by_key
                .keys()
                .filter(|k| k.owned_by(pipeline))
                .cloned()
                .collect();
            for key in keys {
                if let Some(slot) = inner.by_key.remove(&key) {
                    dropped += slot.len();
                    inner.len -= slot.len();
                }
                inner.order.retain(|k| k != &key);
            }
        }
        self.space.add_permits(dropped);
        dropped
    }
}
