// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sender Item
//!
//! A finished, serialised payload on its way to one sink. Items are owned by
//! exactly one queue at any moment; the bookkeeping fields (enqueue times,
//! last-send time, try count, sending status) drive retry decisions and the
//! queue-age metrics.

use crate::value_objects::QueueKey;

/// Whether a driver currently has the item in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendingStatus {
    #[default]
    Idle,
    Sending,
}

/// One serialised payload plus its delivery bookkeeping.
#[derive(Debug, Clone)]
pub struct SenderItem {
    /// The wire payload handed to the sink.
    pub data: Vec<u8>,
    /// Pre-serialisation byte size, for byte-budget accounting.
    pub raw_size: usize,
    /// Ordering/draining key of the owning pipeline and flusher.
    pub queue_key: QueueKey,
    pub status: SendingStatus,
    pub first_enqueue_time: i64,
    pub last_enqueue_time: i64,
    pub last_send_time: i64,
    /// Attempts made so far; starts at 1 on the first send.
    pub try_count: u32,
}

impl SenderItem {
    pub fn new(data: Vec<u8>, raw_size: usize, queue_key: QueueKey, now: i64) -> Self {
        Self {
            data,
            raw_size,
            queue_key,
            status: SendingStatus::Idle,
            first_enqueue_time: now,
            last_enqueue_time: now,
            last_send_time: 0,
            try_count: 0,
        }
    }

    /// Marks the beginning of one send attempt.
    pub fn begin_send(&mut self, now: i64) {
        self.status = SendingStatus::Sending;
        self.last_send_time = now;
        self.try_count += 1;
    }

    /// Returns the item to the queue after a failed attempt.
    pub fn requeue(&mut self, now: i64) {
        self.status = SendingStatus::Idle;
        self.last_enqueue_time = now;
    }

    pub fn wire_size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_attempt_bookkeeping() {
        let mut item = SenderItem::new(b"payload".to_vec(), 64, QueueKey::new("p", 0), 100);
        assert_eq!(item.try_count, 0);
        assert_eq!(item.status, SendingStatus::Idle);

        item.begin_send(110);
        assert_eq!(item.try_count, 1);
        assert_eq!(item.status, SendingStatus::Sending);
        assert_eq!(item.last_send_time, 110);

        item.requeue(111);
        assert_eq!(item.status, SendingStatus::Idle);
        assert_eq!(item.first_enqueue_time, 100);
        assert_eq!(item.last_enqueue_time, 111);
    }
}
