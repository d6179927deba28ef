// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Durable checkpoint recovery: dump a populated store, restart it, and
//! expect identical field values back: including both timestamps: plus
//! the atomicity guarantee of the live path.

use logship::infrastructure::alarms::AlarmSink;
use logship::infrastructure::checkpoint::CheckpointStore;
use logship::{DevInode, FileCheckpoint, FileFingerprint};
use tempfile::TempDir;

fn store_at(dir: &TempDir) -> CheckpointStore {
    CheckpointStore::new(dir.path().join("checkpoints"), AlarmSink::new())
}

fn loading_checkpoint(job: &str, inode: u64) -> FileCheckpoint {
    let mut cp = FileCheckpoint::new(job, format!("/var/log/app-{inode}.log"), 1000 + inode as i64);
    cp.fingerprint = FileFingerprint::new(DevInode::new(42, inode), 1024, inode.wrapping_mul(0x9e37));
    cp.begin_loading(1000 + inode as i64);
    cp.advance_submitted(inode * 10, inode * 20, 2000 + inode as i64);
    cp.ack(inode * 5, 3000 + inode as i64);
    cp
}

#[test]
fn test_one_hundred_loading_checkpoints_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    for inode in 1..=100u64 {
        store.job("bulk").write().add_file(loading_checkpoint("bulk", inode));
    }
    store.dump().unwrap();

    let restarted = store_at(&dir);
    restarted.load().unwrap();

    for inode in 1..=100u64 {
        let expected = loading_checkpoint("bulk", inode);
        let restored = restarted
            .get_file_checkpoint("bulk", &DevInode::new(42, inode))
            .unwrap_or_else(|| panic!("checkpoint {inode} missing after restart"));
        assert_eq!(restored.fingerprint, expected.fingerprint);
        assert_eq!(restored.acked_offset, expected.acked_offset);
        assert_eq!(restored.submitted_offset, expected.submitted_offset);
        assert_eq!(restored.status, expected.status);
        assert_eq!(restored.start_time, expected.start_time);
        assert_eq!(restored.last_update_time, expected.last_update_time);
    }
}

#[test]
fn test_live_path_is_parseable_after_every_dump() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store.job("job").write().add_file(loading_checkpoint("job", 1));

    for round in 0..5u64 {
        store.ack("job", &DevInode::new(42, 1), round, 5000 + round as i64);
        store.dump().unwrap();
        let live = dir.path().join("checkpoints").join("job.json");
        let bytes = std::fs::read(&live).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["job_name"], "job");
    }
}

#[test]
fn test_acked_offset_monotone_across_restart() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store.job("mono").write().add_file(loading_checkpoint("mono", 7));
    store.ack("mono", &DevInode::new(42, 7), 35, 4000);
    store.dump().unwrap();
    let before = store
        .get_file_checkpoint("mono", &DevInode::new(42, 7))
        .unwrap()
        .acked_offset;

    let restarted = store_at(&dir);
    restarted.load().unwrap();
    let after = restarted
        .get_file_checkpoint("mono", &DevInode::new(42, 7))
        .unwrap();
    assert!(after.acked_offset >= before.min(35));
    // A stale, lower ack after recovery must not regress the offset
    restarted.ack("mono", &DevInode::new(42, 7), 1, 9000);
    let final_cp = restarted
        .get_file_checkpoint("mono", &DevInode::new(42, 7))
        .unwrap();
    assert_eq!(final_cp.acked_offset, after.acked_offset);
}

#[test]
fn test_job_deletion_is_durable() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store.job("gone").write().add_file(loading_checkpoint("gone", 1));
    store.job("kept").write().add_file(loading_checkpoint("kept", 2));
    store.dump().unwrap();

    store.delete_job("gone");
    let restarted = store_at(&dir);
    restarted.load().unwrap();
    assert!(restarted.get_file_checkpoint("gone", &DevInode::new(42, 1)).is_none());
    assert!(restarted.get_file_checkpoint("kept", &DevInode::new(42, 2)).is_some());
}
