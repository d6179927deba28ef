// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checkpoint Entities
//!
//! Durable read-position records. A [`FileCheckpoint`] tracks one file's
//! fingerprint, acknowledged and submitted offsets, and its status machine;
//! a [`JobCheckpoint`] groups the file checkpoints of one job: either an
//! open-ended tailing job or an ordered, finite ad-hoc job consumed front
//! to back through a cursor.
//!
//! ## Invariants
//!
//! - `acked_offset <= submitted_offset <= size` at all times
//! - `acked_offset` is monotonically non-decreasing for the record's life
//! - once a record reaches `Finished` or `Lost` it is never modified again
//!   (only deleted)
//! - `0 <= cursor <= file_count`; `cursor == file_count` is terminal
//!
//! ## Serialisation
//!
//! Records serialise with status-dependent field sets: `Waiting` carries
//! identity and size; `Loading` adds offsets, signature, and timestamps;
//! `Finished` drops identity and signature but keeps the real file name and
//! timestamps; `Lost` keeps only the last-update timestamp. The store dumps
//! one JSON document per job.

use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::error::AgentError;
use crate::value_objects::{DevInode, FileFingerprint};

/// Read status of one file checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileReadStatus {
    /// Discovered, nothing read yet.
    Waiting,
    /// Actively being read.
    Loading,
    /// Read to its final EOF (ad-hoc jobs only reach this).
    Finished,
    /// Disappeared or became inconsistent before completion.
    Lost,
}

impl FileReadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileReadStatus::Waiting => "waiting",
            FileReadStatus::Loading => "loading",
            FileReadStatus::Finished => "finished",
            FileReadStatus::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AgentError> {
        match s {
            "waiting" => Ok(FileReadStatus::Waiting),
            "loading" => Ok(FileReadStatus::Loading),
            "finished" => Ok(FileReadStatus::Finished),
            "lost" => Ok(FileReadStatus::Lost),
            other => Err(AgentError::checkpoint_corrupt(format!(
                "unknown file status '{other}'"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FileReadStatus::Finished | FileReadStatus::Lost)
    }
}

/// What an update did, so the store can decide whether to force a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEffect {
    /// Plain offset progress; the periodic dump cadence covers it.
    Progress,
    /// A status transition happened; the store should dump promptly.
    Transition,
    /// The record was terminal; nothing changed.
    Ignored,
}

/// Durable record of one file's read position.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    /// Path under which the file was discovered.
    pub file_name: String,
    /// Current name on disk (tracks renames during rotation).
    pub real_file_name: String,
    pub fingerprint: FileFingerprint,
    /// File size at the last read.
    pub size: u64,
    /// Last offset acknowledged by a sink. The resume point.
    pub acked_offset: u64,
    /// Last offset handed to the pipeline.
    pub submitted_offset: u64,
    pub status: FileReadStatus,
    /// Name of the owning job/config.
    pub job_name: String,
    pub start_time: i64,
    pub last_update_time: i64,
}

impl FileCheckpoint {
    /// Allocates a fresh record in `Waiting` status.
    pub fn new(job_name: impl Into<String>, file_name: impl Into<String>, now: i64) -> Self {
        let file_name = file_name.into();
        Self {
            real_file_name: file_name.clone(),
            file_name,
            fingerprint: FileFingerprint::default(),
            size: 0,
            acked_offset: 0,
            submitted_offset: 0,
            status: FileReadStatus::Waiting,
            job_name: job_name.into(),
            start_time: now,
            last_update_time: now,
        }
    }

    /// Waiting → Loading, stamping the start time.
    pub fn begin_loading(&mut self, now: i64) -> UpdateEffect {
        if self.status.is_terminal() {
            return UpdateEffect::Ignored;
        }
        if self.status == FileReadStatus::Waiting {
            self.status = FileReadStatus::Loading;
            self.start_time = now;
            self.last_update_time = now;
            return UpdateEffect::Transition;
        }
        UpdateEffect::Progress
    }

    /// Records bytes handed to the pipeline. Offsets never move backwards.
    pub fn advance_submitted(&mut self, offset: u64, size: u64, now: i64) -> UpdateEffect {
        if self.status.is_terminal() {
            return UpdateEffect::Ignored;
        }
        self.submitted_offset = self.submitted_offset.max(offset);
        self.size = size.max(self.submitted_offset);
        self.last_update_time = now;
        debug_assert!(self.acked_offset <= self.submitted_offset);
        debug_assert!(self.submitted_offset <= self.size);
        UpdateEffect::Progress
    }

    /// Records a sink acknowledgement up through `offset`.
    pub fn ack(&mut self, offset: u64, now: i64) -> UpdateEffect {
        if self.status.is_terminal() {
            return UpdateEffect::Ignored;
        }
        // Monotone: late or duplicate acks never regress the resume point.
        self.acked_offset = self.acked_offset.max(offset.min(self.submitted_offset));
        self.last_update_time = now;
        UpdateEffect::Progress
    }

    /// Truncate-in-place observed: restart the file from zero.
    pub fn reset_for_truncate(&mut self, fingerprint: FileFingerprint, now: i64) -> UpdateEffect {
        if self.status.is_terminal() {
            return UpdateEffect::Ignored;
        }
        self.fingerprint = fingerprint;
        self.acked_offset = 0;
        self.submitted_offset = 0;
        self.size = 0;
        self.last_update_time = now;
        UpdateEffect::Transition
    }

    /// Loading → Finished (ad-hoc jobs, file fully read and acked).
    pub fn finish(&mut self, now: i64) -> UpdateEffect {
        if self.status.is_terminal() {
            return UpdateEffect::Ignored;
        }
        self.status = FileReadStatus::Finished;
        self.last_update_time = now;
        UpdateEffect::Transition
    }

    /// Any state → Lost.
    pub fn mark_lost(&mut self, now: i64) -> UpdateEffect {
        if self.status.is_terminal() {
            return UpdateEffect::Ignored;
        }
        self.status = FileReadStatus::Lost;
        self.last_update_time = now;
        UpdateEffect::Transition
    }

    /// Serialises with the field set mandated by the current status.
    pub fn to_json(&self) -> Value {
        let mut file = Map::new();
        file.insert("file_name".into(), json!(self.file_name));
        file.insert("status".into(), json!(self.status.as_str()));
        match self.status {
            FileReadStatus::Waiting => {
                file.insert("dev".into(), json!(self.fingerprint.dev_inode.dev));
                file.insert("inode".into(), json!(self.fingerprint.dev_inode.inode));
                file.insert("size".into(), json!(self.size));
            }
            FileReadStatus::Loading => {
                file.insert("dev".into(), json!(self.fingerprint.dev_inode.dev));
                file.insert("inode".into(), json!(self.fingerprint.dev_inode.inode));
                file.insert("offset".into(), json!(self.acked_offset));
                file.insert("submitted_offset".into(), json!(self.submitted_offset));
                file.insert("size".into(), json!(self.size));
                file.insert("sig_hash".into(), json!(self.fingerprint.sig_hash));
                file.insert("sig_size".into(), json!(self.fingerprint.sig_size));
                file.insert("start_time".into(), json!(self.start_time));
                file.insert("update_time".into(), json!(self.last_update_time));
                file.insert("real_file_name".into(), json!(self.real_file_name));
            }
            FileReadStatus::Finished => {
                file.insert("size".into(), json!(self.size));
                file.insert("start_time".into(), json!(self.start_time));
                file.insert("update_time".into(), json!(self.last_update_time));
                file.insert("real_file_name".into(), json!(self.real_file_name));
            }
            FileReadStatus::Lost => {
                file.insert("update_time".into(), json!(self.last_update_time));
            }
        }
        Value::Object(file)
    }

    /// Restores a record dumped by [`to_json`](Self::to_json).
    pub fn from_json(job_name: &str, value: &Value) -> Result<Self, AgentError> {
        let status = FileReadStatus::parse(
            value
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| AgentError::checkpoint_corrupt("missing status"))?,
        )?;
        let file_name = value
            .get("file_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let u64_field = |key: &str| value.get(key).and_then(Value::as_u64).unwrap_or(0);
        let i64_field = |key: &str| value.get(key).and_then(Value::as_i64).unwrap_or(0);

        let mut checkpoint = FileCheckpoint {
            real_file_name: value
                .get("real_file_name")
                .and_then(Value::as_str)
                .unwrap_or(&file_name)
                .to_string(),
            file_name,
            fingerprint: FileFingerprint::default(),
            size: u64_field("size"),
            acked_offset: 0,
            submitted_offset: 0,
            status,
            job_name: job_name.to_string(),
            start_time: i64_field("start_time"),
            last_update_time: i64_field("update_time"),
        };
        match status {
            FileReadStatus::Waiting => {
                checkpoint.fingerprint.dev_inode = DevInode::new(u64_field("dev"), u64_field("inode"));
            }
            FileReadStatus::Loading => {
                checkpoint.fingerprint = FileFingerprint::new(
                    DevInode::new(u64_field("dev"), u64_field("inode")),
                    u64_field("sig_size") as u32,
                    u64_field("sig_hash"),
                );
                checkpoint.acked_offset = u64_field("offset");
                // Older dumps carry a single offset; resume conservatively.
                checkpoint.submitted_offset =
                    u64_field("submitted_offset").max(checkpoint.acked_offset);
            }
            FileReadStatus::Finished | FileReadStatus::Lost => {}
        }
        Ok(checkpoint)
    }
}

/// The file checkpoints of one job, plus the cursor of ordered jobs.
///
/// Files live in a flat arena (`Vec`) with a dev-inode index beside it, so
/// records and their job refer to each other by position rather than by
/// shared pointers.
#[derive(Debug)]
pub struct JobCheckpoint {
    job_name: String,
    files: Vec<FileCheckpoint>,
    index: HashMap<DevInode, usize>,
    /// `Some` for ordered ad-hoc jobs; `None` for open-ended tailing jobs.
    cursor: Option<usize>,
}

impl JobCheckpoint {
    /// Open-ended tailing job: files come and go, no cursor.
    pub fn new_tailing(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            files: Vec::new(),
            index: HashMap::new(),
            cursor: None,
        }
    }

    /// Ordered ad-hoc job over a fixed file list, consumed front to back.
    pub fn new_adhoc(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            files: Vec::new(),
            index: HashMap::new(),
            cursor: Some(0),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_ordered(&self) -> bool {
        self.cursor.is_some()
    }

    /// An ordered job is terminal when the cursor has passed every file.
    pub fn is_terminal(&self) -> bool {
        match self.cursor {
            Some(cursor) => cursor >= self.files.len(),
            None => false,
        }
    }

    pub fn add_file(&mut self, checkpoint: FileCheckpoint) -> usize {
        let position = self.files.len();
        if checkpoint.fingerprint.dev_inode.is_valid() {
            self.index.insert(checkpoint.fingerprint.dev_inode, position);
        }
        self.files.push(checkpoint);
        position
    }

    pub fn files(&self) -> &[FileCheckpoint] {
        &self.files
    }

    pub fn get(&self, dev_inode: &DevInode) -> Option<&FileCheckpoint> {
        self.index.get(dev_inode).map(|&i| &self.files[i])
    }

    pub fn get_mut(&mut self, dev_inode: &DevInode) -> Option<&mut FileCheckpoint> {
        match self.index.get(dev_inode) {
            Some(&i) => self.files.get_mut(i),
            None => None,
        }
    }

    /// Registers a late-learned identity for a record added before its
    /// fingerprint was known.
    pub fn reindex(&mut self, position: usize) {
        if let Some(checkpoint) = self.files.get(position) {
            if checkpoint.fingerprint.dev_inode.is_valid() {
                self.index.insert(checkpoint.fingerprint.dev_inode, position);
            }
        }
    }

    /// Whether `key` matches the ordered job's current-cursor file.
    ///
    /// Only the cursor file is compared. A rediscovery of an *earlier* file
    /// does not reopen the job; that is a deliberate configuration decision
    /// (see `reopen_completed_job_files`, default off).
    pub fn check_consistency(&self, key: &FileFingerprint) -> bool {
        let Some(cursor) = self.cursor else {
            return true;
        };
        let Some(current) = self.files.get(cursor) else {
            return false;
        };
        current.fingerprint.same_file(key)
    }

    /// The ordered job's current file, if any remain.
    pub fn current_file(&self) -> Option<&FileCheckpoint> {
        self.cursor.and_then(|cursor| self.files.get(cursor))
    }

    /// Applies `update` to the ordered job's current file if `key` matches
    /// it; otherwise the current file is marked lost and skipped. The
    /// cursor advances past any file that reached a terminal status.
    pub fn update_current(
        &mut self,
        key: &FileFingerprint,
        now: i64,
        update: impl FnOnce(&mut FileCheckpoint) -> UpdateEffect,
    ) -> UpdateEffect {
        let Some(cursor) = self.cursor else {
            return UpdateEffect::Ignored;
        };
        if cursor >= self.files.len() {
            return UpdateEffect::Ignored;
        }
        let effect = if self.check_consistency(key) {
            let checkpoint = &mut self.files[cursor];
            let effect = update(checkpoint);
            if checkpoint.status == FileReadStatus::Loading
                && checkpoint.acked_offset == checkpoint.size
                && checkpoint.size > 0
            {
                checkpoint.finish(now)
            } else {
                effect
            }
        } else {
            // Jumping forward abandons the cursor file.
            self.files[cursor].mark_lost(now)
        };
        if self.files[cursor].status.is_terminal() {
            self.cursor = Some(cursor + 1);
        }
        effect
    }

    /// Serialises the whole job into one JSON document.
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert("job_name".into(), json!(self.job_name));
        root.insert("job_file_count".into(), json!(self.files.len()));
        if let Some(cursor) = self.cursor {
            root.insert("job_current_file_index".into(), json!(cursor));
        }
        root.insert(
            "job_files".into(),
            Value::Array(self.files.iter().map(FileCheckpoint::to_json).collect()),
        );
        Value::Object(root)
    }

    /// Restores a job dumped by [`to_json`](Self::to_json).
    pub fn from_json(value: &Value) -> Result<Self, AgentError> {
        let job_name = value
            .get("job_name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::checkpoint_corrupt("missing job_name"))?
            .to_string();
        let cursor = value
            .get("job_current_file_index")
            .and_then(Value::as_u64)
            .map(|c| c as usize);
        let mut job = JobCheckpoint {
            job_name: job_name.clone(),
            files: Vec::new(),
            index: HashMap::new(),
            cursor,
        };
        let files = value
            .get("job_files")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::checkpoint_corrupt("missing job_files"))?;
        for file in files {
            job.add_file(FileCheckpoint::from_json(&job_name, file)?);
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loading_checkpoint(now: i64) -> FileCheckpoint {
        let mut cp = FileCheckpoint::new("job-a", "/var/log/app.log", now);
        cp.fingerprint = FileFingerprint::new(DevInode::new(1, 42), 16, 0xfeed);
        cp.begin_loading(now);
        cp.advance_submitted(100, 200, now);
        cp
    }

    #[test]
    fn test_offsets_stay_monotone() {
        let mut cp = loading_checkpoint(1000);
        cp.ack(60, 1001);
        assert_eq!(cp.acked_offset, 60);
        // A duplicate, lower ack never regresses the resume point
        cp.ack(30, 1002);
        assert_eq!(cp.acked_offset, 60);
        // Acks are clamped to what was actually submitted
        cp.ack(10_000, 1003);
        assert_eq!(cp.acked_offset, 100);
    }

    #[test]
    fn test_terminal_records_are_frozen() {
        let mut cp = loading_checkpoint(1000);
        cp.mark_lost(1001);
        assert_eq!(cp.advance_submitted(500, 500, 1002), UpdateEffect::Ignored);
        assert_eq!(cp.ack(500, 1002), UpdateEffect::Ignored);
        assert_eq!(cp.acked_offset, 0);
    }

    #[test]
    fn test_status_dependent_serialisation() {
        let mut cp = loading_checkpoint(1000);
        cp.ack(80, 1005);

        let loading = cp.to_json();
        assert_eq!(loading["offset"], 80);
        assert_eq!(loading["submitted_offset"], 100);
        assert_eq!(loading["sig_hash"], 0xfeed);

        cp.finish(1010);
        let finished = cp.to_json();
        assert!(finished.get("dev").is_none(), "finished drops identity");
        assert!(finished.get("sig_hash").is_none(), "finished drops signature");
        assert_eq!(finished["real_file_name"], "/var/log/app.log");

        let mut lost = loading_checkpoint(2000);
        lost.mark_lost(2001);
        let lost = lost.to_json();
        assert_eq!(lost["update_time"], 2001);
        assert!(lost.get("size").is_none(), "lost keeps only the timestamp");
    }

    #[test]
    fn test_round_trip_preserves_loading_fields() {
        let mut cp = loading_checkpoint(1234);
        cp.ack(80, 1300);
        let restored = FileCheckpoint::from_json("job-a", &cp.to_json()).unwrap();
        assert_eq!(restored.acked_offset, 80);
        assert_eq!(restored.submitted_offset, 100);
        assert_eq!(restored.fingerprint, cp.fingerprint);
        assert_eq!(restored.start_time, cp.start_time);
        assert_eq!(restored.last_update_time, cp.last_update_time);
    }

    #[test]
    fn test_ordered_job_cursor_advances_on_finish() {
        let mut job = JobCheckpoint::new_adhoc("batch");
        for inode in [1u64, 2] {
            let mut cp = FileCheckpoint::new("batch", format!("/data/{inode}.log"), 0);
            cp.fingerprint = FileFingerprint::new(DevInode::new(9, inode), 8, inode);
            cp.size = 10;
            job.add_file(cp);
        }
        let first = job.current_file().unwrap().fingerprint;
        assert!(job.check_consistency(&first));

        job.update_current(&first, 5, |cp| {
            cp.begin_loading(5);
            cp.advance_submitted(10, 10, 5);
            cp.ack(10, 5)
        });
        assert_eq!(job.cursor(), Some(1));
        assert_eq!(job.files()[0].status, FileReadStatus::Finished);
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_ordered_job_skip_marks_lost() {
        let mut job = JobCheckpoint::new_adhoc("batch");
        for inode in [1u64, 2] {
            let mut cp = FileCheckpoint::new("batch", format!("/data/{inode}.log"), 0);
            cp.fingerprint = FileFingerprint::new(DevInode::new(9, inode), 8, inode);
            job.add_file(cp);
        }
        // An update keyed to the second file abandons the first
        let second = job.files()[1].fingerprint;
        job.update_current(&second, 7, |cp| cp.begin_loading(7));
        assert_eq!(job.files()[0].status, FileReadStatus::Lost);
        assert_eq!(job.cursor(), Some(1));
    }

    #[test]
    fn test_job_round_trip() {
        let mut job = JobCheckpoint::new_adhoc("batch");
        let mut cp = loading_checkpoint(100);
        cp.job_name = "batch".into();
        job.add_file(cp);

        let restored = JobCheckpoint::from_json(&job.to_json()).unwrap();
        assert_eq!(restored.job_name(), "batch");
        assert_eq!(restored.file_count(), 1);
        assert_eq!(restored.cursor(), Some(0));
        assert!(restored.get(&DevInode::new(1, 42)).is_some());
    }
}
