// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tail Reader
//!
//! One reader per live file. The reader owns the file handle, a held-back
//! byte buffer, and the raw read position; each tick reads incrementally,
//! splits records per the configured multi-line mode, and advances the
//! submitted offset in the checkpoint store.
//!
//! ## Rotation decision table (checked before each read)
//!
//! - same identity, same signature → same file; keep reading at offset
//! - same identity, different signature → truncate-in-place; reset to 0
//! - different identity behind the path → rotation; this reader keeps
//!   draining its open handle to EOF and reports `rotated_away` so the
//!   pump starts a fresh reader (with a fresh checkpoint) for the path
//! - path gone → drain the handle, report `vanished`
//!
//! ## Hold-back
//!
//! A trailing partial line (and, in begin-pattern mode, the still-open
//! last record; in JSON mode, a partial object) stays in the pending
//! buffer across ticks. Forced flushes: rotation EOF, vanish, shutdown,
//! or a run of data-less ticks: emit the tail so nothing is held
//! forever. GBK data is split raw and converted per record, so offsets
//! are raw file offsets throughout.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use logship_domain::entities::{MultilineConfig, MultilineMode, TextEncoding};
use logship_domain::services::split::{
    compile_begin_pattern, split_by_begin_pattern, split_json_objects, split_lines, SplitRecords,
};
use logship_domain::{AgentError, DevInode, FileCheckpoint, FileFingerprint, FileReadStatus};

use crate::infrastructure::alarms::{AlarmKind, AlarmSink};
use crate::infrastructure::checkpoint::CheckpointStore;
use crate::infrastructure::reader::encoding::decode_record;
use crate::infrastructure::reader::file_meta::{file_dev_inode, handle_dev_inode, read_head};

/// Per-reader configuration, resolved from the file input config.
#[derive(Debug, Clone)]
pub struct TailReaderConfig {
    /// Checkpoint job (the owning pipeline's name).
    pub pipeline: String,
    pub encoding: TextEncoding,
    pub multiline: MultilineConfig,
    /// Close an unused handle after this many seconds; state is kept.
    pub close_unused_secs: u64,
    /// Read budget per tick.
    pub max_read_bytes: usize,
    /// Data-less ticks before a held multi-line tail is force-flushed.
    pub force_flush_ticks: u32,
}

impl TailReaderConfig {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            encoding: TextEncoding::Utf8,
            multiline: MultilineConfig::default(),
            close_unused_secs: 3600,
            max_read_bytes: 512 * 1024,
            force_flush_ticks: 3,
        }
    }
}

/// One split record with its byte offset in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub offset: u64,
    pub bytes: Vec<u8>,
}

/// Outcome of one read tick.
#[derive(Debug, Default)]
pub struct TickResult {
    pub records: Vec<RawRecord>,
    /// All currently available bytes were read.
    pub reached_eof: bool,
    /// The path now resolves to a different identity.
    pub rotated_away: bool,
    /// The path no longer exists.
    pub vanished: bool,
    /// Submitted offset after this tick (start of the held-back tail).
    pub end_offset: u64,
}

/// Per-file tailing reader.
pub struct TailReader {
    config: TailReaderConfig,
    path: PathBuf,
    store: Arc<CheckpointStore>,
    alarms: Arc<AlarmSink>,
    file: Option<File>,
    dev_inode: DevInode,
    fingerprint: FileFingerprint,
    /// Next raw byte to read from the file.
    offset: u64,
    pending: Vec<u8>,
    /// File offset of `pending[0]`.
    pending_base: u64,
    begin_re: Option<regex::bytes::Regex>,
    idle_ticks: u32,
    last_activity: Instant,
}

impl TailReader {
    /// Opens `path` and resumes from its checkpoint when identity and
    /// signature still match; otherwise starts a fresh checkpoint.
    pub fn open(
        path: PathBuf,
        config: TailReaderConfig,
        store: Arc<CheckpointStore>,
        alarms: Arc<AlarmSink>,
    ) -> Result<Self, AgentError> {
        let multiline = config.multiline.clone().normalized();
        let begin_re = match (&multiline.mode, &multiline.begin_pattern) {
            (MultilineMode::BeginPattern, Some(pattern)) => Some(compile_begin_pattern(pattern)?),
            _ => None,
        };

        let mut reader = Self {
            config: TailReaderConfig {
                multiline,
                ..config
            },
            path,
            store,
            alarms,
            file: None,
            dev_inode: DevInode::default(),
            fingerprint: FileFingerprint::default(),
            offset: 0,
            pending: Vec::new(),
            pending_base: 0,
            begin_re,
            idle_ticks: 0,
            last_activity: Instant::now(),
        };
        reader.open_handle()?;
        Ok(reader)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn dev_inode(&self) -> DevInode {
        self.dev_inode
    }

    pub fn pipeline(&self) -> &str {
        &self.config.pipeline
    }

    /// Follows a rename of the same identity (MoveFrom/MoveTo pair).
    pub fn set_path(&mut self, path: PathBuf) {
        debug!(from = %self.path.display(), to = %path.display(), "reader follows rename");
        self.path = path.clone();
        let now = now_ts();
        self.store
            .update_file_checkpoint(&self.config.pipeline, &self.dev_inode, |cp| {
                cp.real_file_name = path.display().to_string();
                cp.begin_loading(now)
            });
    }

    fn open_handle(&mut self) -> Result<(), AgentError> {
        let mut file = File::open(&self.path)?;
        let dev_inode = handle_dev_inode(&file)?;
        let head = read_head(&mut file)?;
        let current = FileFingerprint::over(dev_inode, &head);

        // Transparent reopen after an idle close: same file, same content,
        // and the reader still holds its in-memory position and tail.
        if self.dev_inode.is_valid()
            && dev_inode == self.dev_inode
            && self.fingerprint.matches_content(&head)
        {
            file.seek(SeekFrom::Start(self.offset))?;
            self.file = Some(file);
            self.last_activity = Instant::now();
            return Ok(());
        }

        let now = now_ts();
        let existing = self.store.get_file_checkpoint(&self.config.pipeline, &dev_inode);
        let resume = match existing {
            Some(cp) if cp.status == FileReadStatus::Loading && cp.fingerprint.matches_content(&head) => {
                // Same file as last seen; resume at the acknowledged
                // offset so a crash never skips unsent bytes.
                self.fingerprint = cp.fingerprint;
                cp.acked_offset
            }
            Some(_) => {
                // Same inode, different leading bytes: rewritten in place.
                self.store
                    .update_file_checkpoint(&self.config.pipeline, &dev_inode, |cp| {
                        cp.reset_for_truncate(current, now)
                    });
                self.fingerprint = current;
                0
            }
            None => {
                let mut cp = FileCheckpoint::new(&self.config.pipeline, self.path.display().to_string(), now);
                cp.fingerprint = current;
                cp.begin_loading(now);
                self.store.job(&self.config.pipeline).write().add_file(cp);
                self.fingerprint = current;
                0
            }
        };

        self.store
            .update_file_checkpoint(&self.config.pipeline, &dev_inode, |cp| cp.begin_loading(now));

        file.seek(SeekFrom::Start(resume))?;
        self.file = Some(file);
        self.dev_inode = dev_inode;
        self.offset = resume;
        self.pending.clear();
        self.pending_base = resume;
        self.last_activity = Instant::now();
        debug!(path = %self.path.display(), id = %dev_inode, resume, "opened tailing reader");
        Ok(())
    }

    /// Checks the rotation decision table. Returns `(rotated, vanished)`.
    fn check_rotation(&mut self) -> (bool, bool) {
        match file_dev_inode(&self.path) {
            Err(_) => (false, true),
            Ok(identity) if identity != self.dev_inode => (true, false),
            Ok(_) => {
                // Same identity: distinguish truncate-in-place.
                if let Some(file) = self.file.as_mut() {
                    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
                    if size < self.offset {
                        let head = read_head(file).unwrap_or_default();
                        let fresh = FileFingerprint::over(self.dev_inode, &head);
                        debug!(path = %self.path.display(), size, offset = self.offset, "truncate detected, restarting at 0");
                        let now = now_ts();
                        self.store
                            .update_file_checkpoint(&self.config.pipeline, &self.dev_inode, |cp| {
                                cp.reset_for_truncate(fresh, now)
                            });
                        self.fingerprint = fresh;
                        self.offset = 0;
                        self.pending.clear();
                        self.pending_base = 0;
                        let _ = file.seek(SeekFrom::Start(0));
                    } else if (self.fingerprint.sig_size as u64) < size
                        && self.fingerprint.sig_size < 1024
                    {
                        // The file grew: extend the signature window.
                        if let Ok(head) = read_head(file) {
                            if self.fingerprint.matches_content(&head) {
                                let grown = FileFingerprint::over(self.dev_inode, &head);
                                self.fingerprint = grown;
                                self.store.update_file_checkpoint(
                                    &self.config.pipeline,
                                    &self.dev_inode,
                                    |cp| {
                                        cp.fingerprint = grown;
                                        logship_domain::entities::UpdateEffect::Progress
                                    },
                                );
                            }
                        }
                    }
                }
                (false, false)
            }
        }
    }

    /// One read tick. `force` flushes all held-back data (shutdown, final
    /// drain of an ad-hoc file).
    pub fn tick(&mut self, force: bool) -> Result<TickResult, AgentError> {
        let mut result = TickResult::default();

        if self.file.is_none() {
            match self.open_handle() {
                Ok(()) => {}
                Err(AgentError::IoError(_)) => {
                    // Temporarily missing or already deleted: report
                    // vanished and let the flush logic drain the tail.
                    result.vanished = true;
                }
                Err(e) => return Err(e),
            }
        }

        let (rotated, vanished) = if self.file.is_some() {
            self.check_rotation()
        } else {
            (false, true)
        };
        result.rotated_away = rotated;
        result.vanished = vanished;

        // Read up to the budget from the open handle.
        let mut new_bytes = 0usize;
        let mut file_size = self.offset;
        if let Some(file) = self.file.as_mut() {
            file_size = file.metadata().map(|m| m.len()).unwrap_or(self.offset);
            let budget = self.config.max_read_bytes;
            let start = self.pending.len();
            self.pending.resize(start + budget, 0);
            let mut filled = 0usize;
            while filled < budget {
                let read = file.read(&mut self.pending[start + filled..])?;
                if read == 0 {
                    result.reached_eof = true;
                    break;
                }
                filled += read;
            }
            self.pending.truncate(start + filled);
            new_bytes = filled;
            self.offset += filled as u64;
        }

        if new_bytes == 0 {
            self.idle_ticks = self.idle_ticks.saturating_add(1);
        } else {
            self.idle_ticks = 0;
            self.last_activity = Instant::now();
        }

        // Forced flush: explicit, end-of-life, or a stable data-less run.
        let flush = force
            || result.vanished
            || (result.rotated_away && result.reached_eof)
            || (self.idle_ticks >= self.config.force_flush_ticks && !self.pending.is_empty());

        let split = self.split_pending(flush);
        self.emit_records(split, &mut result);

        // Everything before the held-back tail is submitted.
        let now = now_ts();
        result.end_offset = self.pending_base;
        self.store
            .update_file_checkpoint(&self.config.pipeline, &self.dev_inode, |cp| {
                cp.advance_submitted(result.end_offset, file_size.max(result.end_offset), now)
            });

        Ok(result)
    }

    fn split_pending(&self, flush: bool) -> SplitRecords {
        match self.config.multiline.mode {
            MultilineMode::WholeLine => split_lines(&self.pending, flush),
            MultilineMode::Json => split_json_objects(&self.pending, flush),
            MultilineMode::BeginPattern => {
                let begin = self.begin_re.as_ref().expect("begin mode implies pattern");
                // Only complete lines participate; a partial line stays.
                let upto = if flush {
                    self.pending.len()
                } else {
                    match self.pending.iter().rposition(|b| *b == b'\n') {
                        Some(nl) => nl + 1,
                        None => 0,
                    }
                };
                let mut out = split_by_begin_pattern(
                    &self.pending[..upto],
                    begin,
                    self.config.multiline.discard_unmatch,
                );
                if !flush {
                    // The last record may still be growing; roll it back.
                    if let Some(last) = out.records.pop() {
                        out.consumed = last.start;
                    }
                } else {
                    out.consumed = self.pending.len();
                }
                out
            }
        }
    }

    fn emit_records(&mut self, split: SplitRecords, result: &mut TickResult) {
        if !split.discarded.is_empty() {
            let first = &split.discarded[0];
            let sample = &self.pending[first.clone()];
            self.alarms.raise(
                AlarmKind::DiscardData,
                &self.config.pipeline,
                &format!(
                    "discarded {} unmatched/garbage range(s) in {}",
                    split.discarded.len(),
                    self.path.display()
                ),
                sample,
            );
        }
        if !split.any_match && !self.pending.is_empty() && split.records.is_empty() && split.consumed > 0 {
            self.alarms.raise(
                AlarmKind::SplitLogFail,
                &self.config.pipeline,
                &format!("no record boundary matched in {}", self.path.display()),
                &self.pending,
            );
        }

        for range in &split.records {
            let bytes = decode_record(&self.pending[range.clone()], self.config.encoding).into_owned();
            result.records.push(RawRecord {
                offset: self.pending_base + range.start as u64,
                bytes,
            });
        }

        let consumed = split.consumed.min(self.pending.len());
        if consumed > 0 {
            self.pending.drain(..consumed);
            self.pending_base += consumed as u64;
        }
        trace!(
            path = %self.path.display(),
            records = result.records.len(),
            held = self.pending.len(),
            "tick split"
        );
    }

    /// Closes a handle unused for the configured interval; the checkpoint
    /// and reader state are preserved, reopen is transparent.
    pub fn maybe_close_idle(&mut self) {
        if self.file.is_some()
            && self.last_activity.elapsed().as_secs() >= self.config.close_unused_secs
        {
            debug!(path = %self.path.display(), "closing idle reader handle");
            self.file = None;
        }
    }

    pub fn has_open_handle(&self) -> bool {
        self.file.is_some()
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
