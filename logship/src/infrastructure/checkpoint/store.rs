// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checkpoint Store
//!
//! In-memory job/file checkpoint state with JSON persistence.
//!
//! ## Concurrency
//!
//! A single-writer, many-reader lock protects each job's entries; the outer
//! job map has its own lock that is only held for map-level operations.
//! The dumper serialises one job at a time under that job's read lock, so
//! writers are blocked for at most one job-serialisation duration.
//!
//! ## Durability
//!
//! Dumps use write-new-then-rename: serialise to `<path>.new`, fsync,
//! rename over `<path>`. Loads prefer the live path and fall back to
//! `<path>.new` only when the live path is missing. A write-open failure
//! is alarmed and the store keeps serving from memory; a parse failure on
//! load discards that job only.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use logship_domain::entities::UpdateEffect;
use logship_domain::{AgentError, DevInode, FileCheckpoint, JobCheckpoint};

use crate::infrastructure::alarms::{AlarmKind, AlarmSink};

/// Durable per-file position store, one JSON document per job.
pub struct CheckpointStore {
    dir: PathBuf,
    jobs: RwLock<HashMap<String, Arc<RwLock<JobCheckpoint>>>>,
    alarms: Arc<AlarmSink>,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, alarms: Arc<AlarmSink>) -> Self {
        Self {
            dir: dir.into(),
            jobs: RwLock::new(HashMap::new()),
            alarms,
        }
    }

    /// Returns the job record, creating an open-ended tailing job if absent.
    pub fn job(&self, name: &str) -> Arc<RwLock<JobCheckpoint>> {
        if let Some(job) = self.jobs.read().get(name) {
            return Arc::clone(job);
        }
        let mut jobs = self.jobs.write();
        Arc::clone(
            jobs.entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(JobCheckpoint::new_tailing(name)))),
        )
    }

    /// Registers an ordered ad-hoc job. Replaces any previous job state
    /// under the same name.
    pub fn create_adhoc_job(&self, name: &str, files: Vec<FileCheckpoint>) -> Arc<RwLock<JobCheckpoint>> {
        let mut job = JobCheckpoint::new_adhoc(name);
        for file in files {
            job.add_file(file);
        }
        let job = Arc::new(RwLock::new(job));
        self.jobs.write().insert(name.to_string(), Arc::clone(&job));
        job
    }

    /// Allocates a new `Waiting` record for `path` under `job`.
    pub fn create_file_checkpoint(&self, job: &str, path: &str, now: i64) -> Arc<RwLock<JobCheckpoint>> {
        let handle = self.job(job);
        handle.write().add_file(FileCheckpoint::new(job, path, now));
        handle
    }

    /// Looks up a file record by identity; the caller compares signatures.
    pub fn get_file_checkpoint(&self, job: &str, dev_inode: &DevInode) -> Option<FileCheckpoint> {
        let handle = self.job(job);
        let guard = handle.read();
        guard.get(dev_inode).cloned()
    }

    /// Applies `update` to the record for `dev_inode` atomically with
    /// respect to readers. Returns what the update did; a status transition
    /// triggers a prompt dump of the job.
    pub fn update_file_checkpoint(
        &self,
        job: &str,
        dev_inode: &DevInode,
        update: impl FnOnce(&mut FileCheckpoint) -> UpdateEffect,
    ) -> UpdateEffect {
        let handle = self.job(job);
        let effect = {
            let mut guard = handle.write();
            match guard.get_mut(dev_inode) {
                Some(checkpoint) => update(checkpoint),
                None => UpdateEffect::Ignored,
            }
        };
        if effect == UpdateEffect::Transition {
            if let Err(e) = self.dump_job(job) {
                self.alarms.raise(
                    AlarmKind::CheckpointFail,
                    job,
                    &format!("prompt dump after transition failed: {e}"),
                    b"",
                );
            }
        }
        effect
    }

    /// Records a sink acknowledgement up through `offset` for one file.
    pub fn ack(&self, job: &str, dev_inode: &DevInode, offset: u64, now: i64) {
        self.update_file_checkpoint(job, dev_inode, |cp| cp.ack(offset, now));
    }

    /// Removes all records for `job`, in memory and on disk.
    pub fn delete_job(&self, job: &str) {
        self.jobs.write().remove(job);
        let path = self.job_path(job);
        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(new_path(&path));
        info!(job, "deleted job checkpoints");
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.read().keys().cloned().collect()
    }

    /// Snapshots every job to stable storage.
    pub fn dump(&self) -> Result<(), AgentError> {
        let names = self.job_names();
        let mut first_error = None;
        for name in names {
            if let Err(e) = self.dump_job(&name) {
                self.alarms.raise(
                    AlarmKind::CheckpointFail,
                    &name,
                    &format!("dump failed: {e}"),
                    b"",
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Serialises one job under its read lock, then writes new-then-rename.
    pub fn dump_job(&self, name: &str) -> Result<(), AgentError> {
        let Some(job) = self.jobs.read().get(name).map(Arc::clone) else {
            return Ok(());
        };
        let document = {
            let guard = job.read();
            serde_json::to_vec_pretty(&guard.to_json())?
        };

        fs::create_dir_all(&self.dir)?;
        let live = self.job_path(name);
        let staged = new_path(&live);
        {
            let mut file = fs::File::create(&staged)?;
            file.write_all(&document)?;
            file.sync_all()?;
        }
        fs::rename(&staged, &live)?;
        debug!(job = name, path = %live.display(), "dumped job checkpoint");
        Ok(())
    }

    /// Restores state from stable storage at startup.
    ///
    /// Prefers the live path per job; a `.new` file is only consulted when
    /// its live path is missing (a crash between write and rename). Corrupt
    /// documents discard that job and never fail the load.
    pub fn load(&self) -> Result<(), AgentError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let candidate = if name.ends_with(".json") {
                Some(path.clone())
            } else if let Some(stem) = name.strip_suffix(".json.new") {
                let live = self.dir.join(format!("{stem}.json"));
                if live.exists() {
                    None
                } else {
                    Some(path.clone())
                }
            } else {
                None
            };
            let Some(candidate) = candidate else { continue };

            match Self::load_one(&candidate) {
                Ok(job) => {
                    let name = job.job_name().to_string();
                    self.jobs
                        .write()
                        .insert(name.clone(), Arc::new(RwLock::new(job)));
                    debug!(job = name, "restored job checkpoint");
                }
                Err(e) => {
                    warn!(path = %candidate.display(), error = %e, "discarding corrupt job checkpoint");
                    self.alarms.raise(
                        AlarmKind::CheckpointFail,
                        "",
                        &format!("discarding corrupt checkpoint {}: {e}", candidate.display()),
                        b"",
                    );
                }
            }
        }
        Ok(())
    }

    fn load_one(path: &Path) -> Result<JobCheckpoint, AgentError> {
        let bytes = fs::read(path)?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| AgentError::checkpoint_corrupt(e.to_string()))?;
        JobCheckpoint::from_json(&value)
    }

    fn job_path(&self, job: &str) -> PathBuf {
        let sanitized: String = job
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{sanitized}.json"))
    }
}

fn new_path(live: &Path) -> PathBuf {
    let mut os = live.as_os_str().to_os_string();
    os.push(".new");
    PathBuf::from(os)
}
