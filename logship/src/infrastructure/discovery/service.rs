// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Discovery Service
//!
//! Owns the live set of files-to-tail. Pipelines register their matchers
//! in load order; files are claimed by at most one pipeline unless the
//! later pipeline opts into multi-config claiming: on conflict the
//! first-loaded pipeline wins and the loser is alarmed. Change events and
//! rescans translate into reader-facing discovery events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::infrastructure::alarms::{AlarmKind, AlarmSink};
use crate::infrastructure::discovery::{scan, PathMatcher};
use crate::infrastructure::watch::{FsEvent, FsEventKind};

/// What the reader layer should do in response to discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A claimed file appeared (or was rediscovered); open a reader.
    FileAppeared { pipeline: String, path: PathBuf },
    /// A claimed file changed; tick its reader.
    FileModified { pipeline: String, path: PathBuf },
    /// A claimed path went away (delete or rename-from); the reader keeps
    /// its handle until EOF per rotation rules, but the claim is released.
    FileRemoved { pipeline: String, path: PathBuf },
    /// A directory entered scope; the listener should watch it.
    WatchDir(PathBuf),
}

struct MatcherEntry {
    pipeline: String,
    matcher: Arc<PathMatcher>,
    allow_multi: bool,
}

/// The live-file registry.
pub struct Discovery {
    // Load order matters: first registered wins conflicts.
    matchers: Vec<MatcherEntry>,
    claims: HashMap<PathBuf, Vec<String>>,
    alarms: Arc<AlarmSink>,
}

impl Discovery {
    pub fn new(alarms: Arc<AlarmSink>) -> Self {
        Self {
            matchers: Vec::new(),
            claims: HashMap::new(),
            alarms,
        }
    }

    /// Registers a pipeline's matcher at the end of the load order.
    pub fn register_pipeline(&mut self, pipeline: impl Into<String>, matcher: Arc<PathMatcher>, allow_multi: bool) {
        self.matchers.push(MatcherEntry {
            pipeline: pipeline.into(),
            matcher,
            allow_multi,
        });
    }

    /// Drops a pipeline's matcher and releases its claims.
    pub fn unregister_pipeline(&mut self, pipeline: &str) {
        self.matchers.retain(|entry| entry.pipeline != pipeline);
        for owners in self.claims.values_mut() {
            owners.retain(|owner| owner != pipeline);
        }
        self.claims.retain(|_, owners| !owners.is_empty());
        info!(pipeline, "unregistered pipeline from discovery");
    }

    /// Full scan of every matcher; used at startup and after overflow.
    pub fn initial_scan(&mut self) -> Vec<DiscoveryEvent> {
        let mut out = Vec::new();
        let scans: Vec<(Vec<PathBuf>, Vec<PathBuf>)> = self
            .matchers
            .iter()
            .map(|entry| scan(&entry.matcher))
            .collect();
        for (files, dirs) in scans {
            for dir in dirs {
                out.push(DiscoveryEvent::WatchDir(dir));
            }
            for file in files {
                out.extend(self.claim(&file));
            }
        }
        out.sort_by_key(|e| matches!(e, DiscoveryEvent::FileAppeared { .. }));
        out.dedup();
        out
    }

    /// Translates one fs event into discovery events.
    pub fn handle_event(&mut self, event: &FsEvent) -> Vec<DiscoveryEvent> {
        let path = event.dir.join(&event.name);
        match event.kind {
            FsEventKind::Rescan => self.rescan_dir(&event.dir),
            FsEventKind::Create | FsEventKind::MoveTo if event.is_dir => self.dir_appeared(&path),
            FsEventKind::Create | FsEventKind::MoveTo => self.claim(&path),
            FsEventKind::Modify => self
                .owners(&path)
                .into_iter()
                .map(|pipeline| DiscoveryEvent::FileModified {
                    pipeline,
                    path: path.clone(),
                })
                .collect(),
            FsEventKind::Delete | FsEventKind::MoveFrom => {
                let owners = self.claims.remove(&path).unwrap_or_default();
                owners
                    .into_iter()
                    .map(|pipeline| DiscoveryEvent::FileRemoved {
                        pipeline,
                        path: path.clone(),
                    })
                    .collect()
            }
        }
    }

    pub fn owners(&self, path: &Path) -> Vec<String> {
        self.claims.get(path).cloned().unwrap_or_default()
    }

    fn dir_appeared(&mut self, dir: &Path) -> Vec<DiscoveryEvent> {
        let in_scope = self.matchers.iter().any(|entry| entry.matcher.dir_in_scope(dir));
        if !in_scope {
            return Vec::new();
        }
        // A fresh directory may already contain files (e.g. moved in)
        let mut out = self.rescan_dir(dir);
        out.insert(0, DiscoveryEvent::WatchDir(dir.to_path_buf()));
        out.dedup();
        out
    }

    fn rescan_dir(&mut self, dir: &Path) -> Vec<DiscoveryEvent> {
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return out,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                out.extend(self.dir_appeared(&path));
            } else if !self.claims.contains_key(&path) {
                out.extend(self.claim(&path));
            }
        }
        out
    }

    /// Claims `path` for every entitled pipeline, alarming conflicts.
    fn claim(&mut self, path: &Path) -> Vec<DiscoveryEvent> {
        if self.claims.contains_key(path) {
            return Vec::new();
        }
        let matching: Vec<(usize, bool)> = self
            .matchers
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.matcher.matches(path))
            .map(|(i, entry)| (i, entry.allow_multi))
            .collect();
        if matching.is_empty() {
            return Vec::new();
        }

        let mut owners = vec![self.matchers[matching[0].0].pipeline.clone()];
        for (index, allow_multi) in &matching[1..] {
            let pipeline = &self.matchers[*index].pipeline;
            if *allow_multi {
                owners.push(pipeline.clone());
            } else {
                debug!(
                    path = %path.display(),
                    winner = %owners[0],
                    loser = %pipeline,
                    "file already claimed by an earlier pipeline"
                );
                self.alarms.raise(
                    AlarmKind::MultiConfigConflict,
                    pipeline,
                    &format!(
                        "file {} already claimed by pipeline '{}'",
                        path.display(),
                        owners[0]
                    ),
                    b"",
                );
            }
        }

        self.claims.insert(path.to_path_buf(), owners.clone());
        owners
            .into_iter()
            .map(|pipeline| DiscoveryEvent::FileAppeared {
                pipeline,
                path: path.to_path_buf(),
            })
            .collect()
    }
}
