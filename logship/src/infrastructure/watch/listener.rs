// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File-System Event Listener
//!
//! Wraps a `notify` watcher into the event shape the discovery layer
//! consumes: watched-directory id, basename, event kind, rename cookie,
//! and a directory flag. Directories are watched non-recursively and
//! registered in an id table, mirroring the kernel watch-descriptor model.
//!
//! On platforms without native notifications the `notify` poll backend
//! stands in transparently. Backend overflow surfaces as a rescan request:
//! the listener raises an operational alarm and emits a `Rescan` event so
//! discovery resynchronises the affected directories: never a silent
//! drop. Partial kernel reads are handled inside the backend; no event
//! straddles a read boundary by the time it reaches this API.

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use logship_domain::AgentError;

use crate::infrastructure::alarms::{AlarmKind, AlarmSink};

/// What happened to one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Modify,
    Delete,
    MoveFrom,
    MoveTo,
    /// Backend lost events; re-scan the directory.
    Rescan,
}

/// One change event in a watched directory.
#[derive(Debug, Clone)]
pub struct FsEvent {
    /// Registered id of the watched directory.
    pub dir_id: u64,
    /// The watched directory path.
    pub dir: PathBuf,
    /// Entry name within the directory; empty for `Rescan`.
    pub name: String,
    pub kind: FsEventKind,
    /// Pairs `MoveFrom`/`MoveTo` of one atomic rename.
    pub cookie: Option<usize>,
    pub is_dir: bool,
}

struct DirRegistry {
    by_path: HashMap<PathBuf, u64>,
    by_id: HashMap<u64, PathBuf>,
    next_id: u64,
}

/// OS-agnostic directory watcher producing a single event stream.
pub struct FsEventListener {
    watcher: Mutex<RecommendedWatcher>,
    dirs: Arc<RwLock<DirRegistry>>,
}

impl FsEventListener {
    /// Creates the listener and its bounded event stream.
    pub fn new(
        capacity: usize,
        alarms: Arc<AlarmSink>,
    ) -> Result<(Self, mpsc::Receiver<FsEvent>), AgentError> {
        let (tx, rx) = mpsc::channel(capacity);
        let dirs = Arc::new(RwLock::new(DirRegistry {
            by_path: HashMap::new(),
            by_id: HashMap::new(),
            next_id: 1,
        }));

        let callback_dirs = Arc::clone(&dirs);
        let watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
            match result {
                Ok(event) => {
                    for mapped in map_event(&event, &callback_dirs) {
                        // Blocking send is the back-pressure point: the
                        // notify thread waits rather than dropping.
                        if tx.blocking_send(mapped).is_err() {
                            return; // receiver gone; agent is shutting down
                        }
                    }
                }
                Err(error) => {
                    warn!(error = %error, "watcher backend error");
                    alarms.raise(
                        AlarmKind::WatcherOverflow,
                        "",
                        &format!("watcher backend error: {error}"),
                        b"",
                    );
                }
            }
        })
        .map_err(|e| AgentError::WatcherError(e.to_string()))?;

        Ok((
            Self {
                watcher: Mutex::new(watcher),
                dirs,
            },
            rx,
        ))
    }

    /// Registers `dir` and starts watching it (non-recursive). Returns the
    /// directory id; re-adding an already watched directory is a no-op.
    pub fn add_watch(&self, dir: &Path) -> Result<u64, AgentError> {
        if let Some(id) = self.dirs.read().by_path.get(dir) {
            return Ok(*id);
        }
        self.watcher
            .lock()
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| AgentError::WatcherError(format!("watch {}: {e}", dir.display())))?;
        let mut dirs = self.dirs.write();
        let id = dirs.next_id;
        dirs.next_id += 1;
        dirs.by_path.insert(dir.to_path_buf(), id);
        dirs.by_id.insert(id, dir.to_path_buf());
        debug!(dir = %dir.display(), id, "watching directory");
        Ok(id)
    }

    /// Stops watching `dir` and forgets its id.
    pub fn remove_watch(&self, dir: &Path) -> Result<(), AgentError> {
        let removed = {
            let mut dirs = self.dirs.write();
            match dirs.by_path.remove(dir) {
                Some(id) => {
                    dirs.by_id.remove(&id);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.watcher
                .lock()
                .unwatch(dir)
                .map_err(|e| AgentError::WatcherError(format!("unwatch {}: {e}", dir.display())))?;
        }
        Ok(())
    }

    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.dirs.read().by_path.keys().cloned().collect()
    }
}

/// Maps one notify event onto our event shape; an event touching N paths
/// yields up to N events.
fn map_event(event: &Event, dirs: &RwLock<DirRegistry>) -> Vec<FsEvent> {
    let registry = dirs.read();
    let mut out = Vec::new();

    if event.need_rescan() {
        for (path, id) in &registry.by_path {
            out.push(FsEvent {
                dir_id: *id,
                dir: path.clone(),
                name: String::new(),
                kind: FsEventKind::Rescan,
                cookie: None,
                is_dir: true,
            });
        }
        return out;
    }

    let cookie = event.attrs.tracker();
    let kinds: Vec<FsEventKind> = match &event.kind {
        EventKind::Create(_) => vec![FsEventKind::Create],
        EventKind::Remove(_) => vec![FsEventKind::Delete],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![FsEventKind::MoveFrom],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![FsEventKind::MoveTo],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            vec![FsEventKind::MoveFrom, FsEventKind::MoveTo]
        }
        EventKind::Modify(_) => vec![FsEventKind::Modify],
        _ => return out,
    };

    for (i, path) in event.paths.iter().enumerate() {
        let kind = if kinds.len() == event.paths.len() {
            kinds[i]
        } else {
            kinds[0]
        };
        let Some(parent) = path.parent() else { continue };
        let Some(id) = registry.by_path.get(parent) else {
            continue; // not one of ours
        };
        let is_dir = match &event.kind {
            EventKind::Create(CreateKind::Folder) => true,
            EventKind::Create(CreateKind::File) => false,
            _ => path.is_dir(),
        };
        out.push(FsEvent {
            dir_id: *id,
            dir: parent.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            kind,
            cookie,
            is_dir,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn recv_until(
        rx: &mut mpsc::Receiver<FsEvent>,
        pred: impl Fn(&FsEvent) -> bool,
    ) -> Option<FsEvent> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) if pred(&event) => return Some(event),
                Ok(Some(_)) => continue,
                _ => return None,
            }
        }
    }

    #[tokio::test]
    async fn test_create_event_carries_dir_id_and_basename() {
        let dir = TempDir::new().unwrap();
        let (listener, mut rx) = FsEventListener::new(64, AlarmSink::new()).unwrap();
        let id = listener.add_watch(dir.path()).unwrap();

        std::fs::write(dir.path().join("app.log"), b"x").unwrap();

        let event = recv_until(&mut rx, |e| e.name == "app.log")
            .await
            .expect("expected an event for app.log");
        assert_eq!(event.dir_id, id);
        assert_eq!(event.dir, dir.path());
        assert!(matches!(
            event.kind,
            FsEventKind::Create | FsEventKind::Modify
        ));
        assert!(!event.is_dir);
    }

    #[tokio::test]
    async fn test_rename_produces_move_pair() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.log"), b"x").unwrap();
        let (listener, mut rx) = FsEventListener::new(64, AlarmSink::new()).unwrap();
        listener.add_watch(dir.path()).unwrap();

        std::fs::rename(dir.path().join("a.log"), dir.path().join("b.log")).unwrap();

        let from = recv_until(&mut rx, |e| e.kind == FsEventKind::MoveFrom).await;
        let to = recv_until(&mut rx, |e| e.kind == FsEventKind::MoveTo).await;
        // Some backends report Rename(Both) in one event, some in two;
        // either way both halves must arrive with matching names.
        assert_eq!(from.map(|e| e.name), Some("a.log".to_string()));
        assert_eq!(to.map(|e| e.name), Some("b.log".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_watch_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (listener, _rx) = FsEventListener::new(8, AlarmSink::new()).unwrap();
        let a = listener.add_watch(dir.path()).unwrap();
        let b = listener.add_watch(dir.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(listener.watched_dirs().len(), 1);
    }
}
