// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Directory Scanner
//!
//! Depth-limited walk over a matcher's search origins, used at startup, on
//! watcher rescans, and when a new directory appears. Pruning happens at
//! directory granularity through `dir_in_scope`, so blacklisted or
//! out-of-depth subtrees are never entered.

use std::path::PathBuf;
use walkdir::WalkDir;

use crate::infrastructure::discovery::PathMatcher;

/// Scans every search origin of `matcher`, returning the matching files
/// and the in-scope directories (the set the listener should watch).
pub fn scan(matcher: &PathMatcher) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    for origin in matcher.search_origins() {
        let walker = WalkDir::new(&origin)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.file_type().is_dir() {
                    matcher.dir_in_scope(entry.path())
                } else {
                    true
                }
            });
        for entry in walker.flatten() {
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            } else if entry.file_type().is_file() && matcher.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    dirs.sort();
    dirs.dedup();
    (files, dirs)
}
