// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Identity Value Object
//!
//! A file's identity is the pair `(device, inode)` on Unix-like systems, or
//! `(volume serial, file index)` on Windows; both fit the same two `u64`
//! fields. Identity is stable across renames within one volume, which makes
//! it the anchor for checkpointing: a rename changes the path but not the
//! identity, so the reader keeps its offset.
//!
//! The zero pair is reserved as the invalid identity. Retrieval from the
//! file system is an infrastructure concern; the domain only defines the
//! value and its equality/ordering semantics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved invalid device number.
pub const NO_BLOCK_DEV: u64 = 0;
/// Reserved invalid inode number.
pub const NO_BLOCK_INODE: u64 = 0;

/// Device + inode file identity.
///
/// Equality and hashing consider both fields; ordering is by device first,
/// then inode, so identities sort stably in dumps and test output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct DevInode {
    pub dev: u64,
    pub inode: u64,
}

impl DevInode {
    /// Creates an identity from raw device and inode numbers.
    pub fn new(dev: u64, inode: u64) -> Self {
        Self { dev, inode }
    }

    /// Returns `true` unless both fields are the reserved zero values.
    pub fn is_valid(&self) -> bool {
        !(self.dev == NO_BLOCK_DEV && self.inode == NO_BLOCK_INODE)
    }
}

impl fmt::Display for DevInode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.inode)
    }
}
