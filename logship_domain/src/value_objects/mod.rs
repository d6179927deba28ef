// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Value Objects
//!
//! Immutable domain concepts defined entirely by their attributes:
//!
//! - [`DevInode`]: device + inode file identity, stable across renames
//! - [`FileFingerprint`]: identity plus content signature, distinguishing
//!   rotation from truncation from no-op renames
//! - [`SourceBuffer`] / [`StrSpan`]: the per-group byte arena and the index
//!   handles events use instead of owned strings
//! - [`QueueKey`]: the stable ordering/draining key of sender queues
//! - [`TagKey`] / [`TagScheme`]: the fixed semantic tag vocabulary in its
//!   legacy and modern renderings

mod dev_inode;
mod fingerprint;
mod queue_key;
mod source_buffer;
mod tag_key;

pub use dev_inode::DevInode;
pub use fingerprint::{signature_hash, FileFingerprint, MAX_SIGNATURE_SIZE};
pub use queue_key::QueueKey;
pub use source_buffer::{SourceBuffer, StrSpan};
pub use tag_key::{TagKey, TagScheme};
