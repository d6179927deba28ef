// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tailing Reader
//!
//! One reader per live file: an open handle, a held-back byte buffer, and
//! a position. Detects rotations by identity and content fingerprint,
//! converts foreign encodings, splits records, and advances the submitted
//! offset in the checkpoint store.

mod encoding;
mod file_meta;
mod tail_reader;

pub use encoding::decode_record;
pub use file_meta::{file_dev_inode, read_head};
pub use tail_reader::{RawRecord, TailReader, TailReaderConfig, TickResult};
