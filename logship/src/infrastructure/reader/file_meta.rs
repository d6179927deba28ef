// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Metadata
//!
//! Retrieves the platform file identity and signature head bytes. Unix
//! reads `(dev, ino)` from metadata; Windows maps `(volume serial, file
//! index)` onto the same two `u64` fields.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use logship_domain::value_objects::MAX_SIGNATURE_SIZE;
use logship_domain::{AgentError, DevInode};

/// Identity of the file behind `path` (follows the final symlink, as the
/// open handle would).
pub fn file_dev_inode(path: &Path) -> Result<DevInode, AgentError> {
    let metadata = std::fs::metadata(path)?;
    Ok(metadata_dev_inode(&metadata))
}

/// Identity of an already-open handle.
pub fn handle_dev_inode(file: &File) -> Result<DevInode, AgentError> {
    let metadata = file.metadata()?;
    Ok(metadata_dev_inode(&metadata))
}

#[cfg(unix)]
fn metadata_dev_inode(metadata: &std::fs::Metadata) -> DevInode {
    use std::os::unix::fs::MetadataExt;
    DevInode::new(metadata.dev(), metadata.ino())
}

#[cfg(windows)]
fn metadata_dev_inode(metadata: &std::fs::Metadata) -> DevInode {
    use std::os::windows::fs::MetadataExt;
    DevInode::new(
        metadata.volume_serial_number().unwrap_or(0) as u64,
        metadata.file_index().unwrap_or(0),
    )
}

/// Reads the leading signature bytes (at most [`MAX_SIGNATURE_SIZE`]) of an
/// open handle, restoring the handle's position afterwards.
pub fn read_head(file: &mut File) -> Result<Vec<u8>, AgentError> {
    let position = file.stream_position()?;
    file.seek(SeekFrom::Start(0))?;
    let mut head = vec![0u8; MAX_SIGNATURE_SIZE as usize];
    let mut filled = 0usize;
    loop {
        let read = file.read(&mut head[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
        if filled == head.len() {
            break;
        }
    }
    head.truncate(filled);
    file.seek(SeekFrom::Start(position))?;
    Ok(head)
}
