// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Fingerprint Value Object
//!
//! A fingerprint is `(identity, signature_size, signature_hash)`, where the
//! signature is a hash over the first `signature_size` bytes of the file
//! (at most [`MAX_SIGNATURE_SIZE`]). Comparing fingerprints classifies what
//! happened to a path between two observations:
//!
//! - same identity, same signature → the same file; keep reading at offset
//! - same identity, different signature → truncate-in-place; reset to 0
//! - different identity, known signature → rotation; the old handle is read
//!   to EOF before the new identity takes over
//! - different identity, unknown signature → a genuinely new file
//!
//! The signature hash is the first 8 bytes (little-endian) of the SHA-256
//! digest of the signature bytes. Files shorter than the signature size are
//! hashed over their full current length; the recorded `signature_size`
//! grows until it reaches the cap, and a signature comparison is only
//! meaningful over the shorter of the two recorded sizes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::value_objects::DevInode;

/// Signatures hash at most this many leading bytes.
pub const MAX_SIGNATURE_SIZE: u32 = 1024;

/// File identity plus content signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct FileFingerprint {
    pub dev_inode: DevInode,
    pub sig_size: u32,
    pub sig_hash: u64,
}

impl FileFingerprint {
    pub fn new(dev_inode: DevInode, sig_size: u32, sig_hash: u64) -> Self {
        Self {
            dev_inode,
            sig_size,
            sig_hash,
        }
    }

    /// Computes the fingerprint of `head`, the leading bytes of a file.
    ///
    /// Only the first [`MAX_SIGNATURE_SIZE`] bytes participate even when the
    /// caller hands over a longer slice.
    pub fn over(dev_inode: DevInode, head: &[u8]) -> Self {
        let take = head.len().min(MAX_SIGNATURE_SIZE as usize);
        Self {
            dev_inode,
            sig_size: take as u32,
            sig_hash: signature_hash(&head[..take]),
        }
    }

    /// Whether `head` still matches this fingerprint's recorded signature.
    ///
    /// The comparison re-hashes the first `sig_size` bytes of `head`; a file
    /// that has grown past the recorded size still matches as long as its
    /// prefix is unchanged. A file now shorter than the recorded signature
    /// cannot match (it was truncated).
    pub fn matches_content(&self, head: &[u8]) -> bool {
        let size = self.sig_size as usize;
        if head.len() < size {
            return false;
        }
        signature_hash(&head[..size]) == self.sig_hash
    }

    /// Same identity and same signature: the same file, byte for byte, as
    /// far as the signature can see.
    pub fn same_file(&self, other: &FileFingerprint) -> bool {
        self.dev_inode == other.dev_inode
            && self.sig_size == other.sig_size
            && self.sig_hash == other.sig_hash
    }
}

/// First 8 bytes of the SHA-256 digest, little-endian.
pub fn signature_hash(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_caps_at_limit() {
        let long = vec![7u8; 4096];
        let fp = FileFingerprint::over(DevInode::new(1, 2), &long);
        assert_eq!(fp.sig_size, MAX_SIGNATURE_SIZE);
        assert_eq!(fp.sig_hash, signature_hash(&long[..1024]));
    }

    #[test]
    fn test_short_file_uses_full_length() {
        let fp = FileFingerprint::over(DevInode::new(1, 2), b"hello");
        assert_eq!(fp.sig_size, 5);
        assert!(fp.matches_content(b"hello world"));
    }

    #[test]
    fn test_truncated_file_no_longer_matches() {
        let fp = FileFingerprint::over(DevInode::new(1, 2), b"some log line\n");
        assert!(!fp.matches_content(b"short"));
    }

    #[test]
    fn test_rewritten_prefix_changes_hash() {
        let a = FileFingerprint::over(DevInode::new(1, 2), b"generation-1 content");
        let b = FileFingerprint::over(DevInode::new(1, 2), b"generation-2 content");
        assert_eq!(a.dev_inode, b.dev_inode);
        assert_ne!(a.sig_hash, b.sig_hash);
        assert!(!a.same_file(&b));
    }
}
