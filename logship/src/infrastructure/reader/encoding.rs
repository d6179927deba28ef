// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Record Encoding Conversion
//!
//! UTF-8 is the native path and passes through untouched. GBK records are
//! converted per record, after splitting: newline bytes can never be GBK
//! trail bytes, so splitting raw GBK on `\n` is safe, and a partial
//! multi-byte sequence can only sit inside a held-back partial line -
//! which the reader keeps to the next tick anyway. Offsets therefore stay
//! raw file offsets throughout.

use std::borrow::Cow;

use logship_domain::entities::TextEncoding;

/// Converts one raw record to UTF-8 per the input's encoding. Invalid
/// sequences are replaced, never dropped.
pub fn decode_record(raw: &[u8], encoding: TextEncoding) -> Cow<'_, [u8]> {
    match encoding {
        TextEncoding::Utf8 => Cow::Borrowed(raw),
        TextEncoding::Gbk => {
            let (text, _, _) = encoding_rs::GBK.decode(raw);
            match text {
                Cow::Borrowed(_) => Cow::Borrowed(raw), // pure ASCII, no copy
                Cow::Owned(converted) => Cow::Owned(converted.into_bytes()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passes_through() {
        let raw = "plain utf-8 log line".as_bytes();
        assert!(matches!(decode_record(raw, TextEncoding::Utf8), Cow::Borrowed(_)));
    }

    #[test]
    fn test_gbk_is_converted() {
        // "日志" (log) in GBK
        let gbk: &[u8] = &[0xc8, 0xd5, 0xd6, 0xbe];
        let decoded = decode_record(gbk, TextEncoding::Gbk);
        assert_eq!(std::str::from_utf8(&decoded).unwrap(), "日志");
    }

    #[test]
    fn test_gbk_ascii_stays_borrowed() {
        let raw = b"ascii only";
        assert!(matches!(decode_record(raw, TextEncoding::Gbk), Cow::Borrowed(_)));
    }
}
