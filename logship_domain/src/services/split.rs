// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Record Splitting
//!
//! Converts a contiguous byte range into logical record byte ranges. Three
//! modes:
//!
//! - **Whole-line**: each newline terminates a record; a trailing partial
//!   line is held back across reads unless the caller asks for it.
//! - **Begin-pattern**: a record starts at the first line that fully matches
//!   the begin regex and ends just before the next matching line or at the
//!   end of the buffer. Lines before the first match are either discarded or
//!   emitted as one unmatched record, per `discard_unmatch`.
//! - **JSON**: a record is a brace-balanced top-level object; brace tracking
//!   respects quoted strings and backslash escapes. An invalid start is
//!   skipped to the next newline as garbage; a trailing partial object is
//!   held back.
//!
//! All functions return byte ranges relative to the input buffer; the reader
//! adds the file base offset when attributing positions to records. Bytes in
//! `discarded` ranges and a whole buffer without any begin match are alarm
//! conditions for the caller (rate-limited, carrying the first KiB).

use std::ops::Range;

use crate::error::AgentError;

/// Result of one split pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SplitRecords {
    /// Emitted record ranges, in buffer order.
    pub records: Vec<Range<usize>>,
    /// Ranges dropped as garbage or unmatched data.
    pub discarded: Vec<Range<usize>>,
    /// Bytes consumed; anything past this is held back to the next read.
    pub consumed: usize,
    /// Whether any begin pattern matched (always true in line/JSON modes
    /// when a record was produced).
    pub any_match: bool,
}

/// Compiles a begin pattern with full-line anchoring.
///
/// Begin patterns decide "does this *line* start a record", so they match
/// the entire line, not a substring of it.
pub fn compile_begin_pattern(pattern: &str) -> Result<regex::bytes::Regex, AgentError> {
    Ok(regex::bytes::Regex::new(&format!("^(?:{pattern})$"))?)
}

/// Whole-line mode.
///
/// `emit_trailing_partial` controls the bytes after the last newline: when
/// `false` they are held back (`consumed` stops at the newline), when `true`
/// they are emitted as a final record. Callers pass `true` on forced flushes
/// (EOF of a finite file, shutdown) and when the splitter is configured to
/// keep unmatched tails.
pub fn split_lines(buf: &[u8], emit_trailing_partial: bool) -> SplitRecords {
    let mut out = SplitRecords {
        any_match: true,
        ..Default::default()
    };
    let mut start = 0usize;
    for (i, byte) in buf.iter().enumerate() {
        if *byte == b'\n' {
            out.records.push(start..i);
            start = i + 1;
        }
    }
    out.consumed = start;
    if start < buf.len() && emit_trailing_partial {
        out.records.push(start..buf.len());
        out.consumed = buf.len();
    }
    out
}

/// Begin-pattern mode.
///
/// `begin` must come from [`compile_begin_pattern`]. The final accumulated
/// record is always emitted; the caller holds back trailing partial lines
/// before invoking the splitter, so the buffer always ends on a line
/// boundary except at forced flushes.
pub fn split_by_begin_pattern(
    buf: &[u8],
    begin: &regex::bytes::Regex,
    discard_unmatch: bool,
) -> SplitRecords {
    let mut out = SplitRecords::default();
    if buf.is_empty() {
        return out;
    }

    let mut seg_start = 0usize; // start of the accumulating record
    let mut started = false; // accumulating record began with a match
    let mut line_start = 0usize;
    let len = buf.len();

    let mut flush = |range: Range<usize>, started: bool, out: &mut SplitRecords| {
        if !started && discard_unmatch {
            out.discarded.push(range);
        } else {
            out.records.push(range);
        }
    };

    let mut i = 0usize;
    while i < len {
        if buf[i] == b'\n' || i == len - 1 {
            let line_end = if buf[i] == b'\n' { i } else { i + 1 };
            let line = &buf[line_start..line_end];
            if begin.is_match(line) {
                out.any_match = true;
                if seg_start < line_start {
                    // Exclude the newline separating the previous record
                    flush(seg_start..line_start - 1, started, &mut out);
                    seg_start = line_start;
                }
                started = true;
            }
            line_start = i + 1;
        }
        i += 1;
    }

    // Tail: everything from the last record boundary, minus a trailing
    // newline if the buffer ended on one.
    let tail_end = if len > 0 && buf[len - 1] == b'\n' {
        len - 1
    } else {
        len
    };
    if seg_start < tail_end || (started && seg_start <= tail_end) {
        flush(seg_start..tail_end, started, &mut out);
    }
    out.consumed = len;
    out
}

/// JSON mode.
///
/// `force` is the forced-flush flag: when set, a trailing partial object or
/// newline-less garbage is emitted/discarded instead of held back. A
/// brace-balanced object terminated by the end of the buffer counts as
/// complete even without `force`.
pub fn split_json_objects(buf: &[u8], force: bool) -> SplitRecords {
    let mut out = SplitRecords {
        any_match: true,
        ..Default::default()
    };
    let len = buf.len();
    let mut idx = 0usize;

    while idx < len {
        // Skip inter-record whitespace
        while idx < len && matches!(buf[idx], b' ' | b'\n' | b'\t' | b'\r' | 0) {
            idx += 1;
        }
        if idx >= len {
            break;
        }

        if buf[idx] != b'{' {
            // Garbage: skip to the next newline
            match buf[idx..].iter().position(|b| *b == b'\n') {
                Some(nl) => {
                    out.discarded.push(idx..idx + nl);
                    idx += nl + 1;
                    continue;
                }
                None if force => {
                    out.discarded.push(idx..len);
                    idx = len;
                    break;
                }
                None => {
                    // Hold back: a newline may still arrive
                    out.consumed = idx;
                    return out;
                }
            }
        }

        match scan_object(buf, idx) {
            ObjectScan::Complete(end) => {
                out.records.push(idx..end);
                idx = end;
            }
            ObjectScan::Unbalanced(bad_end) => {
                // Stray closing brace: garbage up to the next newline
                match buf[bad_end..].iter().position(|b| *b == b'\n') {
                    Some(nl) => {
                        out.discarded.push(idx..bad_end + nl);
                        idx = bad_end + nl + 1;
                    }
                    None => {
                        out.discarded.push(idx..len);
                        idx = len;
                    }
                }
            }
            ObjectScan::Partial => {
                if force {
                    out.records.push(idx..len);
                    idx = len;
                } else {
                    out.consumed = idx;
                    return out;
                }
            }
        }
    }
    out.consumed = idx;
    out
}

enum ObjectScan {
    /// Balanced object ending (exclusive) at the given index.
    Complete(usize),
    /// Depth went negative at the given index.
    Unbalanced(usize),
    /// Buffer ended before the object closed.
    Partial,
}

/// Scans one `{...}` object starting at `start` (which must be `{`),
/// respecting quoted strings and backslash escapes.
fn scan_object(buf: &[u8], start: usize) -> ObjectScan {
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut i = start;
    while i < buf.len() {
        match buf[i] {
            b'{' if !in_quote => depth += 1,
            b'}' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return ObjectScan::Complete(i + 1);
                }
                if depth < 0 {
                    return ObjectScan::Unbalanced(i);
                }
            }
            b'"' => in_quote = !in_quote,
            b'\\' => i += 1, // skip the escaped character
            _ => {}
        }
        i += 1;
    }
    ObjectScan::Partial
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(buf: &'a [u8], ranges: &[Range<usize>]) -> Vec<&'a str> {
        ranges
            .iter()
            .map(|r| std::str::from_utf8(&buf[r.clone()]).unwrap())
            .collect()
    }

    // Whole-line mode, trailing partial held vs emitted
    #[test]
    fn test_whole_line_trailing_partial() {
        let buf = b"line1\nline2";

        let kept = split_lines(buf, true);
        assert_eq!(texts(buf, &kept.records), vec!["line1", "line2"]);
        assert_eq!(kept.consumed, buf.len());

        let held = split_lines(buf, false);
        assert_eq!(texts(buf, &held.records), vec!["line1"]);
        assert_eq!(held.consumed, 6, "held-back tail stays unconsumed");
    }

    #[test]
    fn test_whole_line_empty_lines_are_records() {
        let buf = b"a\n\nb\n";
        let out = split_lines(buf, false);
        assert_eq!(texts(buf, &out.records), vec!["a", "", "b"]);
        assert_eq!(out.consumed, buf.len());
    }

    // Begin-pattern mode, discard unmatched prefix
    #[test]
    fn test_begin_pattern_discard_unmatch() {
        let buf = b"badline1\ncontinue\nline2\ncontinue";
        let begin = compile_begin_pattern("line.*").unwrap();
        let out = split_by_begin_pattern(buf, &begin, true);
        assert_eq!(texts(buf, &out.records), vec!["line2\ncontinue"]);
        assert_eq!(texts(buf, &out.discarded), vec!["badline1\ncontinue"]);
        assert!(out.any_match);
    }

    // Begin-pattern mode, keep unmatched prefix
    #[test]
    fn test_begin_pattern_keep_unmatch() {
        let buf = b"badline1\ncontinue\nline2\ncontinue";
        let begin = compile_begin_pattern("line.*").unwrap();
        let out = split_by_begin_pattern(buf, &begin, false);
        assert_eq!(
            texts(buf, &out.records),
            vec!["badline1\ncontinue", "line2\ncontinue"]
        );
        assert!(out.discarded.is_empty());
    }

    #[test]
    fn test_begin_pattern_multiple_records() {
        let buf = b"line1\n  at foo\n  at bar\nline2\n  at baz\n";
        let begin = compile_begin_pattern("line.*").unwrap();
        let out = split_by_begin_pattern(buf, &begin, true);
        assert_eq!(
            texts(buf, &out.records),
            vec!["line1\n  at foo\n  at bar", "line2\n  at baz"]
        );
    }

    #[test]
    fn test_begin_pattern_nothing_matches() {
        let buf = b"alpha\nbeta\n";
        let begin = compile_begin_pattern("line.*").unwrap();

        let discard = split_by_begin_pattern(buf, &begin, true);
        assert!(discard.records.is_empty());
        assert_eq!(texts(buf, &discard.discarded), vec!["alpha\nbeta"]);
        assert!(!discard.any_match, "whole-buffer miss is the alarm signal");

        let keep = split_by_begin_pattern(buf, &begin, false);
        assert_eq!(texts(buf, &keep.records), vec!["alpha\nbeta"]);
    }

    #[test]
    fn test_begin_pattern_is_full_line_match() {
        // "line" appears mid-line; a substring match would wrongly split
        let buf = b"x line1\nline2\n";
        let begin = compile_begin_pattern("line.*").unwrap();
        let out = split_by_begin_pattern(buf, &begin, true);
        assert_eq!(texts(buf, &out.records), vec!["line2"]);
        assert_eq!(texts(buf, &out.discarded), vec!["x line1"]);
    }

    // JSON mode: quoted brace must not close the object
    #[test]
    fn test_json_quoted_brace() {
        let buf = br#"{"a":1}
{"b":"x}y"}"#;
        let out = split_json_objects(buf, false);
        assert_eq!(texts(buf, &out.records), vec![r#"{"a":1}"#, r#"{"b":"x}y"}"#]);
        assert!(out.discarded.is_empty());
        assert_eq!(out.consumed, buf.len());
    }

    #[test]
    fn test_json_partial_object_held_back() {
        let buf = br#"{"a":1}
{"b": "unterminat"#;
        let out = split_json_objects(buf, false);
        assert_eq!(texts(buf, &out.records), vec![r#"{"a":1}"#]);
        assert_eq!(out.consumed, 8, "partial object stays unconsumed");

        let forced = split_json_objects(buf, true);
        assert_eq!(forced.records.len(), 2, "forced flush emits the tail raw");
        assert_eq!(forced.consumed, buf.len());
    }

    #[test]
    fn test_json_garbage_skipped_to_newline() {
        let buf = b"not json at all\n{\"ok\":true}\n";
        let out = split_json_objects(buf, false);
        assert_eq!(texts(buf, &out.records), vec![r#"{"ok":true}"#]);
        assert_eq!(texts(buf, &out.discarded), vec!["not json at all"]);
    }

    #[test]
    fn test_json_escaped_quote_inside_string() {
        let buf = br#"{"msg":"say \"hi\" {now}"}"#;
        let out = split_json_objects(buf, false);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0], 0..buf.len());
    }

    #[test]
    fn test_json_nested_objects() {
        let buf = br#"{"a":{"b":{"c":1}}}"#;
        let out = split_json_objects(buf, false);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0], 0..buf.len());
    }

    proptest::proptest! {
        /// The JSON splitter never panics, never over-consumes, and its
        /// ranges stay ordered and in bounds for arbitrary byte soup.
        #[test]
        fn prop_json_split_is_well_formed(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            for force in [false, true] {
                let out = split_json_objects(&bytes, force);
                proptest::prop_assert!(out.consumed <= bytes.len());
                for range in out.records.iter().chain(out.discarded.iter()) {
                    proptest::prop_assert!(range.end <= bytes.len());
                    proptest::prop_assert!(range.start <= range.end);
                }
                if force {
                    // A forced flush never holds anything back
                    proptest::prop_assert_eq!(out.consumed, bytes.len());
                }
            }
        }
    }
}
