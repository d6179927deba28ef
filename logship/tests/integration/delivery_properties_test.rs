// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Property checks for the delivery guarantees: AIMD convergence and
//! recovery bounds of the limiter, and order preservation of the
//! splitters over arbitrary byte streams.

use proptest::prelude::*;
use std::time::Instant;

use logship::infrastructure::sender::{ConcurrencyLimiter, LimiterConfig};
use logship_domain::services::split::{compile_begin_pattern, split_by_begin_pattern, split_lines};

#[test]
fn test_limiter_reaches_floor_within_log_failures() {
    for max_allowed in [2u32, 8, 64, 1024] {
        let limiter = ConcurrencyLimiter::new(LimiterConfig {
            max_allowed,
            ..Default::default()
        });
        let now = Instant::now();
        let budget = (max_allowed as f64).log2().ceil() as u32 + 1;
        let mut used = 0;
        while limiter.current_allowed() > 1 {
            limiter.on_fail(now);
            used += 1;
            assert!(
                used <= budget,
                "max_allowed={max_allowed}: took more than {budget} failures"
            );
        }
    }
}

#[test]
fn test_limiter_recovers_within_max_minus_one_successes() {
    let limiter = ConcurrencyLimiter::new(LimiterConfig {
        max_allowed: 8,
        ..Default::default()
    });
    let now = Instant::now();
    for _ in 0..10 {
        limiter.on_fail(now);
    }
    assert_eq!(limiter.current_allowed(), 1);
    for _ in 0..7 {
        limiter.on_success();
    }
    assert_eq!(limiter.current_allowed(), 8);
}

proptest! {
    /// Whole-line splitting is a prefix-preserving mapping of the byte
    /// stream: records appear in buffer order, never overlap, and
    /// re-joining them with newlines reproduces the consumed prefix.
    #[test]
    fn prop_split_lines_is_prefix_preserving(chunks in proptest::collection::vec("[a-z ]{0,12}", 0..20)) {
        let buf: Vec<u8> = chunks.join("\n").into_bytes();
        let out = split_lines(&buf, true);

        let mut cursor = 0usize;
        for range in &out.records {
            prop_assert!(range.start >= cursor, "records out of order");
            prop_assert!(range.end <= buf.len());
            cursor = range.end;
        }

        prop_assert_eq!(out.consumed, buf.len(), "forced flush consumes everything");
        let joined: Vec<u8> = out
            .records
            .iter()
            .map(|r| &buf[r.clone()])
            .collect::<Vec<_>>()
            .join(&b"\n"[..]);
        let expected = buf.strip_suffix(b"\n").unwrap_or(&buf);
        prop_assert_eq!(&joined[..], expected);
    }

    /// Begin-pattern splitting never loses bytes: records plus discarded
    /// ranges cover the buffer in order (minus the separators between
    /// them).
    #[test]
    fn prop_begin_split_covers_buffer_in_order(lines in proptest::collection::vec("(REC|xx)[a-z]{0,6}", 1..16)) {
        let buf: Vec<u8> = lines.join("\n").into_bytes();
        let begin = compile_begin_pattern("REC.*").unwrap();

        for discard in [false, true] {
            let out = split_by_begin_pattern(&buf, &begin, discard);
            let mut all: Vec<std::ops::Range<usize>> = out
                .records
                .iter()
                .chain(out.discarded.iter())
                .cloned()
                .collect();
            all.sort_by_key(|r| r.start);

            let mut cursor = 0usize;
            let mut covered = 0usize;
            for range in &all {
                prop_assert!(range.start >= cursor, "ranges overlap");
                cursor = range.end;
                covered += range.len();
            }
            // Bytes not covered are exactly the newline separators
            let separators = all.len().saturating_sub(1);
            prop_assert!(covered + separators >= buf.len().saturating_sub(1),
                "lost bytes: covered {covered} + {separators} separators of {}", buf.len());

            if !discard {
                prop_assert!(out.discarded.is_empty(), "keep mode never discards");
            }
        }
    }
}
