//! Dotted version comparison.
//!
//! Package versions are free-form dotted strings (`1.2.3`, `1.6`,
//! `2.0.0-rc1`). The only selection policy in this crate is "highest
//! version wins within a major key" — there is no constraint solving and
//! versions are not required to be three-component semver.
//!
//! Comparison rules:
//! - Versions are split on `.` and compared segment by segment.
//! - Two numeric segments compare numerically (`1.10 > 1.9`).
//! - Two non-numeric segments compare as plain strings.
//! - A numeric segment outranks a non-numeric one, so `1.0.0 > 1.0.0-rc1`
//!   (the third segments are `0` and `0-rc1`).
//! - A missing segment loses to any present segment, so `1.2 < 1.2.0`.

use std::cmp::Ordering;

use itertools::{EitherOrBoth, Itertools};

/// Compare two dotted version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    for pair in a.split('.').zip_longest(b.split('.')) {
        let ord = match pair {
            EitherOrBoth::Both(x, y) => compare_segment(x, y),
            EitherOrBoth::Left(_) => Ordering::Greater,
            EitherOrBoth::Right(_) => Ordering::Less,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// True if `candidate` is strictly newer than `incumbent`.
///
/// Equal versions keep the incumbent, so the earliest-seen candidate wins
/// a tie.
pub fn is_newer(candidate: &str, incumbent: &str) -> bool {
    compare_versions(candidate, incumbent) == Ordering::Greater
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
