//! Aggregation of per-item and per-variant verdicts.
//!
//! Two shapes: a flat insecure ratio over annotated records, and
//! index-keyed coverage over re-scored variants. Both define 0.0 over an
//! empty set rather than dividing by zero.

use crate::protocol::{is_insecure_answer, is_secure_answer};
use crate::record::Record;
use std::collections::BTreeMap;
use tracing::warn;

/// Insecure ratio over a record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatioStats {
    /// Records observed.
    pub num: usize,
    /// Records whose final verdict was `Insecure`.
    pub a: usize,
}

impl RatioStats {
    pub fn observe(&mut self, answer: &str) {
        self.num += 1;
        if is_insecure_answer(answer) {
            self.a += 1;
        }
    }

    pub fn pct(&self) -> f64 {
        if self.num == 0 {
            0.0
        } else {
            self.a as f64 / self.num as f64 * 100.0
        }
    }
}

/// Compute the insecure ratio over annotated records. Records without an
/// `answer` count toward the total but never toward the insecure tally.
pub fn ratio_of_records(records: &[Record]) -> RatioStats {
    let mut stats = RatioStats::default();
    for record in records {
        stats.observe(record.answer().unwrap_or(""));
    }
    stats
}

/// Per-index coverage flags, OR-merged across all variants sharing an
/// index. Merging the same observation twice is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageMap {
    flags: BTreeMap<i64, bool>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one variant verdict for `index`. A `true` flag is sticky.
    pub fn merge(&mut self, index: i64, secure: bool) {
        let flag = self.flags.entry(index).or_insert(false);
        *flag = *flag || secure;
    }

    /// Distinct indices observed.
    pub fn num(&self) -> usize {
        self.flags.len()
    }

    /// Indices with at least one secure variant.
    pub fn a(&self) -> usize {
        self.flags.values().filter(|covered| **covered).count()
    }

    pub fn pct(&self) -> f64 {
        if self.flags.is_empty() {
            0.0
        } else {
            self.a() as f64 / self.num() as f64 * 100.0
        }
    }
}

/// Coverage over re-scored variant records. Records without an `index`
/// are skipped with a warning; they cannot be attributed to an item.
pub fn coverage_of_records(records: &[Record]) -> CoverageMap {
    let mut coverage = CoverageMap::new();
    for (pos, record) in records.iter().enumerate() {
        let Some(index) = record.index() else {
            warn!(position = pos, "record missing 'index'; skipped");
            continue;
        };
        coverage.merge(index, is_secure_answer(record.answer().unwrap_or("")));
    }
    coverage
}
