//! Per-scanner parsing statistics.
//!
//! [`ScanStatistics`] is an immutable snapshot. It is produced once per scan by
//! a [`ScanStatisticsBuilder`], which is owned by a single file-processing unit
//! at a time; parallel units each get their own builder and the partial
//! builders are merged at the join point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of error details retained in `top_errors`.
pub const MAX_TOP_ERRORS: usize = 10;

/// Finalized parsing statistics for one scanner run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    /// Files matching the scanner's patterns.
    pub files_discovered: usize,
    /// Files that passed the pre-filter.
    pub files_scanned: usize,
    /// Files parsed by the structural (tier 1) parser.
    pub files_parsed_successfully: usize,
    /// Files parsed by the fallback (tier 2) parser.
    pub files_parsed_with_fallback: usize,
    /// Files for which every tier failed.
    pub files_failed: usize,
    /// Error occurrences keyed by error type.
    #[serde(default)]
    pub error_counts: BTreeMap<String, usize>,
    /// The first few error details, for diagnostics.
    #[serde(default)]
    pub top_errors: Vec<String>,
}

impl ScanStatistics {
    /// A zeroed snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Percentage of scanned files parsed by tier 1.
    pub fn success_rate(&self) -> f64 {
        percentage(self.files_parsed_successfully, self.files_scanned)
    }

    /// Percentage of scanned files parsed by tier 1 or tier 2.
    pub fn overall_parse_rate(&self) -> f64 {
        percentage(
            self.files_parsed_successfully + self.files_parsed_with_fallback,
            self.files_scanned,
        )
    }

    /// Percentage of scanned files that failed every tier.
    pub fn failure_rate(&self) -> f64 {
        percentage(self.files_failed, self.files_scanned)
    }

    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }

    pub fn used_fallback(&self) -> bool {
        self.files_parsed_with_fallback > 0
    }

    /// Sum two snapshots. Error details are concatenated up to [`MAX_TOP_ERRORS`].
    pub fn combine(&self, other: &ScanStatistics) -> ScanStatistics {
        let mut error_counts = self.error_counts.clone();
        for (kind, count) in &other.error_counts {
            *error_counts.entry(kind.clone()).or_insert(0) += count;
        }
        let top_errors = self
            .top_errors
            .iter()
            .chain(other.top_errors.iter())
            .take(MAX_TOP_ERRORS)
            .cloned()
            .collect();

        ScanStatistics {
            files_discovered: self.files_discovered + other.files_discovered,
            files_scanned: self.files_scanned + other.files_scanned,
            files_parsed_successfully: self.files_parsed_successfully
                + other.files_parsed_successfully,
            files_parsed_with_fallback: self.files_parsed_with_fallback
                + other.files_parsed_with_fallback,
            files_failed: self.files_failed + other.files_failed,
            error_counts,
            top_errors,
        }
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Discovered: {}, Scanned: {}, Success: {} ({:.1}%), Fallback: {}, Failed: {} ({:.1}%)",
            self.files_discovered,
            self.files_scanned,
            self.files_parsed_successfully,
            self.success_rate(),
            self.files_parsed_with_fallback,
            self.files_failed,
            self.failure_rate()
        )
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}

/// Mutable accumulator for [`ScanStatistics`].
#[derive(Debug, Clone, Default)]
pub struct ScanStatisticsBuilder {
    stats: ScanStatistics,
}

impl ScanStatisticsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_discovered(&mut self, count: usize) -> &mut Self {
        self.stats.files_discovered = count;
        self
    }

    pub fn increment_files_scanned(&mut self) -> &mut Self {
        self.stats.files_scanned += 1;
        self
    }

    pub fn increment_files_parsed_successfully(&mut self) -> &mut Self {
        self.stats.files_parsed_successfully += 1;
        self
    }

    pub fn increment_files_parsed_with_fallback(&mut self) -> &mut Self {
        self.stats.files_parsed_with_fallback += 1;
        self
    }

    pub fn increment_files_failed(&mut self) -> &mut Self {
        self.stats.files_failed += 1;
        self
    }

    /// Record an error occurrence; the detail is kept while fewer than
    /// [`MAX_TOP_ERRORS`] details have been recorded.
    pub fn add_error(&mut self, error_type: &str, detail: impl Into<String>) -> &mut Self {
        *self
            .stats
            .error_counts
            .entry(error_type.to_string())
            .or_insert(0) += 1;
        if self.stats.top_errors.len() < MAX_TOP_ERRORS {
            self.stats.top_errors.push(detail.into());
        }
        self
    }

    /// Fold a partial builder from another worker into this one.
    ///
    /// `files_discovered` is owned by the scanner, not the workers, so the
    /// larger of the two values is kept rather than summed.
    pub fn merge(&mut self, other: ScanStatisticsBuilder) -> &mut Self {
        let discovered = self.stats.files_discovered.max(other.stats.files_discovered);
        self.stats = self.stats.combine(&other.stats);
        self.stats.files_discovered = discovered;
        self
    }

    /// Current counters, without finalizing.
    pub fn peek(&self) -> &ScanStatistics {
        &self.stats
    }

    /// Finalize into an immutable snapshot.
    pub fn build(self) -> ScanStatistics {
        self.stats
    }
}
