//! Scanner framework: the capability contract every scanner implements, the
//! shared context it reads, and the machinery for running it.
//!
//! This module provides:
//! - `Scanner` trait: identity, file patterns, priority, applicability, scan
//! - `ScanContext`: read-only project handle with memoized glob lookup
//! - `Applicability`: composable predicates over a context
//! - `TierEngine`: per-file structural parse with pattern fallback
//! - `ScanResult` / `ScanStatistics`: what a scanner hands back
//! - `ScannerRegistry`: id-keyed registry and scanner groups

mod applicability;
mod context;
pub mod groups;
mod registry;
mod result;
mod stats;
mod tiered;

pub use applicability::Applicability;
pub use context::{FileSet, ScanContext};
pub use registry::{is_applicable, ScannerRegistry};
pub use result::{Findings, ScanResult};
pub use stats::{ScanStatistics, ScanStatisticsBuilder, MAX_TOP_ERRORS};
pub use tiered::{
    no_fallback, ConfidenceLevel, FallbackStrategy, FileOutcome, FileParseResult, TierEngine,
};

use std::path::PathBuf;
use thiserror::Error;

/// Scanner-level failures. File-level problems never surface as a `ScanError`;
/// they are absorbed by the tier engine and counted in statistics.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read project root {}: {reason}", path.display())]
    RootUnreadable { path: PathBuf, reason: String },

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("scanner '{0}' is already registered")]
    DuplicateScanner(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Precondition(String),
}

/// A pluggable, stateless extractor of architecture facts for one technology.
///
/// Implementations hold no per-scan state: anything a scan accumulates
/// (dedup sets, statistics builders) lives inside a single `scan` call.
pub trait Scanner: Send + Sync {
    /// Stable unique identifier, e.g. `"flask-routes"`.
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Language tags, e.g. `["python"]`.
    fn supported_languages(&self) -> &'static [&'static str];

    /// Root-relative glob patterns of the files this scanner reads.
    fn supported_file_patterns(&self) -> &'static [&'static str];

    /// Lower runs first. Scanners sharing a priority form one stage.
    fn priority(&self) -> i32;

    /// Predicate deciding whether this scanner is relevant for a project.
    ///
    /// Defaults to "at least one file matches a supported pattern".
    fn applicability(&self) -> Applicability {
        Applicability::has_any_files(self.supported_file_patterns())
    }

    fn applies_to(&self, ctx: &ScanContext) -> bool {
        self.applicability().test(ctx)
    }

    /// Run the scan. Never panics on malformed input; precondition failures
    /// are reported with [`ScanResult::failed`].
    fn scan(&self, ctx: &ScanContext) -> ScanResult;
}
