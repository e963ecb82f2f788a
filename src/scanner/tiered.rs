//! Three-tier per-file parsing.
//!
//! Every file a scanner reads goes through the same strategy:
//!
//! 1. **Pre-filter**: a cheap scanner-supplied predicate. Rejected files are
//!    skipped and do not count as scanned.
//! 2. **Tier 1**: the structural (tree-sitter) parser. If it yields at least one
//!    node the extractor runs and the file counts as parsed successfully, even
//!    when the extractor finds nothing.
//! 3. **Tier 2**: the pattern-based fallback over the raw text. Returning
//!    normally counts as a fallback parse, with or without results. An error
//!    marks the file failed.
//!
//! A single file never turns into a scan-level error: read failures, parser
//! rejections, fallback errors and panics inside plugin code all degrade to
//! counters in the [`ScanStatisticsBuilder`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use super::{FileSet, ScanContext, ScanStatisticsBuilder};
use crate::parser::{AstNode, StructuralParser};

/// How much a finding can be trusted, by the tier that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    /// Structural (AST) parse.
    High,
    /// Regex fallback.
    Medium,
    /// Heuristic or degraded.
    Low,
}

impl ConfidenceLevel {
    pub fn weight(&self) -> f64 {
        match self {
            ConfidenceLevel::High => 1.0,
            ConfidenceLevel::Medium => 0.7,
            ConfidenceLevel::Low => 0.4,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "AST-based",
            ConfidenceLevel::Medium => "Regex-based",
            ConfidenceLevel::Low => "Heuristic-based",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
        };
        f.write_str(name)
    }
}

/// Terminal state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Rejected by the pre-filter.
    Skipped,
    /// Parsed by tier 1.
    Structural,
    /// Parsed by tier 2.
    Fallback,
    /// Every tier failed.
    Failed,
}

/// Result of running the tiers on one file.
#[derive(Debug, Clone)]
pub struct FileParseResult<R> {
    pub file: PathBuf,
    pub outcome: FileOutcome,
    pub data: Vec<R>,
}

impl<R> FileParseResult<R> {
    fn new(file: &Path, outcome: FileOutcome, data: Vec<R>) -> Self {
        Self {
            file: file.to_path_buf(),
            outcome,
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FileOutcome::Structural | FileOutcome::Fallback)
    }

    /// Confidence of the data, or `None` for skipped files.
    pub fn confidence(&self) -> Option<ConfidenceLevel> {
        match self.outcome {
            FileOutcome::Skipped => None,
            FileOutcome::Structural => Some(ConfidenceLevel::High),
            FileOutcome::Fallback => Some(ConfidenceLevel::Medium),
            FileOutcome::Failed => Some(ConfidenceLevel::Low),
        }
    }
}

/// Tier 2: pattern-based extraction over a file's raw text.
pub trait FallbackStrategy<R>: Send + Sync {
    fn parse(&self, file: &Path, content: &str) -> anyhow::Result<Vec<R>>;
}

impl<R, F> FallbackStrategy<R> for F
where
    F: Fn(&Path, &str) -> anyhow::Result<Vec<R>> + Send + Sync,
{
    fn parse(&self, file: &Path, content: &str) -> anyhow::Result<Vec<R>> {
        self(file, content)
    }
}

/// A fallback that never finds anything. Files the structural parser cannot
/// handle still count as (empty) tier 2 parses.
pub fn no_fallback<R>() -> impl FallbackStrategy<R> {
    |_: &Path, _: &str| -> anyhow::Result<Vec<R>> { Ok(Vec::new()) }
}

type Extractor<'a, R> = dyn Fn(&Path, &[AstNode]) -> Vec<R> + Send + Sync + 'a;
type PreFilter<'a> = dyn Fn(&Path) -> bool + Send + Sync + 'a;

/// Runs the tiers for one scanner.
///
/// The engine itself holds no counters; every call takes the builder to
/// record into, so one engine can serve many workers.
pub struct TierEngine<'a, R> {
    scanner_id: &'a str,
    parser: Option<&'a dyn StructuralParser>,
    extractor: Box<Extractor<'a, R>>,
    fallback: Box<dyn FallbackStrategy<R> + 'a>,
    pre_filter: Box<PreFilter<'a>>,
}

impl<'a, R: Send> TierEngine<'a, R> {
    /// Engine with a structural parser, an extractor turning nodes into
    /// findings and a fallback.
    pub fn new<E, F>(
        scanner_id: &'a str,
        parser: &'a dyn StructuralParser,
        extractor: E,
        fallback: F,
    ) -> Self
    where
        E: Fn(&Path, &[AstNode]) -> Vec<R> + Send + Sync + 'a,
        F: FallbackStrategy<R> + 'a,
    {
        Self {
            scanner_id,
            parser: Some(parser),
            extractor: Box::new(extractor),
            fallback: Box::new(fallback),
            pre_filter: Box::new(|_| true),
        }
    }

    /// Engine for scanners with only a pattern-based parser. Every file goes
    /// straight to tier 2.
    pub fn regex_only<F>(scanner_id: &'a str, parser: F) -> Self
    where
        F: FallbackStrategy<R> + 'a,
    {
        Self {
            scanner_id,
            parser: None,
            extractor: Box::new(|_, _| Vec::new()),
            fallback: Box::new(parser),
            pre_filter: Box::new(|_| true),
        }
    }

    /// Only files accepted by `filter` are parsed and counted as scanned.
    pub fn with_pre_filter<P>(mut self, filter: P) -> Self
    where
        P: Fn(&Path) -> bool + Send + Sync + 'a,
    {
        self.pre_filter = Box::new(filter);
        self
    }

    /// Run the tiers on one file, recording the outcome in `stats`.
    pub fn parse_with_fallback(
        &self,
        file: &Path,
        stats: &mut ScanStatisticsBuilder,
    ) -> FileParseResult<R> {
        let accepted = catch_unwind(AssertUnwindSafe(|| (self.pre_filter)(file))).unwrap_or(false);
        if !accepted {
            tracing::trace!(scanner = self.scanner_id, file = %file.display(), "skipped by pre-filter");
            return FileParseResult::new(file, FileOutcome::Skipped, Vec::new());
        }
        stats.increment_files_scanned();

        let bytes = match std::fs::read(file) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(scanner = self.scanner_id, file = %file.display(), error = %e, "failed to read file");
                None
            }
        };

        if let (Some(parser), Some(bytes)) = (self.parser, bytes.as_deref()) {
            if let Some(data) = self.structural(parser, file, bytes) {
                stats.increment_files_parsed_successfully();
                return FileParseResult::new(file, FileOutcome::Structural, data);
            }
        }

        let bytes = match bytes {
            Some(bytes) => bytes,
            None => {
                stats
                    .increment_files_failed()
                    .add_error("io", format!("{}: unreadable", file.display()));
                return FileParseResult::new(file, FileOutcome::Failed, Vec::new());
            }
        };

        let content = String::from_utf8_lossy(&bytes);
        match catch_unwind(AssertUnwindSafe(|| self.fallback.parse(file, &content))) {
            Ok(Ok(data)) => {
                stats.increment_files_parsed_with_fallback();
                FileParseResult::new(file, FileOutcome::Fallback, data)
            }
            Ok(Err(e)) => {
                tracing::warn!(scanner = self.scanner_id, file = %file.display(), error = %e, "fallback parsing failed");
                stats
                    .increment_files_failed()
                    .add_error("fallback", format!("{}: {}", file.display(), e));
                FileParseResult::new(file, FileOutcome::Failed, Vec::new())
            }
            Err(_) => {
                tracing::warn!(scanner = self.scanner_id, file = %file.display(), "fallback parser panicked");
                stats
                    .increment_files_failed()
                    .add_error("panic", format!("{}: fallback parser panicked", file.display()));
                FileParseResult::new(file, FileOutcome::Failed, Vec::new())
            }
        }
    }

    /// Tier 1. `None` means "fall through to tier 2".
    fn structural(&self, parser: &dyn StructuralParser, file: &Path, bytes: &[u8]) -> Option<Vec<R>> {
        let nodes = match catch_unwind(AssertUnwindSafe(|| parser.parse(bytes))) {
            Ok(Ok(nodes)) => nodes,
            Ok(Err(outcome)) => {
                tracing::debug!(scanner = self.scanner_id, file = %file.display(), %outcome, "structural parse declined");
                return None;
            }
            Err(_) => {
                tracing::warn!(scanner = self.scanner_id, file = %file.display(), "structural parser panicked");
                return None;
            }
        };
        if nodes.is_empty() {
            return None;
        }
        match catch_unwind(AssertUnwindSafe(|| (self.extractor)(file, &nodes))) {
            Ok(data) => Some(data),
            Err(_) => {
                tracing::warn!(scanner = self.scanner_id, file = %file.display(), "extractor panicked");
                None
            }
        }
    }

    /// Run the tiers on every file, in parallel unless `ctx` says otherwise.
    ///
    /// Each worker records into its own builder; the partial builders are
    /// merged in file order afterwards. Files not started before the context
    /// deadline are left out, so the returned statistics are partial in that
    /// case.
    pub fn parse_files(&self, ctx: &ScanContext, files: &FileSet) -> (Vec<R>, ScanStatisticsBuilder) {
        let sequential = ctx.setting("scan.parallel") == Some("false");
        let run = |file: &PathBuf| {
            if ctx.is_expired() {
                return None;
            }
            let mut stats = ScanStatisticsBuilder::new();
            let result = self.parse_with_fallback(file, &mut stats);
            Some((result.data, stats))
        };

        let partials: Vec<_> = if sequential {
            files.iter().map(run).collect()
        } else {
            files.as_slice().par_iter().map(run).collect()
        };

        let mut stats = ScanStatisticsBuilder::new();
        stats.files_discovered(files.len());
        let mut data = Vec::new();
        let mut abandoned = 0;
        for partial in partials {
            match partial {
                Some((items, worker_stats)) => {
                    data.extend(items);
                    stats.merge(worker_stats);
                }
                None => abandoned += 1,
            }
        }
        if abandoned > 0 {
            tracing::warn!(scanner = self.scanner_id, abandoned, "deadline reached before all files were parsed");
        }
        (data, stats)
    }
}
