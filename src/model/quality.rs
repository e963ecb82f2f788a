//! Scan quality report: how much of the project was analyzed, at what
//! confidence, and where the scan degraded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scanner::{ConfidenceLevel, ScanResult};

/// Failure rate (percent) above which a scanner gets a warning.
pub const FAILURE_RATE_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GapSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for GapSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GapSeverity::Error => "ERROR",
            GapSeverity::Warning => "WARNING",
            GapSeverity::Info => "INFO",
        };
        f.write_str(s)
    }
}

/// A place where the scan is known to be incomplete or low quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGap {
    pub severity: GapSeverity,
    pub scanner_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Files in the project index.
    pub total_files: usize,
    /// Files scanned by successful scanners. Files read by several scanners
    /// count once per scanner.
    pub files_analyzed: usize,
    pub files_skipped: usize,
    /// Scanned files by the confidence of their parse (HIGH: tier 1,
    /// MEDIUM: tier 2, LOW: failed).
    pub files_by_confidence: BTreeMap<ConfidenceLevel, usize>,
    /// Finding counts per category.
    pub findings_by_category: BTreeMap<String, usize>,
    pub scanners_run: usize,
    pub scanners_failed: usize,
    pub gaps: Vec<QualityGap>,
}

impl QualityReport {
    /// Build the report from raw scanner results.
    pub fn calculate(total_files: usize, results: &[ScanResult]) -> Self {
        let files_analyzed: usize = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.statistics.files_scanned)
            .sum();

        let mut files_by_confidence = BTreeMap::new();
        for level in [ConfidenceLevel::High, ConfidenceLevel::Medium, ConfidenceLevel::Low] {
            files_by_confidence.insert(level, 0);
        }
        let mut findings_by_category = BTreeMap::new();

        for result in results.iter().filter(|r| r.success) {
            let stats = &result.statistics;
            *files_by_confidence.entry(ConfidenceLevel::High).or_insert(0) +=
                stats.files_parsed_successfully;
            *files_by_confidence.entry(ConfidenceLevel::Medium).or_insert(0) +=
                stats.files_parsed_with_fallback;
            *files_by_confidence.entry(ConfidenceLevel::Low).or_insert(0) += stats.files_failed;

            let f = &result.findings;
            for (category, count) in [
                ("components", f.components.len()),
                ("dependencies", f.dependencies.len()),
                ("api_endpoints", f.api_endpoints.len()),
                ("message_flows", f.message_flows.len()),
                ("data_entities", f.data_entities.len()),
                ("relationships", f.relationships.len()),
            ] {
                *findings_by_category.entry(category.to_string()).or_insert(0) += count;
            }
        }

        Self {
            total_files,
            files_analyzed,
            files_skipped: total_files.saturating_sub(files_analyzed),
            files_by_confidence,
            findings_by_category,
            scanners_run: results.len(),
            scanners_failed: results.iter().filter(|r| !r.success).count(),
            gaps: detect_gaps(results),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.gaps.iter().any(|g| g.severity == GapSeverity::Error)
    }
}

fn detect_gaps(results: &[ScanResult]) -> Vec<QualityGap> {
    let mut gaps = Vec::new();
    let mut sorted: Vec<&ScanResult> = results.iter().collect();
    sorted.sort_by(|a, b| a.scanner_id.cmp(&b.scanner_id));

    for result in sorted {
        let id = &result.scanner_id;
        let stats = &result.statistics;

        if !result.success {
            let reason = result
                .errors
                .first()
                .map(String::as_str)
                .unwrap_or("unknown error");
            gaps.push(QualityGap {
                severity: GapSeverity::Error,
                scanner_id: id.clone(),
                message: format!("Scanner failed: {}", reason),
            });
            continue;
        }

        if let Some(warning) = result.warnings.first() {
            gaps.push(QualityGap {
                severity: GapSeverity::Warning,
                scanner_id: id.clone(),
                message: warning.clone(),
            });
        }

        if stats.failure_rate() > FAILURE_RATE_THRESHOLD {
            gaps.push(QualityGap {
                severity: GapSeverity::Warning,
                scanner_id: id.clone(),
                message: format!(
                    "High parse failure rate: {:.1}% ({} of {} files)",
                    stats.failure_rate(),
                    stats.files_failed,
                    stats.files_scanned
                ),
            });
        }

        if stats.used_fallback() {
            gaps.push(QualityGap {
                severity: GapSeverity::Info,
                scanner_id: id.clone(),
                message: format!(
                    "{} file(s) parsed with fallback (reduced confidence)",
                    stats.files_parsed_with_fallback
                ),
            });
        }
    }

    gaps
}
