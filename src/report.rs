//! Output formatting for scan results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the full model plus per-scanner results, also the input format of
//!   `archscan generate`

use anyhow::Context;
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::{ArchitectureModel, GapSeverity, QualityReport};
use crate::orchestrator::ScanReport;
use crate::scanner::{ScanStatistics, Scanner};

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub project: String,
    pub root: String,
    pub duration_ms: u64,
    pub success: bool,
    pub model: ArchitectureModel,
    pub quality: QualityReport,
    pub scanners: Vec<JsonScanner>,
}

/// Per-scanner outcome. Findings live in the merged model.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonScanner {
    pub id: String,
    pub success: bool,
    pub findings: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub statistics: ScanStatistics,
}

impl JsonReport {
    pub fn from_scan(report: &ScanReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            project: report.project_name.clone(),
            root: report.root.display().to_string(),
            duration_ms: report.duration_ms as u64,
            success: !report.has_failures(),
            model: report.model.clone(),
            quality: report.quality.clone(),
            scanners: report
                .results
                .iter()
                .map(|r| JsonScanner {
                    id: r.scanner_id.clone(),
                    success: r.success,
                    findings: r.findings.len(),
                    warnings: r.warnings.clone(),
                    errors: r.errors.clone(),
                    statistics: r.statistics.clone(),
                })
                .collect(),
        }
    }
}

/// Write a scan report as JSON to stdout.
pub fn write_json(report: &ScanReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&JsonReport::from_scan(report))?;
    println!("{}", json);
    Ok(())
}

/// Write a scan report as JSON to `path`.
pub fn save_json(report: &ScanReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&JsonReport::from_scan(report))?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Read an architecture model from a JSON scan report or a bare model file,
/// together with the quality report when the file has one.
pub fn load_model(path: &Path) -> anyhow::Result<(ArchitectureModel, Option<QualityReport>)> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if let Ok(report) = serde_json::from_str::<JsonReport>(&content) {
        return Ok((report.model, Some(report.quality)));
    }
    let model: ArchitectureModel = serde_json::from_str(&content)
        .with_context(|| format!("{} is neither a scan report nor a model", path.display()))?;
    Ok((model, None))
}

// =============================================================================
// Pretty Format
// =============================================================================

fn write_header(label: &str, value: &str) {
    println!();
    print!("  ");
    print!("{}", "archscan".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
    print!("  {}", format!("{:<10}", label).dimmed());
    println!("{}", value);
    println!();
}

/// Write a scan report in pretty (human-readable) format.
pub fn write_pretty(report: &ScanReport, written: &[PathBuf]) {
    write_header("Scanning:", &report.root.display().to_string());
    print!("  {}", format!("{:<10}", "Project:").dimmed());
    println!("{}", report.project_name);
    println!();

    write_findings(&report.model);
    println!();

    write_scanners(report);
    println!();

    if !report.quality.gaps.is_empty() {
        write_gaps(&report.quality);
        println!();
    }

    if !written.is_empty() {
        println!("  {} ({}):", "Written".bold(), written.len());
        for path in written {
            println!("    {}", path.display().to_string().blue());
        }
        println!();
    }

    write_final_status(report);
    println!();
}

fn write_findings(model: &ArchitectureModel) {
    println!("  {}", "Findings:".bold());
    for (label, count) in [
        ("Components", model.components.len()),
        ("Dependencies", model.dependencies.len()),
        ("API endpoints", model.api_endpoints.len()),
        ("Message flows", model.message_flows.len()),
        ("Data entities", model.data_entities.len()),
        ("Relationships", model.relationships.len()),
    ] {
        let count = if count == 0 {
            count.to_string().dimmed()
        } else {
            count.to_string().normal()
        };
        println!("    {:<20} {:>5}", label, count);
    }
}

fn write_scanners(report: &ScanReport) {
    println!("  {} ({}):", "Scanners".bold(), report.results.len());
    println!();

    if report.results.is_empty() {
        println!("    {}", "no applicable scanners".dimmed());
        return;
    }

    for result in &report.results {
        if result.success {
            print!("    {} ", "OK  ".green());
        } else {
            print!("    {} ", "FAIL".red());
        }
        print!("{:<24}", result.scanner_id);
        println!("{}", result.statistics.summary().dimmed());
        for error in &result.errors {
            println!("            {}", error.red());
        }
        for warning in &result.warnings {
            println!("            {}", warning.yellow());
        }
    }
}

fn write_gaps(quality: &QualityReport) {
    println!("  {} ({}):", "Quality gaps".bold(), quality.gaps.len());
    for gap in &quality.gaps {
        match gap.severity {
            GapSeverity::Error => print!("    {} ", "ERROR".red()),
            GapSeverity::Warning => print!("    {} ", "WARN ".yellow()),
            GapSeverity::Info => print!("    {} ", "INFO ".blue()),
        }
        print!("{:<24}", gap.scanner_id.as_str().dimmed());
        println!("{}", gap.message);
    }
}

fn write_final_status(report: &ScanReport) {
    let quality = &report.quality;
    print!(
        "  {}",
        format!(
            "{} of {} files analyzed in {} ms",
            quality.files_analyzed, quality.total_files, report.duration_ms
        )
        .dimmed()
    );
    print!("  ");
    if report.has_failures() {
        print!("{}", format!("{} SCANNER(S) FAILED", quality.scanners_failed).red());
    } else {
        print!("{}", "COMPLETED".green());
    }
    println!();
}

/// Write the scanners a dry run would execute.
pub fn write_plan(root: &Path, planned: &[Arc<dyn Scanner>]) {
    write_header("Dry run:", &root.display().to_string());
    println!("  {} ({}):", "Would run".bold(), planned.len());
    for scanner in planned {
        println!(
            "    {:>4}  {:<24}{}",
            scanner.priority(),
            scanner.id(),
            scanner.display_name().dimmed()
        );
    }
    println!();
}

/// Write a scanner table. With `applicable`, scanners not in it are marked.
pub fn write_scanner_list(scanners: &[Arc<dyn Scanner>], applicable: Option<&[&str]>) {
    println!();
    println!(
        "  {}",
        format!("{:>4}  {:<24}{:<32}{}", "PRIO", "ID", "NAME", "LANGUAGES").bold()
    );
    for scanner in scanners {
        let line = format!(
            "{:>4}  {:<24}{:<32}{}",
            scanner.priority(),
            scanner.id(),
            scanner.display_name(),
            scanner.supported_languages().join(", ")
        );
        match applicable {
            Some(ids) if !ids.contains(&scanner.id()) => println!("  {}", line.dimmed()),
            Some(_) => println!("  {}", line.green()),
            None => println!("  {}", line),
        }
    }
    println!();
}
