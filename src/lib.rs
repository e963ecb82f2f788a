//! Archscan - architecture extraction for polyglot repositories.
//!
//! Archscan walks a project, runs technology-specific scanners over it and
//! merges their findings into one [`ArchitectureModel`], which diagram
//! generators render as Mermaid diagrams and Markdown catalogs.
//!
//! # Architecture
//!
//! - `scanner`: scanner contract, scan context, applicability strategies,
//!   the tiered parsing engine, statistics and the scanner registry
//! - `parser`: structural (tree-sitter) parsers used by tier 1
//! - `scanners`: the built-in scanners
//! - `model`: finding types, deterministic ids, model merge, quality report
//! - `orchestrator`: staged, isolated scanner execution with timeouts
//! - `generator`: Mermaid and Markdown generators
//! - `config`: `archscan.yaml` project configuration
//! - `report`: Output formatting (pretty, JSON)
//!
//! # Adding a Scanner
//!
//! See `src/scanners/` for examples. Implement [`Scanner`], build a
//! [`TierEngine`] from a structural parser and a fallback, and add the
//! scanner to `scanners::builtin()`.

pub mod cli;
pub mod config;
pub mod generator;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod report;
pub mod scanner;
pub mod scanners;

pub use config::ProjectConfig;
pub use generator::{DiagramGenerator, DiagramType, GeneratedDiagram, GeneratorConfig, GeneratorError};
pub use model::{ArchitectureModel, QualityReport};
pub use orchestrator::{Orchestrator, ScanReport};
pub use scanner::{
    Applicability, ConfidenceLevel, FileSet, Findings, ScanContext, ScanError, ScanResult,
    ScanStatistics, Scanner, ScannerRegistry, TierEngine,
};

/// Scan a project with the built-in scanners and the given configuration.
pub fn scan(root: &std::path::Path, config: &ProjectConfig) -> anyhow::Result<ScanReport> {
    let ctx = cli::build_context(root, config)?;
    let registry = ScannerRegistry::with_builtin();
    Ok(Orchestrator::from_config(&registry, config).run(&ctx))
}
