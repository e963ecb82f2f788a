//! Command-line interface for archscan.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{self, ProjectConfig};
use crate::generator::{self, DiagramType, GeneratorConfig};
use crate::model::{ArchitectureModel, QualityReport};
use crate::orchestrator::Orchestrator;
use crate::report;
use crate::scanner::{ScanContext, ScannerRegistry};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Name of the saved scan report inside the output directory.
pub const REPORT_FILE: &str = "architecture.json";

/// Architecture extraction for polyglot repositories.
///
/// Archscan detects the technologies a project uses, extracts dependencies,
/// API endpoints, message flows and data entities, and renders them as
/// Mermaid diagrams and Markdown catalogs.
#[derive(Parser)]
#[command(name = "archscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a project and write architecture documentation
    Scan(ScanArgs),
    /// List scanners (optionally those applicable to a project) or generators
    List(ListArgs),
    /// Render diagrams from a saved scan report
    Generate(GenerateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Configuration file (default: auto-discover in the project root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show which scanners would run, without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Console output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,

    /// Output directory (overrides config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Per-scanner timeout in seconds (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Run scanners and files one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Only print results, do not write diagrams
    #[arg(long)]
    pub no_write: bool,
}

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Highlight the scanners applicable to this project
    pub path: Option<PathBuf>,

    /// List diagram generators instead of scanners
    #[arg(long)]
    pub generators: bool,
}

/// Arguments for the generate command.
#[derive(Args)]
pub struct GenerateArgs {
    /// Saved scan report or model (JSON)
    #[arg(short, long, default_value = "docs/architecture/architecture.json")]
    pub input: PathBuf,

    /// Diagram types to render (default: everything supported)
    #[arg(short = 't', long = "type")]
    pub types: Vec<String>,

    /// Generators to use (default: mermaid and markdown)
    #[arg(short, long)]
    pub generator: Vec<String>,

    /// Output directory (default: the input file's directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Build the scan context for a project from its configuration.
pub fn build_context(root: &Path, config: &ProjectConfig) -> anyhow::Result<ScanContext> {
    let ctx = ScanContext::with_excludes(root, &config.scan.exclude)?;
    let name = config.project_name_or(ctx.project_name());
    let mut settings = config.scanners.settings_as_strings();
    if !config.scan.parallel {
        settings.insert("scan.parallel".to_string(), "false".to_string());
    }
    Ok(ctx.with_project_name(name).with_settings(settings))
}

/// Render every configured diagram into `dir`, plus `index.md`.
pub fn write_diagrams(
    dir: &Path,
    model: &ArchitectureModel,
    quality: Option<&QualityReport>,
    generator_ids: &[String],
    diagrams: &[DiagramType],
    config: &GeneratorConfig,
    with_index: bool,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let rendered = generator::render_all(model, generator_ids, diagrams, config)?;
    let mut written = Vec::new();
    let mut names = Vec::new();
    for diagram in &rendered {
        let path = dir.join(diagram.file_name());
        fs::write(&path, &diagram.content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(file = %path.display(), "wrote diagram");
        names.push(diagram.file_name());
        written.push(path);
    }

    if with_index {
        let path = dir.join("index.md");
        fs::write(&path, generator::index_document(model, quality, &names))
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn parse_diagram_types(names: &[String]) -> anyhow::Result<Vec<DiagramType>> {
    names
        .iter()
        .map(|n| n.parse::<DiagramType>().map_err(anyhow::Error::from))
        .collect()
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs) -> anyhow::Result<i32> {
    let root = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    if !root.is_dir() {
        eprintln!("Error: {} is not a directory", root.display());
        return Ok(EXIT_ERROR);
    }

    let mut config = ProjectConfig::load_or_default(&root, args.config.as_deref());
    if let Some(timeout) = args.timeout {
        config.scan.timeout_secs = timeout;
    }
    if args.sequential {
        config.scan.parallel = false;
    }

    let ctx = build_context(&root, &config)?;
    let registry = ScannerRegistry::with_builtin();
    let orchestrator = Orchestrator::from_config(&registry, &config);

    if args.dry_run {
        let planned = orchestrator.plan(&ctx);
        match args.format {
            OutputFormat::Json => {
                let ids: Vec<_> = planned.iter().map(|s| s.id()).collect();
                println!("{}", serde_json::to_string_pretty(&ids)?);
            }
            OutputFormat::Pretty => report::write_plan(&root, &planned),
        }
        return Ok(EXIT_SUCCESS);
    }

    let scan = orchestrator.run(&ctx);

    let mut written = Vec::new();
    if !args.no_write {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| root.join(&config.output.directory));
        let diagrams = parse_diagram_types(&config.generators.diagrams)?;
        written = write_diagrams(
            &output,
            &scan.model,
            Some(&scan.quality),
            &config.generators.enabled,
            &diagrams,
            &GeneratorConfig::from_config(&config.generators),
            config.output.generate_index,
        )?;
        let report_path = output.join(REPORT_FILE);
        report::save_json(&scan, &report_path)?;
        written.push(report_path);
    }

    match args.format {
        OutputFormat::Json => report::write_json(&scan)?,
        OutputFormat::Pretty => report::write_pretty(&scan, &written),
    }

    if scan.has_failures() {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the list command.
pub fn run_list(args: &ListArgs) -> anyhow::Result<i32> {
    if args.generators {
        println!("Available generators:");
        println!();
        for generator in generator::builtin() {
            let types: Vec<_> = generator.supported_diagram_types().iter().map(|t| t.as_str()).collect();
            println!("  {:<10} {}", generator.id(), generator.display_name());
            println!("  {:<10} .{} - {}", "", generator.file_extension(), types.join(", "));
        }
        println!();
        return Ok(EXIT_SUCCESS);
    }

    let registry = ScannerRegistry::with_builtin();
    let scanners = registry.list();
    let Some(path) = &args.path else {
        report::write_scanner_list(&scanners, None);
        return Ok(EXIT_SUCCESS);
    };

    let root = match path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", path, e);
            return Ok(EXIT_ERROR);
        }
    };
    let config = ProjectConfig::load_or_default(&root, None);
    let ctx = build_context(&root, &config)?;
    let planned = Orchestrator::from_config(&registry, &config).plan(&ctx);
    let ids: Vec<&str> = planned.iter().map(|s| s.id()).collect();
    report::write_scanner_list(&scanners, Some(ids.as_slice()));
    Ok(EXIT_SUCCESS)
}

/// Run the generate command.
pub fn run_generate(args: &GenerateArgs) -> anyhow::Result<i32> {
    let (model, quality) = match report::load_model(&args.input) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("Run 'archscan scan' first to produce {}", REPORT_FILE);
            return Ok(EXIT_ERROR);
        }
    };

    let diagrams = match parse_diagram_types(&args.types) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let generators = if args.generator.is_empty() {
        ProjectConfig::default().generators.enabled
    } else {
        args.generator.clone()
    };
    let mut check = ProjectConfig::default();
    check.generators.enabled = generators.clone();
    check.generators.diagrams = args.types.clone();
    if let Err(e) = config::validate(&check) {
        eprintln!("Error: {}", e);
        return Ok(EXIT_ERROR);
    }

    let output = args.output.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let written = write_diagrams(
        &output,
        &model,
        quality.as_ref(),
        &generators,
        &diagrams,
        &GeneratorConfig::default(),
        args.types.is_empty(),
    )?;

    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(EXIT_SUCCESS)
}
