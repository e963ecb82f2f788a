//! Scan, save the report, then re-render diagrams from it.

use std::fs;
use std::path::Path;

use archscan::cli::{self, GenerateArgs, EXIT_ERROR, EXIT_SUCCESS, REPORT_FILE};
use archscan::{report, DiagramType, GeneratorConfig, ProjectConfig};
use tempfile::TempDir;

fn scan_into(out: &Path) -> archscan::ScanReport {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/shop");
    let scan = archscan::scan(&root, &ProjectConfig::default()).unwrap();
    let config = ProjectConfig::default();
    cli::write_diagrams(
        out,
        &scan.model,
        Some(&scan.quality),
        &config.generators.enabled,
        &[],
        &GeneratorConfig::default(),
        true,
    )
    .unwrap();
    report::save_json(&scan, &out.join(REPORT_FILE)).unwrap();
    scan
}

#[test]
fn test_scan_writes_every_diagram_and_index() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("docs");
    scan_into(&out);

    for name in [
        "c4-context.md",
        "c4-container.md",
        "dependency-graph.md",
        "er-diagram.md",
        "message-flow.md",
        "sequence.md",
        "api-catalog.md",
        "data-catalog.md",
        "index.md",
        REPORT_FILE,
    ] {
        assert!(out.join(name).is_file(), "missing {}", name);
    }

    let er = fs::read_to_string(out.join("er-diagram.md")).unwrap();
    assert!(er.contains("```mermaid"));
    assert!(er.contains("CUSTOMERS ||--o{ ORDERS"));

    let catalog = fs::read_to_string(out.join("api-catalog.md")).unwrap();
    assert!(catalog.contains("/api/orders/{id}"));
    assert!(catalog.contains("/reports/daily"));

    let flows = fs::read_to_string(out.join("message-flow.md")).unwrap();
    assert!(flows.contains("payments.settled"));

    let index = fs::read_to_string(out.join("index.md")).unwrap();
    assert!(index.contains("[er-diagram](er-diagram.md)"));
}

#[test]
fn test_generate_renders_selected_types_from_report() {
    let temp = TempDir::new().unwrap();
    let scanned = temp.path().join("scanned");
    scan_into(&scanned);
    let out = temp.path().join("regenerated");

    let args = GenerateArgs {
        input: scanned.join(REPORT_FILE),
        types: vec!["er-diagram".to_string()],
        generator: Vec::new(),
        output: Some(out.clone()),
    };
    assert_eq!(cli::run_generate(&args).unwrap(), EXIT_SUCCESS);

    assert!(out.join("er-diagram.md").is_file());
    assert!(out.join("data-catalog.md").is_file());
    assert!(!out.join("index.md").exists());
    assert!(!out.join("c4-context.md").exists());

    let regenerated = fs::read_to_string(out.join("er-diagram.md")).unwrap();
    let original = fs::read_to_string(scanned.join("er-diagram.md")).unwrap();
    assert_eq!(regenerated, original);
}

#[test]
fn test_generate_rejects_unknown_type_and_generator() {
    let temp = TempDir::new().unwrap();
    scan_into(temp.path());
    let input = temp.path().join(REPORT_FILE);

    let bad_type = GenerateArgs {
        input: input.clone(),
        types: vec!["gantt".to_string()],
        generator: Vec::new(),
        output: None,
    };
    assert_eq!(cli::run_generate(&bad_type).unwrap(), EXIT_ERROR);

    let bad_generator = GenerateArgs {
        input,
        types: Vec::new(),
        generator: vec!["plantuml".to_string()],
        output: None,
    };
    assert_eq!(cli::run_generate(&bad_generator).unwrap(), EXIT_ERROR);
}

#[test]
fn test_generate_rejects_type_without_generator() {
    let temp = TempDir::new().unwrap();
    scan_into(&temp.path().join("scanned"));
    let input = temp.path().join("scanned").join(REPORT_FILE);
    let out = temp.path().join("out");

    let deployment = GenerateArgs {
        input: input.clone(),
        types: vec!["deployment".to_string()],
        generator: Vec::new(),
        output: Some(out.clone()),
    };
    assert_eq!(cli::run_generate(&deployment).unwrap(), EXIT_ERROR);

    let catalog_from_mermaid = GenerateArgs {
        input,
        types: vec!["api-catalog".to_string()],
        generator: vec!["mermaid".to_string()],
        output: Some(out.clone()),
    };
    assert_eq!(cli::run_generate(&catalog_from_mermaid).unwrap(), EXIT_ERROR);
    assert!(!out.exists());
}

#[test]
fn test_loaded_model_matches_scanned_model() {
    let temp = TempDir::new().unwrap();
    let scan = scan_into(temp.path());
    let (model, quality) = report::load_model(&temp.path().join(REPORT_FILE)).unwrap();
    assert_eq!(model, scan.model);
    assert_eq!(quality, Some(scan.quality));
}

#[test]
fn test_mermaid_only_selection() {
    let temp = TempDir::new().unwrap();
    let scan = archscan::scan(
        &Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/shop"),
        &ProjectConfig::default(),
    )
    .unwrap();
    let mermaid = vec!["mermaid".to_string()];
    let written = cli::write_diagrams(
        temp.path(),
        &scan.model,
        None,
        &mermaid,
        &[DiagramType::Sequence],
        &GeneratorConfig::default(),
        false,
    )
    .unwrap();
    assert_eq!(written, vec![temp.path().join("sequence.md")]);

    let sequence = fs::read_to_string(&written[0]).unwrap();
    assert!(sequence.contains("sequenceDiagram"));
    assert!(sequence.contains("POST /reports"));

    let err = cli::write_diagrams(
        &temp.path().join("catalog"),
        &scan.model,
        None,
        &mermaid,
        &[DiagramType::Sequence, DiagramType::ApiCatalog],
        &GeneratorConfig::default(),
        false,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("api-catalog"));
}
