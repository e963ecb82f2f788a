//! End-to-end scans of a polyglot fixture project.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use archscan::model::{MergeInput, RelationshipType};
use archscan::scanners::FlaskScanner;
use archscan::{
    cli, Applicability, ArchitectureModel, Orchestrator, ProjectConfig, ScanContext, ScanResult, Scanner,
    ScannerRegistry,
};
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/shop")
}

fn scan_fixture() -> archscan::ScanReport {
    archscan::scan(&fixture(), &ProjectConfig::default()).unwrap()
}

fn endpoint_pairs(model: &ArchitectureModel) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = model
        .api_endpoints
        .iter()
        .map(|e| (e.method.clone().unwrap_or_default(), e.path.clone()))
        .collect();
    pairs.sort();
    pairs
}

fn merge_inputs(results: &[ScanResult]) -> Vec<MergeInput> {
    let registry = ScannerRegistry::with_builtin();
    results
        .iter()
        .map(|r| {
            let priority = registry.get(&r.scanner_id).map(|s| s.priority()).unwrap_or(0);
            MergeInput::new(priority, r.clone())
        })
        .collect()
}

#[test]
fn test_applicable_scanners_run_and_succeed() {
    let report = scan_fixture();
    assert_eq!(report.project_name, "shop");
    assert!(!report.has_failures(), "failures: {:?}", report.failed_results().collect::<Vec<_>>());

    let mut ran: Vec<_> = report.results.iter().map(|r| r.scanner_id.as_str()).collect();
    ran.sort();
    assert_eq!(
        ran,
        vec![
            "flask-routes",
            "kafka-consumer",
            "maven-dependencies",
            "pip-poetry-dependencies",
            "spring-rest-api",
            "sql-migrations",
        ]
    );
    assert_eq!(report.quality.scanners_run, 6);
    assert_eq!(report.quality.scanners_failed, 0);
}

#[test]
fn test_results_are_in_stage_order() {
    let report = scan_fixture();
    let registry = ScannerRegistry::with_builtin();
    let priorities: Vec<i32> = report
        .results
        .iter()
        .map(|r| registry.get(&r.scanner_id).unwrap().priority())
        .collect();
    let mut sorted = priorities.clone();
    sorted.sort();
    assert_eq!(priorities, sorted);
}

#[test]
fn test_endpoints_from_spring_and_flask() {
    let report = scan_fixture();
    assert_eq!(
        endpoint_pairs(&report.model),
        vec![
            ("GET".to_string(), "/api/orders/{id}".to_string()),
            ("GET".to_string(), "/reports/daily".to_string()),
            ("POST".to_string(), "/api/orders".to_string()),
            ("POST".to_string(), "/reports".to_string()),
        ]
    );
}

#[test]
fn test_dependencies_from_manifests() {
    let report = scan_fixture();
    let artifacts: Vec<_> = report.model.dependencies.iter().map(|d| d.artifact_id.as_str()).collect();
    assert!(artifacts.contains(&"spring-boot-starter-web"));
    assert!(artifacts.contains(&"spring-kafka"));
    assert!(artifacts.contains(&"flask"));
    assert!(artifacts.contains(&"gunicorn"));

    let flask = report.model.dependencies.iter().find(|d| d.artifact_id == "flask").unwrap();
    assert_eq!(flask.version.as_deref(), Some("3.0.0"));
}

#[test]
fn test_entities_replayed_from_migrations() {
    let report = scan_fixture();
    let names: Vec<_> = report.model.data_entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["customers", "orders"]);

    let orders = &report.model.data_entities[1];
    assert_eq!(orders.primary_key.as_deref(), Some("id"));
    let customer_id = orders.fields.iter().find(|f| f.name == "customer_id").unwrap();
    assert_eq!(customer_id.references.as_deref(), Some("customers"));
    assert!(!customer_id.nullable);

    assert!(report.model.components.iter().any(|c| c.name == "shop database"));
}

#[test]
fn test_kafka_flows_and_topology() {
    let report = scan_fixture();
    let model = &report.model;

    let subscribed = model
        .message_flows
        .iter()
        .find(|f| f.topic == "payments.settled")
        .unwrap();
    assert!(subscribed.subscriber_component_id.is_some());
    assert_eq!(subscribed.message_type.as_deref(), Some("PaymentSettled"));

    let published = model.message_flows.iter().find(|f| f.topic == "orders.paid").unwrap();
    assert!(published.publisher_component_id.is_some());

    let kinds: Vec<_> = model.relationships.iter().map(|r| r.relationship_type).collect();
    assert!(kinds.contains(&RelationshipType::Publishes));
    assert!(kinds.contains(&RelationshipType::Subscribes));
}

#[test]
fn test_components_are_unique() {
    let report = scan_fixture();
    let mut ids: Vec<_> = report.model.components.iter().map(|c| c.id.as_str()).collect();
    let count = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), count);
}

#[test]
fn test_merge_ignores_result_order() {
    let report = scan_fixture();
    let mut reversed = report.results.clone();
    reversed.reverse();
    let mut rotated = report.results.clone();
    rotated.rotate_left(2);

    let model = ArchitectureModel::merge("shop", merge_inputs(&report.results));
    assert_eq!(model, report.model);
    assert_eq!(ArchitectureModel::merge("shop", merge_inputs(&reversed)), model);
    assert_eq!(ArchitectureModel::merge("shop", merge_inputs(&rotated)), model);
}

#[test]
fn test_merge_is_idempotent() {
    let report = scan_fixture();
    let mut doubled = report.results.clone();
    doubled.extend(report.results.iter().cloned());
    assert_eq!(ArchitectureModel::merge("shop", merge_inputs(&doubled)), report.model);
}

#[test]
fn test_sequential_matches_parallel() {
    let parallel = scan_fixture();
    let mut config = ProjectConfig::default();
    config.scan.parallel = false;
    let sequential = archscan::scan(&fixture(), &config).unwrap();
    assert_eq!(sequential.model, parallel.model);
    assert_eq!(sequential.quality, parallel.quality);
}

#[test]
fn test_quality_accounts_for_every_scanned_file() {
    let report = scan_fixture();
    let quality = &report.quality;
    assert_eq!(quality.total_files, 7);
    assert!(quality.files_analyzed > 0);
    assert!(quality.files_analyzed <= quality.total_files * quality.scanners_run);
    assert!(quality.findings_by_category.get("api_endpoints").copied().unwrap_or(0) >= 4);
}

#[test]
fn test_comment_only_migration_degrades_gracefully() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("db/migration");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("V1__noop.sql"), "-- nothing to see here\n").unwrap();

    let report = archscan::scan(temp.path(), &ProjectConfig::default()).unwrap();
    let sql = report.results.iter().find(|r| r.scanner_id == "sql-migrations").unwrap();
    assert!(sql.success);
    assert_eq!(sql.statistics.files_scanned, 1);
    assert_eq!(sql.statistics.files_parsed_with_fallback, 1);
    assert_eq!(sql.statistics.files_parsed_successfully, 0);
    assert_eq!(sql.statistics.files_failed, 0);
    assert!(report.model.data_entities.is_empty());
}

#[test]
fn test_flask_file_without_routes_is_still_counted() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("app.py"), "from flask import Flask\napp = Flask(__name__)\n").unwrap();

    let report = archscan::scan(temp.path(), &ProjectConfig::default()).unwrap();
    let flask = report.results.iter().find(|r| r.scanner_id == "flask-routes").unwrap();
    assert!(flask.success);
    assert_eq!(flask.statistics.files_scanned, 1);
    assert_eq!(flask.statistics.files_parsed_with_fallback, 1);
    assert!(report.model.api_endpoints.is_empty());
}

struct BrokenScanner;

impl Scanner for BrokenScanner {
    fn id(&self) -> &'static str {
        "broken"
    }

    fn display_name(&self) -> &'static str {
        "Always fails"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["python"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        &["**/*.py"]
    }

    fn priority(&self) -> i32 {
        5
    }

    fn applicability(&self) -> Applicability {
        Applicability::always()
    }

    fn scan(&self, _ctx: &ScanContext) -> ScanResult {
        ScanResult::failed(self.id(), vec!["manifest is corrupt".to_string()])
    }
}

#[test]
fn test_failed_scanner_does_not_change_the_model() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("app.py"),
        "from flask import Flask\napp = Flask(__name__)\n\n@app.get(\"/ping\")\ndef ping():\n    return \"pong\"\n",
    )
    .unwrap();
    let ctx = cli::build_context(temp.path(), &ProjectConfig::default()).unwrap();

    let flask_only = Orchestrator::new(vec![Arc::new(FlaskScanner::new())]).run(&ctx);
    let with_broken =
        Orchestrator::new(vec![Arc::new(BrokenScanner), Arc::new(FlaskScanner::new())]).run(&ctx);

    assert!(with_broken.has_failures());
    assert_eq!(with_broken.quality.scanners_failed, 1);
    assert_eq!(with_broken.model.api_endpoints, flask_only.model.api_endpoints);
    assert_eq!(with_broken.model.components, flask_only.model.components);
    assert!(with_broken.model.scanner_statistics.contains_key("broken"));
    assert!(with_broken
        .quality
        .gaps
        .iter()
        .any(|g| g.scanner_id == "broken" && g.message.contains("manifest is corrupt")));
}

#[test]
fn test_empty_project_yields_empty_model() {
    let temp = TempDir::new().unwrap();
    let report = archscan::scan(temp.path(), &ProjectConfig::default()).unwrap();
    assert!(report.results.is_empty());
    assert!(report.model.is_empty());
    assert!(!report.has_failures());
}
