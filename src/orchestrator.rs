//! Scan orchestration.
//!
//! Scanners run in stages, one stage per distinct priority, lowest first.
//! Every stage sees the results of the stages before it through
//! [`ScanContext::previous_results`], so framework scanners can gate on the
//! dependencies found by earlier ones. Within a stage, scanners run on their
//! own threads (or one after another when parallelism is off), each isolated:
//! a panic, a precondition failure or a timeout turns into a failed
//! [`ScanResult`] for that scanner and the scan continues.

use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{ProjectConfig, DEFAULT_TIMEOUT_SECS};
use crate::model::{ArchitectureModel, MergeInput, QualityReport};
use crate::scanner::{is_applicable, ScanContext, ScanResult, ScanStatistics, Scanner, ScannerRegistry};

/// Upper bound on how long a timed-out scanner gets to hand back its partial
/// statistics once its deadline has passed.
const MAX_GRACE: Duration = Duration::from_secs(2);

/// Everything produced by one orchestrated scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub project_name: String,
    pub root: PathBuf,
    pub model: ArchitectureModel,
    pub quality: QualityReport,
    /// Raw results in execution order.
    pub results: Vec<ScanResult>,
    pub duration_ms: u128,
}

impl ScanReport {
    pub fn failed_results(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_results().next().is_some()
    }
}

/// Runs a set of scanners against a project.
pub struct Orchestrator {
    scanners: Vec<Arc<dyn Scanner>>,
    timeout: Duration,
    parallel: bool,
}

impl Orchestrator {
    /// Orchestrator over the given scanners with default settings.
    pub fn new(scanners: Vec<Arc<dyn Scanner>>) -> Self {
        Self {
            scanners,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            parallel: true,
        }
    }

    /// Orchestrator over the scanners `config` selects from `registry`.
    pub fn from_config(registry: &ScannerRegistry, config: &ProjectConfig) -> Self {
        Self::new(registry.select(&config.scanners))
            .with_timeout(config.scan.timeout())
            .with_parallel(config.scan.parallel)
    }

    /// Per-scanner time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the scanners of a stage concurrently.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn scanners(&self) -> &[Arc<dyn Scanner>] {
        &self.scanners
    }

    /// Scanners grouped into stages: ascending priority, ids ascending
    /// within a stage.
    pub fn stages(&self) -> Vec<(i32, Vec<Arc<dyn Scanner>>)> {
        let mut stages: BTreeMap<i32, Vec<Arc<dyn Scanner>>> = BTreeMap::new();
        for scanner in &self.scanners {
            stages.entry(scanner.priority()).or_default().push(scanner.clone());
        }
        stages
            .into_iter()
            .map(|(priority, mut scanners)| {
                scanners.sort_by(|a, b| a.id().cmp(b.id()));
                (priority, scanners)
            })
            .collect()
    }

    /// Scanners that would run for `ctx`, without running any. Applicability
    /// predicates that depend on earlier results see none.
    pub fn plan(&self, ctx: &ScanContext) -> Vec<Arc<dyn Scanner>> {
        self.stages()
            .into_iter()
            .flat_map(|(_, scanners)| scanners)
            .filter(|s| is_applicable(s.as_ref(), ctx))
            .collect()
    }

    /// Run every applicable scanner and merge the results.
    pub fn run(&self, ctx: &ScanContext) -> ScanReport {
        let started = Instant::now();
        let mut previous: BTreeMap<String, ScanResult> = BTreeMap::new();
        let mut inputs: Vec<MergeInput> = Vec::new();
        let mut results: Vec<ScanResult> = Vec::new();

        for (priority, scanners) in self.stages() {
            let stage_ctx = ctx.with_previous_results(previous.clone());
            let applicable: Vec<_> = scanners
                .into_iter()
                .filter(|s| {
                    let applies = is_applicable(s.as_ref(), &stage_ctx);
                    if !applies {
                        tracing::debug!(scanner = s.id(), "not applicable");
                    }
                    applies
                })
                .collect();
            if applicable.is_empty() {
                continue;
            }
            tracing::info!(
                priority,
                scanners = %applicable.iter().map(|s| s.id()).collect::<Vec<_>>().join(", "),
                "running stage"
            );

            for result in self.run_stage(&stage_ctx, &applicable) {
                if !result.success {
                    tracing::warn!(scanner = %result.scanner_id, errors = ?result.errors, "scanner failed");
                }
                previous.insert(result.scanner_id.clone(), result.clone());
                inputs.push(MergeInput::new(priority, result.clone()));
                results.push(result);
            }
        }

        let total_files = ctx.total_files().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cannot count project files");
            0
        });
        let quality = QualityReport::calculate(total_files, &results);
        let model = ArchitectureModel::merge(ctx.project_name(), inputs);
        tracing::info!(
            scanners = results.len(),
            findings = model.finding_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );

        ScanReport {
            project_name: ctx.project_name().to_string(),
            root: ctx.root().to_path_buf(),
            model,
            quality,
            results,
            duration_ms: started.elapsed().as_millis(),
        }
    }

    /// Run one stage, returning results in the stage's scanner order.
    fn run_stage(&self, ctx: &ScanContext, scanners: &[Arc<dyn Scanner>]) -> Vec<ScanResult> {
        if self.parallel {
            let pending: Vec<_> = scanners
                .iter()
                .map(|scanner| {
                    let deadline = Instant::now() + self.timeout;
                    (scanner.clone(), deadline, spawn_scan(scanner.clone(), ctx.with_deadline(deadline)))
                })
                .collect();
            pending
                .into_iter()
                .map(|(scanner, deadline, rx)| self.await_result(scanner.id(), deadline, rx))
                .collect()
        } else {
            scanners
                .iter()
                .map(|scanner| {
                    let deadline = Instant::now() + self.timeout;
                    let rx = spawn_scan(scanner.clone(), ctx.with_deadline(deadline));
                    self.await_result(scanner.id(), deadline, rx)
                })
                .collect()
        }
    }

    fn await_result(&self, scanner_id: &str, deadline: Instant, rx: Receiver<ScanResult>) -> ScanResult {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Disconnected) => {
                return ScanResult::failed(scanner_id, vec!["scanner thread exited without a result".to_string()]);
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        // Past the deadline the tier engine stops starting new files, so a
        // well-behaved scanner returns shortly with partial statistics.
        let grace = (self.timeout / 10).min(MAX_GRACE);
        let partial = match rx.recv_timeout(grace) {
            Ok(late) => late.statistics,
            Err(_) => ScanStatistics::empty(),
        };
        tracing::warn!(scanner = scanner_id, timeout_secs = self.timeout.as_secs_f64(), "scanner timed out");
        ScanResult::timed_out(scanner_id, self.timeout, partial)
    }
}

/// Start `scanner` on its own thread. The receiver yields exactly one result
/// unless the thread could not be started.
fn spawn_scan(scanner: Arc<dyn Scanner>, ctx: ScanContext) -> Receiver<ScanResult> {
    let (tx, rx) = mpsc::channel();
    let id = scanner.id();
    let spawned = thread::Builder::new()
        .name(format!("scan-{}", id))
        .spawn(move || {
            let result = run_isolated(scanner.as_ref(), &ctx);
            // The orchestrator may have given up on us already.
            let _ = tx.send(result);
        });
    if let Err(e) = spawned {
        tracing::error!(scanner = id, error = %e, "failed to start scanner thread");
    }
    rx
}

/// Run a scanner, converting a panic into a failed result.
pub fn run_isolated(scanner: &dyn Scanner, ctx: &ScanContext) -> ScanResult {
    let id = scanner.id();
    tracing::debug!(scanner = id, "scanning");
    match catch_unwind(AssertUnwindSafe(|| scanner.scan(ctx))) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(scanner = id, panic = %message, "scanner panicked");
            ScanResult::failed(id, vec![format!("scanner panicked: {}", message)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, ComponentType, Dependency};
    use crate::scanner::{Applicability, Findings, TierEngine};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Configurable test scanner.
    struct Stub {
        id: &'static str,
        priority: i32,
        applicability: fn() -> Applicability,
        behavior: fn(&ScanContext) -> ScanResult,
    }

    impl Scanner for Stub {
        fn id(&self) -> &'static str {
            self.id
        }
        fn display_name(&self) -> &'static str {
            "Stub"
        }
        fn supported_languages(&self) -> &'static [&'static str] {
            &["text"]
        }
        fn supported_file_patterns(&self) -> &'static [&'static str] {
            &["**/*.txt"]
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn applicability(&self) -> Applicability {
            (self.applicability)()
        }
        fn scan(&self, ctx: &ScanContext) -> ScanResult {
            (self.behavior)(ctx)
        }
    }

    fn stub(id: &'static str, priority: i32, behavior: fn(&ScanContext) -> ScanResult) -> Arc<dyn Scanner> {
        Arc::new(Stub {
            id,
            priority,
            applicability: Applicability::always,
            behavior,
        })
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "hello").unwrap();
        temp
    }

    fn with_component(id: &str, description: &str) -> ScanResult {
        let mut findings = Findings::new();
        findings.components.push(
            Component::new("svc", "orders", ComponentType::Service).with_description(description),
        );
        ScanResult::success(id, findings, Vec::new(), None)
    }

    #[test]
    fn test_stages_order_by_priority_then_id() {
        let orchestrator = Orchestrator::new(vec![
            stub("web", 50, |_| ScanResult::empty("web")),
            stub("deps", 10, |_| ScanResult::empty("deps")),
            stub("api", 50, |_| ScanResult::empty("api")),
        ]);
        let stages: Vec<_> = orchestrator
            .stages()
            .into_iter()
            .map(|(p, s)| (p, s.iter().map(|s| s.id()).collect::<Vec<_>>()))
            .collect();
        assert_eq!(stages, vec![(10, vec!["deps"]), (50, vec!["api", "web"])]);
    }

    #[test]
    fn test_lower_priority_number_wins_conflicts() {
        let temp = project();
        let ctx = ScanContext::new(temp.path());
        let orchestrator = Orchestrator::new(vec![
            stub("late", 50, |_| with_component("late", "from late")),
            stub("early", 10, |_| with_component("early", "from early")),
        ]);

        let report = orchestrator.run(&ctx);
        assert_eq!(report.model.components.len(), 1);
        assert_eq!(report.model.components[0].description.as_deref(), Some("from early"));
        assert!(!report.has_failures());
    }

    #[test]
    fn test_later_stage_sees_earlier_dependencies() {
        let temp = project();
        let ctx = ScanContext::new(temp.path());
        let orchestrator = Orchestrator::new(vec![
            stub("deps", 10, |_| {
                let mut findings = Findings::new();
                findings.dependencies.push(Dependency::new("svc", "pypi", "flask"));
                ScanResult::success("deps", findings, Vec::new(), None)
            }),
            Arc::new(Stub {
                id: "flask",
                priority: 50,
                applicability: || Applicability::has_dependency("flask"),
                behavior: |_| with_component("flask", "web app"),
            }),
            Arc::new(Stub {
                id: "django",
                priority: 50,
                applicability: || Applicability::has_dependency("django"),
                behavior: |_| with_component("django", "never"),
            }),
        ]);

        let report = orchestrator.run(&ctx);
        let ran: Vec<_> = report.results.iter().map(|r| r.scanner_id.as_str()).collect();
        assert_eq!(ran, vec!["deps", "flask"]);
    }

    #[test]
    fn test_panicking_scanner_is_isolated() {
        let temp = project();
        let ctx = ScanContext::new(temp.path());
        let orchestrator = Orchestrator::new(vec![
            stub("boom", 10, |_| panic!("kaboom")),
            stub("fine", 10, |_| with_component("fine", "ok")),
        ]);

        let report = orchestrator.run(&ctx);
        assert_eq!(report.results.len(), 2);
        let boom = report.results.iter().find(|r| r.scanner_id == "boom").unwrap();
        assert!(!boom.success);
        assert!(boom.errors[0].contains("kaboom"));
        assert_eq!(report.model.components.len(), 1);
        assert!(report.has_failures());
    }

    #[test]
    fn test_failed_result_contributes_no_findings() {
        let temp = project();
        let ctx = ScanContext::new(temp.path());
        let orchestrator = Orchestrator::new(vec![
            stub("broken", 10, |_| ScanResult::failed("broken", vec!["no manifest".into()])),
            stub("ok", 20, |_| with_component("ok", "ok")),
        ]);

        let report = orchestrator.run(&ctx);
        assert_eq!(report.model.components.len(), 1);
        assert_eq!(report.quality.scanners_failed, 1);
        assert!(report.model.scanner_statistics.contains_key("broken"));
    }

    #[test]
    fn test_timeout_yields_failed_result() {
        let temp = project();
        let ctx = ScanContext::new(temp.path());
        let orchestrator = Orchestrator::new(vec![
            stub("slow", 10, |_| {
                thread::sleep(Duration::from_millis(500));
                ScanResult::empty("slow")
            }),
            stub("quick", 10, |_| ScanResult::empty("quick")),
        ])
        .with_timeout(Duration::from_millis(50));

        let report = orchestrator.run(&ctx);
        let slow = report.results.iter().find(|r| r.scanner_id == "slow").unwrap();
        assert!(!slow.success);
        assert!(slow.errors[0].contains("timed out"));
        let quick = report.results.iter().find(|r| r.scanner_id == "quick").unwrap();
        assert!(quick.success);
    }

    /// Parses every `.txt` file one at a time, 10 ms each.
    fn paced_scan(ctx: &ScanContext) -> ScanResult {
        let engine = TierEngine::regex_only("paced", |_: &Path, content: &str| -> anyhow::Result<Vec<usize>> {
            thread::sleep(Duration::from_millis(10));
            Ok(vec![content.len()])
        });
        let files = match ctx.find_files("**/*.txt") {
            Ok(files) => files,
            Err(e) => return ScanResult::failed("paced", vec![e.to_string()]),
        };
        let (_, stats) = engine.parse_files(ctx, &files);
        ScanResult::success("paced", Findings::new(), Vec::new(), Some(stats.build()))
    }

    #[test]
    fn test_timeout_keeps_partial_statistics() {
        let temp = TempDir::new().unwrap();
        for i in 0..300 {
            fs::write(temp.path().join(format!("f{:03}.txt", i)), "x").unwrap();
        }
        let mut settings = BTreeMap::new();
        settings.insert("scan.parallel".to_string(), "false".to_string());
        let ctx = ScanContext::new(temp.path()).with_settings(settings);
        let orchestrator = Orchestrator::new(vec![stub("paced", 10, paced_scan)])
            .with_timeout(Duration::from_secs(1));

        let report = orchestrator.run(&ctx);
        let paced = &report.results[0];
        assert!(!paced.success);
        assert!(paced.errors[0].contains("timed out"));
        assert_eq!(paced.statistics.files_discovered, 300);
        assert!(paced.statistics.files_scanned > 0);
        assert!(paced.statistics.files_scanned < paced.statistics.files_discovered);
        assert_eq!(
            report.model.scanner_statistics["paced"].files_scanned,
            paced.statistics.files_scanned
        );
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let temp = project();
        let ctx = ScanContext::new(temp.path());
        let scanners = || {
            vec![
                stub("a", 10, |_| with_component("a", "from a")),
                stub("b", 10, |_| with_component("b", "from b")),
            ]
        };

        let parallel = Orchestrator::new(scanners()).run(&ctx);
        let sequential = Orchestrator::new(scanners()).with_parallel(false).run(&ctx);
        assert_eq!(parallel.model, sequential.model);
    }

    #[test]
    fn test_plan_lists_applicable_scanners() {
        let temp = project();
        let ctx = ScanContext::new(temp.path());
        let orchestrator = Orchestrator::new(vec![
            stub("yes", 10, |_| ScanResult::empty("yes")),
            Arc::new(Stub {
                id: "no",
                priority: 10,
                applicability: Applicability::never,
                behavior: |_| ScanResult::empty("no"),
            }),
        ]);
        let planned: Vec<_> = orchestrator.plan(&ctx).iter().map(|s| s.id()).collect();
        assert_eq!(planned, vec!["yes"]);
    }
}
