//! Helpers shared by the built-in scanners.

use std::path::Path;

use crate::model::{ids, Component, ComponentType};
use crate::scanner::{
    FileSet, Findings, ScanContext, ScanError, ScanResult, ScanStatisticsBuilder, TierEngine,
};

/// Run `engine` over every file matching `patterns` and fold the per-file
/// findings into one successful result.
pub(crate) fn scan_files(
    scanner_id: &str,
    ctx: &ScanContext,
    patterns: &[&str],
    engine: &TierEngine<'_, Findings>,
) -> Result<ScanResult, ScanError> {
    let files = ctx.find_files_any(patterns)?;
    let (findings, stats) = run_engine(ctx, &files, engine);
    Ok(finish(scanner_id, findings, stats))
}

/// Run one engine over a file set, returning folded findings and statistics.
pub(crate) fn run_engine(
    ctx: &ScanContext,
    files: &FileSet,
    engine: &TierEngine<'_, Findings>,
) -> (Findings, ScanStatisticsBuilder) {
    let (per_file, stats) = engine.parse_files(ctx, files);
    let mut findings = Findings::new();
    for f in per_file {
        findings.extend(f);
    }
    (findings, stats)
}

/// Build the success result, turning parse failures into a warning.
pub(crate) fn finish(scanner_id: &str, findings: Findings, stats: ScanStatisticsBuilder) -> ScanResult {
    let stats = stats.build();
    let mut warnings = Vec::new();
    if stats.has_failures() {
        warnings.push(format!(
            "{} of {} file(s) could not be parsed",
            stats.files_failed, stats.files_scanned
        ));
    }
    tracing::info!(
        scanner = scanner_id,
        findings = findings.len(),
        summary = %stats.summary(),
        "scan complete"
    );
    ScanResult::success(scanner_id, findings, warnings, Some(stats))
}

/// The service component representing the scanned project itself.
pub(crate) fn project_component(ctx: &ScanContext, technology: &str) -> Component {
    service_component(ctx.project_name(), technology)
}

pub(crate) fn project_component_id(ctx: &ScanContext) -> String {
    ids::component_id("service", ctx.project_name())
}

pub(crate) fn service_component(name: &str, technology: &str) -> Component {
    Component::new(ids::component_id("service", name), name, ComponentType::Service)
        .with_technology(technology)
}

/// The database backing the project.
pub(crate) fn database_component(ctx: &ScanContext) -> Component {
    let name = format!("{} database", ctx.project_name());
    Component::new(
        ids::component_id("database", ctx.project_name()),
        name,
        ComponentType::Database,
    )
}

/// A message broker shared by every project that talks to it.
pub(crate) fn broker_component(broker: &str) -> Component {
    Component::new(
        ids::component_id("broker", &broker.to_lowercase()),
        broker,
        ComponentType::MessageBroker,
    )
    .with_technology(broker)
}

/// Strip surrounding quotes (and Python string prefixes) from a literal.
pub(crate) fn clean_quotes(literal: &str) -> String {
    let trimmed = literal.trim();
    let unprefixed = trimmed.trim_start_matches(|c: char| matches!(c, 'r' | 'b' | 'u' | 'f' | 'R' | 'B' | 'U' | 'F'));
    let body = if unprefixed.len() >= 2
        && matches!(unprefixed.chars().next(), Some('"' | '\'' | '`'))
    {
        unprefixed
    } else {
        trimmed
    };
    body.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

/// File stem, used as a module name.
pub(crate) fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Whether a path looks like test code. Scanners skip these in their
/// pre-filters.
pub(crate) fn is_test_path(path: &Path) -> bool {
    let normalized = path.to_string_lossy().replace('\\', "/");
    if normalized.contains("/src/test/") || normalized.contains("/tests/") || normalized.contains("/__tests__/") {
        return true;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.starts_with("test_")
        || name == "conftest.py"
        || name.ends_with("_test.py")
        || name.ends_with("_test.go")
        || name.contains(".test.")
        || name.contains(".spec.")
}

/// Join a base path and a sub-path with exactly one slash between them.
pub(crate) fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let path = path.trim().trim_start_matches('/');
    let joined = match (base.is_empty(), path.is_empty()) {
        (true, true) => String::new(),
        (true, false) => path.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, path),
    };
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_quotes() {
        assert_eq!(clean_quotes("\"/users\""), "/users");
        assert_eq!(clean_quotes("'/items'"), "/items");
        assert_eq!(clean_quotes("r'/raw'"), "/raw");
        assert_eq!(clean_quotes("`/tpl`"), "/tpl");
        assert_eq!(clean_quotes("route"), "route");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("", "users"), "/users");
        assert_eq!(join_paths("/api", ""), "/api");
        assert_eq!(join_paths("", ""), "/");
    }

    #[test]
    fn test_is_test_path() {
        assert!(is_test_path(Path::new("/p/src/test/java/FooTest.java")));
        assert!(is_test_path(Path::new("/p/app/test_views.py")));
        assert!(is_test_path(Path::new("/p/web/routes.spec.ts")));
        assert!(is_test_path(Path::new("/p/api/handler_test.go")));
        assert!(!is_test_path(Path::new("/p/app/views.py")));
    }
}
