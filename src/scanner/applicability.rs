//! Composable applicability predicates.
//!
//! An [`Applicability`] decides whether a scanner is relevant for a project.
//! Predicates are cheap to clone and combine; `and` / `or` short-circuit, so a
//! glob-presence check placed first gates a more expensive content scan.

use std::fmt;
use std::sync::Arc;

use super::ScanContext;

type Predicate = dyn Fn(&ScanContext) -> bool + Send + Sync;

/// A boolean test over a [`ScanContext`]. Evaluation never fails: an I/O error
/// while checking a file counts as "does not apply" for that file.
#[derive(Clone)]
pub struct Applicability {
    test: Arc<Predicate>,
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Applicability(..)")
    }
}

impl Applicability {
    pub fn new<F>(test: F) -> Self
    where
        F: Fn(&ScanContext) -> bool + Send + Sync + 'static,
    {
        Self { test: Arc::new(test) }
    }

    pub fn test(&self, ctx: &ScanContext) -> bool {
        (self.test)(ctx)
    }

    /// Both predicates hold. `other` is not evaluated when `self` is false.
    pub fn and(&self, other: Applicability) -> Applicability {
        let first = self.clone();
        Applicability::new(move |ctx| first.test(ctx) && other.test(ctx))
    }

    /// Either predicate holds. `other` is not evaluated when `self` is true.
    pub fn or(&self, other: Applicability) -> Applicability {
        let first = self.clone();
        Applicability::new(move |ctx| first.test(ctx) || other.test(ctx))
    }

    pub fn negate(&self) -> Applicability {
        let inner = self.clone();
        Applicability::new(move |ctx| !inner.test(ctx))
    }

    pub fn always() -> Self {
        Applicability::new(|_| true)
    }

    pub fn never() -> Self {
        Applicability::new(|_| false)
    }

    /// At least one file matches the glob.
    pub fn has_files(pattern: &str) -> Self {
        let pattern = pattern.to_string();
        Applicability::new(move |ctx| ctx.has_files(&pattern))
    }

    /// At least one file matches any of the globs.
    pub fn has_any_files(patterns: &[&str]) -> Self {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        Applicability::new(move |ctx| patterns.iter().any(|p| ctx.has_files(p)))
    }

    /// At least one file matching the glob contains `needle`.
    ///
    /// The glob check runs first; file contents are only read when it matches.
    pub fn file_contains(pattern: &str, needle: &str) -> Self {
        let pattern = pattern.to_string();
        let needle = needle.to_string();
        Applicability::has_files(&pattern).and(Applicability::new(move |ctx| {
            let files = match ctx.find_files(&pattern) {
                Ok(files) => files,
                Err(_) => return false,
            };
            files.iter().any(|file| match std::fs::read_to_string(file) {
                Ok(content) => content.contains(&needle),
                Err(e) => {
                    tracing::debug!(file = %file.display(), error = %e, "unreadable during applicability check");
                    false
                }
            })
        }))
    }

    /// An earlier scanner reported a dependency whose group or artifact id
    /// contains `name` (case-insensitive).
    pub fn has_dependency(name: &str) -> Self {
        let needle = name.to_lowercase();
        Applicability::new(move |ctx| dependency_matches(ctx, |n| n.contains(&needle)))
    }

    /// Like [`Applicability::has_dependency`], for any of several names.
    pub fn has_any_dependency(names: &[&str]) -> Self {
        let needles: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        Applicability::new(move |ctx| {
            dependency_matches(ctx, |n| needles.iter().any(|needle| n.contains(needle)))
        })
    }
}

fn dependency_matches(ctx: &ScanContext, matches: impl Fn(&str) -> bool) -> bool {
    ctx.previous_results()
        .values()
        .filter(|r| r.success)
        .flat_map(|r| r.findings.dependencies.iter())
        .any(|dep| matches(&dep.group_id.to_lowercase()) || matches(&dep.artifact_id.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;
    use crate::scanner::{Findings, ScanResult};
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn counting(result: bool, counter: Arc<AtomicUsize>) -> Applicability {
        Applicability::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            result
        })
    }

    #[test]
    fn test_and_short_circuits() {
        let temp = TempDir::new().unwrap();
        let ctx = ScanContext::new(temp.path());
        let calls = Arc::new(AtomicUsize::new(0));

        let combined = Applicability::never().and(counting(true, calls.clone()));
        assert!(!combined.test(&ctx));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let combined = Applicability::always().and(counting(true, calls.clone()));
        assert!(combined.test(&ctx));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_or_short_circuits() {
        let temp = TempDir::new().unwrap();
        let ctx = ScanContext::new(temp.path());
        let calls = Arc::new(AtomicUsize::new(0));

        let combined = Applicability::always().or(counting(false, calls.clone()));
        assert!(combined.test(&ctx));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_negate() {
        let temp = TempDir::new().unwrap();
        let ctx = ScanContext::new(temp.path());
        assert!(Applicability::never().negate().test(&ctx));
        assert!(!Applicability::always().negate().test(&ctx));
    }

    #[test]
    fn test_file_contains() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.py"), "from flask import Flask\n").unwrap();
        fs::write(temp.path().join("util.py"), "import os\n").unwrap();
        let ctx = ScanContext::new(temp.path());

        assert!(Applicability::file_contains("**/*.py", "from flask").test(&ctx));
        assert!(!Applicability::file_contains("**/*.py", "import django").test(&ctx));
        assert!(!Applicability::file_contains("**/*.java", "class").test(&ctx));
    }

    #[test]
    fn test_missing_root_does_not_apply() {
        let temp = TempDir::new().unwrap();
        let ctx = ScanContext::new(temp.path().join("gone"));
        assert!(!Applicability::has_files("**/*").test(&ctx));
        assert!(!Applicability::file_contains("**/*", "x").test(&ctx));
    }

    #[test]
    fn test_has_dependency_reads_previous_results() {
        let temp = TempDir::new().unwrap();
        let mut findings = Findings::new();
        findings
            .dependencies
            .push(Dependency::new("svc", "pypi", "Flask-RESTful"));
        let mut previous = BTreeMap::new();
        previous.insert(
            "pip-dependencies".to_string(),
            ScanResult::success("pip-dependencies", findings, vec![], None),
        );
        let ctx = ScanContext::new(temp.path()).with_previous_results(previous);

        assert!(Applicability::has_dependency("flask").test(&ctx));
        assert!(!Applicability::has_dependency("django").test(&ctx));
        assert!(Applicability::has_any_dependency(&["django", "FLASK"]).test(&ctx));
        assert!(!Applicability::has_dependency("flask").test(&ScanContext::new(temp.path())));
    }
}
