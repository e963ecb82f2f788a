//! Id-keyed scanner registry.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::{ScanContext, ScanError, Scanner};
use crate::config::ScannersConfig;

/// Registered scanners, keyed by id.
#[derive(Clone, Default)]
pub struct ScannerRegistry {
    scanners: BTreeMap<&'static str, Arc<dyn Scanner>>,
}

impl std::fmt::Debug for ScannerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.scanners.keys()).finish()
    }
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in scanner.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for scanner in crate::scanners::builtin() {
            // Built-in ids are unique.
            if let Err(e) = registry.register(scanner) {
                tracing::error!(error = %e, "failed to register built-in scanner");
            }
        }
        registry
    }

    /// Register a scanner. Ids must be unique.
    pub fn register(&mut self, scanner: Arc<dyn Scanner>) -> Result<(), ScanError> {
        let id = scanner.id();
        if self.scanners.contains_key(id) {
            return Err(ScanError::DuplicateScanner(id.to_string()));
        }
        tracing::debug!(scanner = id, priority = scanner.priority(), "registered scanner");
        self.scanners.insert(id, scanner);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Scanner>> {
        self.scanners.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// All scanners ordered by (priority, id).
    pub fn list(&self) -> Vec<Arc<dyn Scanner>> {
        let mut scanners: Vec<_> = self.scanners.values().cloned().collect();
        scanners.sort_by(|a, b| (a.priority(), a.id()).cmp(&(b.priority(), b.id())));
        scanners
    }

    /// Scanners chosen by the configuration, ordered by (priority, id).
    pub fn select(&self, config: &ScannersConfig) -> Vec<Arc<dyn Scanner>> {
        let selected: Vec<_> = self
            .list()
            .into_iter()
            .filter(|s| config.is_selected(s.id()))
            .collect();
        for id in &config.enabled {
            if !self.scanners.contains_key(id.as_str()) {
                tracing::warn!(scanner = %id, "enabled scanner is not registered");
            }
        }
        selected
    }

    /// Scanners applicable to the project as seen by `ctx`, ordered by
    /// (priority, id).
    pub fn applicable(&self, ctx: &ScanContext) -> Vec<Arc<dyn Scanner>> {
        self.list()
            .into_iter()
            .filter(|s| is_applicable(s.as_ref(), ctx))
            .collect()
    }
}

/// A scanner applies when at least one of its file patterns matches and its
/// own applicability predicate holds. A panicking predicate counts as "no".
pub fn is_applicable(scanner: &dyn Scanner, ctx: &ScanContext) -> bool {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        scanner
            .supported_file_patterns()
            .iter()
            .any(|p| ctx.has_files(p))
            && scanner.applies_to(ctx)
    }));
    match outcome {
        Ok(applies) => applies,
        Err(_) => {
            tracing::warn!(scanner = scanner.id(), "applicability check panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Applicability, ScanResult};
    use std::fs;
    use tempfile::TempDir;

    struct Fixed {
        id: &'static str,
        priority: i32,
        patterns: &'static [&'static str],
        applicability: fn() -> Applicability,
    }

    impl Scanner for Fixed {
        fn id(&self) -> &'static str {
            self.id
        }
        fn display_name(&self) -> &'static str {
            "Fixed"
        }
        fn supported_languages(&self) -> &'static [&'static str] {
            &["text"]
        }
        fn supported_file_patterns(&self) -> &'static [&'static str] {
            self.patterns
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn applicability(&self) -> Applicability {
            (self.applicability)()
        }
        fn scan(&self, _ctx: &ScanContext) -> ScanResult {
            ScanResult::empty(self.id)
        }
    }

    fn fixed(id: &'static str, priority: i32) -> Arc<dyn Scanner> {
        Arc::new(Fixed {
            id,
            priority,
            patterns: &["**/*.txt"],
            applicability: Applicability::always,
        })
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = ScannerRegistry::new();
        registry.register(fixed("a", 1)).unwrap();
        assert!(matches!(
            registry.register(fixed("a", 2)),
            Err(ScanError::DuplicateScanner(id)) if id == "a"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_orders_by_priority_then_id() {
        let mut registry = ScannerRegistry::new();
        registry.register(fixed("zeta", 10)).unwrap();
        registry.register(fixed("beta", 50)).unwrap();
        registry.register(fixed("alpha", 50)).unwrap();

        let ids: Vec<_> = registry.list().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn test_applicable_requires_files_and_predicate() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "hi").unwrap();
        let ctx = ScanContext::new(temp.path());

        let mut registry = ScannerRegistry::new();
        registry.register(fixed("plain", 1)).unwrap();
        registry
            .register(Arc::new(Fixed {
                id: "vetoed",
                priority: 1,
                patterns: &["**/*.txt"],
                applicability: Applicability::never,
            }))
            .unwrap();
        registry
            .register(Arc::new(Fixed {
                id: "no-files",
                priority: 1,
                patterns: &["**/*.java"],
                applicability: Applicability::always,
            }))
            .unwrap();

        let ids: Vec<_> = registry.applicable(&ctx).iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["plain"]);
    }

    #[test]
    fn test_panicking_predicate_is_not_applicable() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "hi").unwrap();
        let ctx = ScanContext::new(temp.path());
        let scanner = Fixed {
            id: "panicky",
            priority: 1,
            patterns: &["**/*.txt"],
            applicability: || Applicability::new(|_| panic!("bad predicate")),
        };
        assert!(!is_applicable(&scanner, &ctx));
    }

    #[test]
    fn test_select_by_config() {
        let registry = ScannerRegistry::with_builtin();
        let config = ScannersConfig {
            groups: vec!["go".into()],
            ..Default::default()
        };
        let ids: Vec<_> = registry.select(&config).iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["go-modules", "go-http-router"]);
    }
}
