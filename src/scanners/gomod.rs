//! Go module scanner.
//!
//! Parses `go.mod` files. Each module becomes a service component; every
//! `require` entry becomes a dependency of it. Go has no dependency scopes,
//! so everything is "compile"; `// indirect` entries are marked non-direct.

use std::path::Path;

use super::support;
use crate::model::{Component, Dependency};
use crate::scanner::{Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine};

const PATTERNS: &[&str] = &["**/go.mod"];

pub struct GoModScanner;

impl Scanner for GoModScanner {
    fn id(&self) -> &'static str {
        "go-modules"
    }

    fn display_name(&self) -> &'static str {
        "Go Modules"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        10
    }

    fn scan(&self, ctx: &ScanContext) -> ScanResult {
        ScanResult::from_outcome(self.id(), self.try_scan(ctx))
    }
}

impl GoModScanner {
    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let engine = TierEngine::regex_only(self.id(), |file: &Path, content: &str| {
            let module = GoMod::parse(content)?;
            tracing::debug!(file = %file.display(), module = %module.path, requires = module.requires.len(), "parsed go.mod");
            Ok(vec![module.into_findings()])
        });
        support::scan_files(self.id(), ctx, PATTERNS, &engine)
    }
}

#[derive(Debug, PartialEq)]
struct Require {
    path: String,
    version: Option<String>,
    indirect: bool,
}

#[derive(Debug)]
struct GoMod {
    path: String,
    go_version: Option<String>,
    requires: Vec<Require>,
}

impl GoMod {
    fn parse(content: &str) -> anyhow::Result<Self> {
        let mut path = String::new();
        let mut go_version = None;
        let mut requires = Vec::new();
        let mut in_require_block = false;
        let mut in_other_block = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if let Some(rest) = line.strip_prefix("module ") {
                path = rest.trim().trim_matches('"').to_string();
                continue;
            }
            if let Some(rest) = line.strip_prefix("go ") {
                go_version = Some(rest.trim().to_string());
                continue;
            }

            if line == "require (" {
                in_require_block = true;
                continue;
            }
            // replace, exclude and retract blocks carry no dependencies of their own
            if line.ends_with('(') {
                in_other_block = true;
                continue;
            }
            if line == ")" {
                in_require_block = false;
                in_other_block = false;
                continue;
            }

            if let Some(rest) = line.strip_prefix("require ") {
                requires.extend(parse_require_line(rest));
                continue;
            }
            if in_require_block && !in_other_block {
                requires.extend(parse_require_line(line));
            }
        }

        if path.is_empty() {
            anyhow::bail!("no module declaration found");
        }

        Ok(Self {
            path,
            go_version,
            requires,
        })
    }

    /// Last path segment, e.g. `orders` for `github.com/acme/orders`.
    fn short_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    fn into_findings(self) -> Findings {
        let mut component = support::service_component(self.short_name(), "Go")
            .with_description(format!("Go module: {}", self.path))
            .with_metadata("modulePath", self.path.clone())
            .with_metadata("packageManager", "go");
        if let Some(version) = &self.go_version {
            component = component.with_metadata("goVersion", version.clone());
        }

        let mut findings = Findings::new();
        findings.dependencies = self
            .requires
            .into_iter()
            .map(|r| to_dependency(&component, r))
            .collect();
        findings.components.push(component);
        findings
    }
}

/// `google.golang.org/grpc v1.60.0 // indirect`
fn parse_require_line(line: &str) -> Option<Require> {
    let (spec, comment) = match line.split_once("//") {
        Some((spec, comment)) => (spec, comment),
        None => (line, ""),
    };
    let mut parts = spec.split_whitespace();
    let path = parts.next()?.trim_matches('"').to_string();
    let version = parts.next().map(str::to_string);
    Some(Require {
        path,
        version,
        indirect: comment.trim() == "indirect",
    })
}

/// Split a module path into (group, artifact). Major version suffixes such
/// as `/v5` stay in the group and the artifact is the segment before them.
fn split_module_path(path: &str) -> (String, String) {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        [single] => ("go".to_string(), single.to_string()),
        [.., name, last] if is_major_version(last) => (path.to_string(), name.to_string()),
        [init @ .., last] => (init.join("/"), last.to_string()),
        [] => ("go".to_string(), path.to_string()),
    }
}

fn is_major_version(segment: &str) -> bool {
    segment.len() > 1 && segment.starts_with('v') && segment[1..].chars().all(|c| c.is_ascii_digit())
}

fn to_dependency(component: &Component, require: Require) -> Dependency {
    let (group, artifact) = split_module_path(&require.path);
    let mut dependency = Dependency::new(component.id.clone(), group, artifact).with_version(require.version);
    dependency.direct = !require.indirect;
    dependency
}
