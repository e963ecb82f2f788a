//! npm dependency scanner.
//!
//! Reads `package.json` manifests. `dependencies` map to scope "compile",
//! `devDependencies` to "test" and `peerDependencies` to "provided". Scoped
//! packages (`@angular/core`) split into group `@angular` and artifact
//! `core`; plain packages use group `npm`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::support;
use crate::model::{ids, Component, ComponentType, Dependency};
use crate::scanner::{Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine};

const PATTERNS: &[&str] = &["**/package.json"];

/// Setting that turns off `devDependencies` collection when "false".
pub const INCLUDE_DEV_SETTING: &str = "npm.include-dev";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, serde_json::Value>,
}

pub struct NpmScanner;

impl Scanner for NpmScanner {
    fn id(&self) -> &'static str {
        "npm-dependencies"
    }

    fn display_name(&self) -> &'static str {
        "npm Dependencies"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["javascript", "typescript"]
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

impl NpmScanner {
    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let include_dev = ctx.setting_or(INCLUDE_DEV_SETTING, "true") != "false";
        let engine = TierEngine::regex_only(self.id(), move |file: &Path, content: &str| {
            let manifest: PackageJson = serde_json::from_str(content)?;
            Ok(vec![to_findings(file, manifest, include_dev)])
        });
        support::scan_files(self.id(), ctx, PATTERNS, &engine)
    }
}

fn to_findings(file: &Path, manifest: PackageJson, include_dev: bool) -> Findings {
    let name = manifest.name.clone().unwrap_or_else(|| {
        // Unnamed workspace roots are named after their directory.
        file.parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    });

    let mut component = Component::new(ids::component_id("npm", &name), name.clone(), ComponentType::Library)
        .with_technology("Node.js/npm")
        .with_description(
            manifest
                .description
                .clone()
                .unwrap_or_else(|| format!("npm package: {}", name)),
        )
        .with_metadata("packageManager", "npm");
    if let Some(version) = &manifest.version {
        component = component.with_metadata("version", version.clone());
    }
    if manifest.private {
        component = component.with_metadata("private", "true");
    }

    let mut findings = Findings::new();
    let mut sections = vec![(&manifest.dependencies, "compile")];
    if include_dev {
        sections.push((&manifest.dev_dependencies, "test"));
    }
    sections.push((&manifest.peer_dependencies, "provided"));

    for (section, scope) in sections {
        for (package, spec) in section {
            let (group, artifact) = split_package_name(package);
            let version = match spec {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            };
            findings.dependencies.push(
                Dependency::new(component.id.clone(), group, artifact)
                    .with_version(version)
                    .with_scope(scope),
            );
        }
    }
    findings.components.push(component);
    findings
}

fn split_package_name(package: &str) -> (String, String) {
    match package.split_once('/') {
        Some((scope, name)) if scope.starts_with('@') => (scope.to_string(), name.to_string()),
        _ => ("npm".to_string(), package.to_string()),
    }
}
