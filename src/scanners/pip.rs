//! Python dependency scanner.
//!
//! Reads `requirements*.txt`, `pyproject.toml` (PEP 621 and Poetry),
//! `setup.py` and `Pipfile`. The TOML-shaped files are read section by
//! section, line by line; only the dependency tables are interpreted.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use super::support;
use crate::model::Dependency;
use crate::scanner::{Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine};

const PATTERNS: &[&str] = &[
    "**/requirements*.txt",
    "**/pyproject.toml",
    "**/setup.py",
    "**/Pipfile",
];

lazy_static! {
    /// `name[extra] >= 1.0`
    static ref REQUIREMENT: Regex = Regex::new(
        r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[[^\]]*\])?\s*(?:(===|==|>=|<=|~=|!=|>|<)\s*(.+))?$"
    )
    .unwrap();
    static ref QUOTED: Regex = Regex::new(r#""([^"]*)"|'([^']*)'"#).unwrap();
    static ref TABLE_VERSION: Regex = Regex::new(r#"version\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref KEY_VALUE: Regex = Regex::new(r#"^["']?([A-Za-z0-9][A-Za-z0-9._-]*)["']?\s*=\s*(.+)$"#).unwrap();
    static ref INSTALL_REQUIRES: Regex = Regex::new(r"(?s)install_requires\s*=\s*\[(.*?)\]").unwrap();
    static ref POETRY_GROUP: Regex = Regex::new(r"^tool\.poetry\.group\.[\w.-]+\.dependencies$").unwrap();
}

pub struct PipScanner;

impl Scanner for PipScanner {
    fn id(&self) -> &'static str {
        "pip-poetry-dependencies"
    }

    fn display_name(&self) -> &'static str {
        "Pip/Poetry Dependencies"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["python"]
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

impl PipScanner {
    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let component = support::project_component(ctx, "Python");
        let source = component.id.clone();
        let engine = TierEngine::regex_only(self.id(), |file: &Path, content: &str| {
            let requirements = parse_manifest(file, content);
            let mut findings = Findings::new();
            findings.dependencies = requirements
                .into_iter()
                .map(|r| {
                    Dependency::new(source.clone(), r.name.clone(), r.name)
                        .with_version(r.version)
                        .with_scope(r.scope)
                })
                .collect();
            Ok(vec![findings])
        });

        let files = ctx.find_files_any(PATTERNS)?;
        let (mut findings, stats) = support::run_engine(ctx, &files, &engine);
        if !findings.dependencies.is_empty() {
            findings.components.push(component);
        }
        Ok(support::finish(self.id(), findings, stats))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Requirement {
    name: String,
    version: Option<String>,
    scope: &'static str,
}

fn parse_manifest(file: &Path, content: &str) -> Vec<Requirement> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.as_str() {
        "pyproject.toml" => parse_pyproject(content),
        "Pipfile" => parse_pipfile(content),
        "setup.py" => parse_setup_py(content),
        _ => parse_requirements(content),
    }
}

/// One PEP 508 requirement string. Environment markers and URLs are dropped.
fn parse_requirement(spec: &str, scope: &'static str) -> Option<Requirement> {
    let spec = spec.split(';').next().unwrap_or("").trim();
    let spec = spec.split(" @ ").next().unwrap_or("").trim();
    let caps = REQUIREMENT.captures(spec)?;
    let version = match (caps.get(2), caps.get(3)) {
        (Some(op), Some(v)) if op.as_str() == "==" => Some(v.as_str().trim().to_string()),
        (Some(op), Some(v)) => Some(format!("{}{}", op.as_str(), v.as_str().trim())),
        _ => None,
    };
    Some(Requirement {
        name: caps[1].to_lowercase(),
        version,
        scope,
    })
}

fn parse_requirements(content: &str) -> Vec<Requirement> {
    content
        .lines()
        .map(|line| line.split(" #").next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(|line| parse_requirement(line, "compile"))
        .collect()
}

fn parse_setup_py(content: &str) -> Vec<Requirement> {
    INSTALL_REQUIRES
        .captures(content)
        .map(|caps| quoted_strings(&caps[1]))
        .unwrap_or_default()
        .iter()
        .filter_map(|s| parse_requirement(s, "compile"))
        .collect()
}

fn quoted_strings(text: &str) -> Vec<String> {
    QUOTED
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Version from a TOML value: `"^2.0"`, `{ version = "^2.0" }` or `"*"`.
fn toml_version(value: &str) -> Option<String> {
    let value = value.trim();
    let version = if value.starts_with('{') {
        TABLE_VERSION.captures(value).map(|c| c[1].to_string())
    } else {
        quoted_strings(value).into_iter().next()
    };
    version.filter(|v| v != "*" && !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Table {
    Project,
    OptionalDependencies,
    PoetryDependencies,
    PoetryDevDependencies,
    Other,
}

fn parse_pyproject(content: &str) -> Vec<Requirement> {
    let mut requirements = Vec::new();
    let mut table = Table::Other;
    // Multi-line array being collected: scope, text so far, bracket depth.
    let mut pending: Option<(&'static str, String, i32)> = None;

    for line in content.lines() {
        let trimmed = line.split(" #").next().unwrap_or("").trim();

        if let Some((scope, buffer, depth)) = pending.as_mut() {
            buffer.push_str(trimmed);
            buffer.push('\n');
            *depth += bracket_delta(trimmed);
            if *depth <= 0 {
                let scope = *scope;
                requirements.extend(quoted_strings(buffer).iter().filter_map(|s| parse_requirement(s, scope)));
                pending = None;
            }
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') && !trimmed.contains('=') {
            let name = trimmed.trim_matches(|c| c == '[' || c == ']').trim();
            table = match name {
                "project" => Table::Project,
                "project.optional-dependencies" => Table::OptionalDependencies,
                "tool.poetry.dependencies" => Table::PoetryDependencies,
                "tool.poetry.dev-dependencies" => Table::PoetryDevDependencies,
                n if POETRY_GROUP.is_match(n) => Table::PoetryDevDependencies,
                _ => Table::Other,
            };
            continue;
        }

        let (key, value) = match KEY_VALUE.captures(trimmed) {
            Some(caps) => (caps[1].to_string(), caps[2].to_string()),
            None => continue,
        };

        let array_scope = match table {
            Table::Project if key == "dependencies" => Some("compile"),
            Table::OptionalDependencies => Some("optional"),
            _ => None,
        };
        if let Some(scope) = array_scope {
            let depth = bracket_delta(&value);
            if depth > 0 {
                pending = Some((scope, format!("{}\n", value), depth));
            } else {
                requirements.extend(quoted_strings(&value).iter().filter_map(|s| parse_requirement(s, scope)));
            }
            continue;
        }

        let scope = match table {
            Table::PoetryDependencies if key != "python" => "compile",
            Table::PoetryDevDependencies => "test",
            _ => continue,
        };
        requirements.push(Requirement {
            name: key.to_lowercase(),
            version: toml_version(&value),
            scope,
        });
    }

    requirements
}

fn parse_pipfile(content: &str) -> Vec<Requirement> {
    let mut requirements = Vec::new();
    let mut scope = None;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            scope = match trimmed {
                "[packages]" => Some("compile"),
                "[dev-packages]" => Some("test"),
                _ => None,
            };
            continue;
        }
        let (Some(scope), Some(caps)) = (scope, KEY_VALUE.captures(trimmed)) else {
            continue;
        };
        requirements.push(Requirement {
            name: caps[1].to_lowercase(),
            version: toml_version(&caps[2]),
            scope,
        });
    }
    requirements
}

fn bracket_delta(text: &str) -> i32 {
    text.matches('[').count() as i32 - text.matches(']').count() as i32
}
