//! Flask route scanner.
//!
//! Tier 1 reads decorated functions from the Python syntax tree. Tier 2
//! matches the same decorator shapes line by line:
//! - `@app.get("/users")` and the other verb shortcuts (Flask 2.0+)
//! - `@app.route("/users", methods=["GET", "POST"])`
//! - `@app.route("/users")`, which defaults to GET

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use super::support;
use crate::model::ApiEndpoint;
use crate::parser::{languages::python, query_parser, AstNode, Grammar, StructuralParser};
use crate::scanner::{
    Applicability, Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine,
};

const PATTERNS: &[&str] = &["**/*.py"];
const VERBS: &[&str] = &["get", "post", "put", "delete", "patch"];

lazy_static! {
    static ref MODERN_ROUTE: Regex =
        Regex::new(r#"@(\w+)\.(get|post|put|delete|patch)\s*\(\s*[rbuf]?['"](.+?)['"]"#).unwrap();
    static ref LEGACY_ROUTE: Regex = Regex::new(
        r#"@(\w+)\.route\s*\(\s*[rbuf]?['"](.+?)['"]\s*,\s*methods\s*=\s*\[([^\]]+)\]"#
    )
    .unwrap();
    static ref SIMPLE_ROUTE: Regex =
        Regex::new(r#"@(\w+)\.route\s*\(\s*[rbuf]?['"](.+?)['"]\s*\)"#).unwrap();
    static ref FUNCTION_DEF: Regex = Regex::new(r"def\s+(\w+)\s*\((.*)\)\s*(?:->.*)?:").unwrap();
    static ref FIRST_STRING: Regex = Regex::new(r#"^\(\s*[rbuf]?['"]([^'"]*)['"]"#).unwrap();
    static ref METHODS_ARG: Regex = Regex::new(r"methods\s*=\s*[\[(]([^\])]*)[\])]").unwrap();
    static ref QUOTED: Regex = Regex::new(r#"['"](\w+)['"]"#).unwrap();
}

/// Lines after a decorator searched for the decorated function.
const FUNCTION_LOOKAHEAD: usize = 5;

pub struct FlaskScanner {
    parser: Box<dyn StructuralParser>,
}

impl FlaskScanner {
    pub fn new() -> Self {
        Self {
            parser: query_parser(Grammar::Python, python::DECORATED_ROUTE_QUERY),
        }
    }

    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let component = support::project_component(ctx, "Flask");
        let component_id = component.id.clone();

        let extractor = |file: &Path, nodes: &[AstNode]| -> Vec<Findings> {
            let endpoints = endpoints_from_nodes(&component_id, &support::module_name(file), nodes);
            vec![with_component(&component, endpoints)]
        };
        let fallback = |file: &Path, content: &str| -> anyhow::Result<Vec<Findings>> {
            let endpoints = endpoints_from_source(&component_id, &support::module_name(file), content);
            Ok(vec![with_component(&component, endpoints)])
        };

        let engine = TierEngine::new(self.id(), self.parser.as_ref(), extractor, fallback)
            .with_pre_filter(|p: &Path| !support::is_test_path(p));
        support::scan_files(self.id(), ctx, PATTERNS, &engine)
    }
}

impl Default for FlaskScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for FlaskScanner {
    fn id(&self) -> &'static str {
        "flask-routes"
    }

    fn display_name(&self) -> &'static str {
        "Flask Routes"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["python"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        51
    }

    fn applicability(&self) -> Applicability {
        Applicability::has_files("**/*.py").and(
            Applicability::has_dependency("flask")
                .or(Applicability::file_contains("**/*.py", "from flask"))
                .or(Applicability::file_contains("**/*.py", "import flask")),
        )
    }

    fn scan(&self, ctx: &ScanContext) -> ScanResult {
        ScanResult::from_outcome(self.id(), self.try_scan(ctx))
    }
}

fn with_component(component: &crate::model::Component, endpoints: Vec<ApiEndpoint>) -> Findings {
    let mut findings = Findings::new();
    if !endpoints.is_empty() {
        findings.components.push(component.clone());
    }
    findings.api_endpoints = endpoints;
    findings
}

fn endpoint(component_id: &str, method: &str, path: &str, module: &str, handler: &str, params: &str) -> ApiEndpoint {
    let params = params.trim().trim_start_matches('(').trim_end_matches(')').trim();
    ApiEndpoint::rest(component_id, method, path).with_description(format!(
        "{}.{}({})",
        module, handler, params
    ))
}

/// Tier 1: one endpoint per decorator and HTTP method.
fn endpoints_from_nodes(component_id: &str, module: &str, nodes: &[AstNode]) -> Vec<ApiEndpoint> {
    let mut endpoints = Vec::new();
    for node in nodes {
        let (verb, args, handler) = match (node.capture("verb"), node.capture("args"), node.capture("handler")) {
            (Some(v), Some(a), Some(h)) => (v, a, h),
            _ => continue,
        };
        let path = match FIRST_STRING.captures(args) {
            Some(caps) => caps[1].to_string(),
            None => continue,
        };
        let params = node.capture("params").unwrap_or("()");

        let methods: Vec<String> = if verb == "route" {
            match METHODS_ARG.captures(args) {
                Some(caps) => QUOTED
                    .captures_iter(&caps[1])
                    .map(|m| m[1].to_uppercase())
                    .collect(),
                None => vec!["GET".to_string()],
            }
        } else if VERBS.contains(&verb) {
            vec![verb.to_uppercase()]
        } else {
            continue;
        };

        for method in methods {
            endpoints.push(endpoint(component_id, &method, &path, module, handler, params));
        }
    }
    endpoints
}

/// Tier 2: decorator regexes, function name from the following lines.
fn endpoints_from_source(component_id: &str, module: &str, content: &str) -> Vec<ApiEndpoint> {
    let lines: Vec<&str> = content.lines().collect();
    let mut endpoints = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if !trimmed.starts_with('@') {
            continue;
        }

        let routes: Vec<(String, String)> = if let Some(caps) = MODERN_ROUTE.captures(trimmed) {
            vec![(caps[2].to_uppercase(), caps[3].to_string())]
        } else if let Some(caps) = LEGACY_ROUTE.captures(trimmed) {
            QUOTED
                .captures_iter(&caps[3])
                .map(|m| (m[1].to_uppercase(), caps[2].to_string()))
                .collect()
        } else if let Some(caps) = SIMPLE_ROUTE.captures(trimmed) {
            vec![("GET".to_string(), caps[2].to_string())]
        } else {
            continue;
        };

        let function = lines
            .iter()
            .skip(i + 1)
            .take(FUNCTION_LOOKAHEAD)
            .find_map(|l| FUNCTION_DEF.captures(l));
        let (handler, params) = match function {
            Some(caps) => (caps[1].to_string(), caps[2].to_string()),
            None => ("<unknown>".to_string(), String::new()),
        };

        for (method, path) in routes {
            endpoints.push(endpoint(component_id, &method, &path, module, &handler, &params));
        }
    }
    endpoints
}
