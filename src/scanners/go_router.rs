//! Go HTTP router scanner.
//!
//! Recognizes route registrations of the common Go routers:
//! - Gin and Echo: `r.GET("/users", list)`
//! - Chi and Fiber: `r.Get("/users", list)`
//! - Gorilla Mux: `r.HandleFunc("/users", list).Methods("GET")`
//! - `net/http`: `http.HandleFunc("/health", health)`
//!
//! Group variables (`v1 := r.Group("/api/v1")`) prefix the routes registered
//! on them, nested groups included.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::support;
use crate::model::{ApiEndpoint, Component};
use crate::parser::{languages::go, query_parser, AstNode, Grammar, StructuralParser};
use crate::scanner::{
    Applicability, Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine,
};

const PATTERNS: &[&str] = &["**/*.go"];
const ROUTER_MODULES: &[&str] = &["gin-gonic", "labstack/echo", "go-chi", "gorilla/mux", "gofiber"];
const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Groups nested deeper than this are treated as unresolvable cycles.
const MAX_GROUP_DEPTH: usize = 16;

lazy_static! {
    static ref PACKAGE: Regex = Regex::new(r"(?m)^package\s+(\w+)").unwrap();
    static ref GROUP: Regex = Regex::new(r#"(\w+)\s*:=\s*(\w+)\.Group\(\s*"([^"]*)""#).unwrap();
    static ref VERB_ROUTE: Regex = Regex::new(
        r#"(\w+)\.(GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS|Any|Get|Post|Put|Delete|Patch|Head|Options|All)\(\s*"([^"]*)"\s*,\s*([\w.]+)"#
    )
    .unwrap();
    static ref HANDLE_ROUTE: Regex = Regex::new(
        r#"(\w+)\.(HandleFunc|Handle)\(\s*"([^"]*)"\s*,\s*([\w.]+)[^\n]*?\)(?:\.Methods\(([^)]*)\))?"#
    )
    .unwrap();
    static ref HANDLER_ARG: Regex = Regex::new(r#"^[^(]*\(\s*"[^"]*"\s*,\s*([\w.]+)"#).unwrap();
    static ref MUX_OBJECT: Regex =
        Regex::new(r#"^(\w+)\.(?:HandleFunc|Handle)\(\s*"([^"]*)"\s*,\s*([\w.]+)"#).unwrap();
    static ref QUOTED: Regex = Regex::new(r#""([^"]+)""#).unwrap();
}

pub struct GoRouterScanner {
    parser: Box<dyn StructuralParser>,
}

impl GoRouterScanner {
    pub fn new() -> Self {
        Self {
            parser: query_parser(Grammar::Go, go::ROUTER_QUERY),
        }
    }

    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let component = support::project_component(ctx, "Go");

        let extractor = |file: &Path, nodes: &[AstNode]| -> Vec<Findings> {
            vec![with_component(&component, routes_from_nodes(file, nodes).endpoints(&component.id))]
        };
        let fallback = |file: &Path, content: &str| -> anyhow::Result<Vec<Findings>> {
            Ok(vec![with_component(&component, routes_from_source(file, content).endpoints(&component.id))])
        };

        let engine = TierEngine::new(self.id(), self.parser.as_ref(), extractor, fallback)
            .with_pre_filter(|p: &Path| {
                !support::is_test_path(p) && !p.components().any(|c| c.as_os_str() == "vendor")
            });
        let files = ctx.find_files_any(PATTERNS)?;
        let (mut findings, stats) = support::run_engine(ctx, &files, &engine);
        findings.components.dedup_by(|a, b| a.id == b.id);
        Ok(support::finish(self.id(), findings, stats))
    }
}

impl Default for GoRouterScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for GoRouterScanner {
    fn id(&self) -> &'static str {
        "go-http-router"
    }

    fn display_name(&self) -> &'static str {
        "Go HTTP Routers"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        50
    }

    fn applicability(&self) -> Applicability {
        Applicability::has_files("**/*.go").and(
            Applicability::has_any_dependency(ROUTER_MODULES)
                .or(Applicability::file_contains("**/*.go", "\"net/http\"")),
        )
    }

    fn scan(&self, ctx: &ScanContext) -> ScanResult {
        ScanResult::from_outcome(self.id(), self.try_scan(ctx))
    }
}

fn with_component(component: &Component, endpoints: Vec<ApiEndpoint>) -> Findings {
    let mut findings = Findings::new();
    if !endpoints.is_empty() {
        findings.components.push(component.clone());
    }
    findings.api_endpoints = endpoints;
    findings
}

/// One registration before group prefixes are applied.
#[derive(Debug)]
struct Registration {
    router: String,
    method: String,
    path: String,
    handler: Option<String>,
}

/// Everything read from one file.
#[derive(Debug, Default)]
struct FileRoutes {
    package: Option<String>,
    /// Group variable to (parent variable, prefix).
    groups: HashMap<String, (String, String)>,
    registrations: Vec<Registration>,
}

impl FileRoutes {
    /// Full prefix of a router variable, following parent groups.
    fn prefix_of(&self, router: &str) -> String {
        let mut segments = Vec::new();
        let mut current = router;
        for _ in 0..MAX_GROUP_DEPTH {
            match self.groups.get(current) {
                Some((parent, prefix)) => {
                    segments.push(prefix.as_str());
                    current = parent;
                }
                None => break,
            }
        }
        segments
            .iter()
            .rev()
            .fold(String::new(), |acc, segment| support::join_paths(&acc, segment))
    }

    fn endpoints(&self, component_id: &str) -> Vec<ApiEndpoint> {
        let package = self.package.as_deref().unwrap_or("main");
        self.registrations
            .iter()
            .map(|r| {
                let path = support::join_paths(&self.prefix_of(&r.router), &r.path);
                let handler = r.handler.as_deref().unwrap_or(&r.router);
                ApiEndpoint::rest(component_id, &r.method, path)
                    .with_description(format!("{}.{}", package, handler))
            })
            .collect()
    }
}

/// HTTP method for a router call, `None` if the call is not a route.
fn method_for(verb: &str) -> Option<String> {
    match verb {
        "Any" | "All" | "HandleFunc" | "Handle" => Some("ANY".to_string()),
        v if HTTP_VERBS.contains(&v) => Some(v.to_string()),
        v if HTTP_VERBS.contains(&v.to_uppercase().as_str()) => Some(v.to_uppercase()),
        _ => None,
    }
}

/// `"GET", "POST"` → `["GET", "POST"]`.
fn quoted_methods(args: &str) -> Vec<String> {
    QUOTED
        .captures_iter(args)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
        .collect()
}

/// Tier 1.
fn routes_from_nodes(file: &Path, nodes: &[AstNode]) -> FileRoutes {
    let mut routes = FileRoutes::default();
    let mut qualified: HashSet<(String, String)> = HashSet::new();

    for node in nodes {
        if let Some(package) = node.capture("package") {
            routes.package = Some(package.to_string());
        }
        if let (Some(var), Some(parent), Some("Group"), Some(prefix)) = (
            node.capture("group_var"),
            node.capture("group_parent"),
            node.capture("group_verb"),
            node.capture("group_prefix"),
        ) {
            routes
                .groups
                .insert(var.to_string(), (parent.to_string(), support::clean_quotes(prefix)));
        }
    }

    // `.Methods(...)` wraps a HandleFunc call; the inner call is then
    // already covered and must not be reported again as ANY.
    for node in nodes {
        let (Some(object), Some("Methods"), Some(route)) =
            (node.capture("object"), node.capture("verb"), node.capture("route"))
        else {
            continue;
        };
        let Some(inner) = MUX_OBJECT.captures(object) else {
            continue;
        };
        let router = inner[1].to_string();
        let path = inner[2].to_string();
        let args = route.rsplit_once(".Methods").map(|(_, a)| a).unwrap_or("");
        for method in quoted_methods(args) {
            routes.registrations.push(Registration {
                router: router.clone(),
                method,
                path: path.clone(),
                handler: Some(inner[3].to_string()),
            });
        }
        qualified.insert((router, path));
    }

    for node in nodes {
        let (Some(object), Some(verb), Some(path)) =
            (node.capture("object"), node.capture("verb"), node.capture("path"))
        else {
            continue;
        };
        let Some(method) = method_for(verb) else {
            continue;
        };
        let path = support::clean_quotes(path);
        if !is_route_path(&path) || qualified.contains(&(object.to_string(), path.clone())) {
            continue;
        }
        let handler = node
            .capture("route")
            .and_then(|r| HANDLER_ARG.captures(r))
            .map(|c| c[1].to_string());
        routes.registrations.push(Registration {
            router: object.to_string(),
            method,
            path,
            handler,
        });
    }

    if routes.package.is_none() {
        routes.package = parent_dir_name(file);
    }
    routes
}

/// Tier 2.
fn routes_from_source(file: &Path, content: &str) -> FileRoutes {
    let mut routes = FileRoutes {
        package: PACKAGE.captures(content).map(|c| c[1].to_string()).or_else(|| parent_dir_name(file)),
        ..Default::default()
    };

    for caps in GROUP.captures_iter(content) {
        routes.groups.insert(caps[1].to_string(), (caps[2].to_string(), caps[3].to_string()));
    }

    for caps in VERB_ROUTE.captures_iter(content) {
        let path = caps[3].to_string();
        if let (Some(method), true) = (method_for(&caps[2]), is_route_path(&path)) {
            routes.registrations.push(Registration {
                router: caps[1].to_string(),
                method,
                path,
                handler: Some(caps[4].to_string()),
            });
        }
    }

    for caps in HANDLE_ROUTE.captures_iter(content) {
        let path = caps[3].to_string();
        if !is_route_path(&path) {
            continue;
        }
        let methods = caps
            .get(5)
            .map(|m| quoted_methods(m.as_str()))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| vec!["ANY".to_string()]);
        for method in methods {
            routes.registrations.push(Registration {
                router: caps[1].to_string(),
                method,
                path: path.clone(),
                handler: Some(caps[4].to_string()),
            });
        }
    }
    routes
}

/// Route paths are absolute, or empty for the root of a group.
fn is_route_path(path: &str) -> bool {
    path.is_empty() || path.starts_with('/')
}

fn parent_dir_name(file: &Path) -> Option<String> {
    file.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
}
