//! Express.js route scanner.
//!
//! Routes are method calls on an app or router whose first argument is a
//! path literal: `app.get('/users', ...)`, `router.delete('/users/:id', ...)`.
//! JavaScript and TypeScript sources go through their own grammars; both
//! share one pattern fallback.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use super::support;
use crate::model::{ApiEndpoint, Component};
use crate::parser::{languages, query_parser, AstNode, Grammar, StructuralParser};
use crate::scanner::{
    Applicability, Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine,
};

const PATTERNS: &[&str] = &["**/*.js", "**/*.ts"];
const VERBS: &[&str] = &["get", "post", "put", "delete", "patch", "all", "options", "head"];

lazy_static! {
    static ref ROUTE_CALL: Regex = Regex::new(
        r#"(\w+)\.(get|post|put|delete|patch|all|options|head)\s*\(\s*['"`]([^'"`]+)['"`]"#
    )
    .unwrap();
}

pub struct ExpressScanner {
    javascript: Box<dyn StructuralParser>,
    typescript: Box<dyn StructuralParser>,
}

impl ExpressScanner {
    pub fn new() -> Self {
        Self {
            javascript: query_parser(Grammar::JavaScript, languages::javascript::ROUTE_CALL_QUERY),
            typescript: query_parser(Grammar::TypeScript, languages::typescript::ROUTE_CALL_QUERY),
        }
    }

    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let component = support::project_component(ctx, "Express");

        let extractor = |file: &Path, nodes: &[AstNode]| -> Vec<Findings> {
            let module = support::module_name(file);
            let endpoints = nodes
                .iter()
                .filter_map(|node| {
                    let route = Route {
                        object: node.capture("object")?,
                        verb: node.capture("verb")?,
                        path: support::clean_quotes(node.capture("path")?),
                    };
                    route.to_endpoint(&component.id, &module)
                })
                .collect();
            vec![with_component(&component, endpoints)]
        };
        let fallback = |file: &Path, content: &str| -> anyhow::Result<Vec<Findings>> {
            let endpoints = endpoints_from_source(&component.id, &support::module_name(file), content);
            Ok(vec![with_component(&component, endpoints)])
        };

        let js_engine = TierEngine::new(self.id(), self.javascript.as_ref(), &extractor, &fallback)
            .with_pre_filter(is_route_source);
        let ts_engine = TierEngine::new(self.id(), self.typescript.as_ref(), &extractor, &fallback)
            .with_pre_filter(is_route_source);

        let js_files = ctx.find_files("**/*.js")?;
        let ts_files = ctx.find_files("**/*.ts")?;
        let (mut findings, mut stats) = support::run_engine(ctx, &js_files, &js_engine);
        let (ts_findings, ts_stats) = support::run_engine(ctx, &ts_files, &ts_engine);
        findings.extend(ts_findings);
        stats.merge(ts_stats);
        stats.files_discovered(js_files.len() + ts_files.len());
        findings.components.dedup_by(|a, b| a.id == b.id);

        Ok(support::finish(self.id(), findings, stats))
    }
}

impl Default for ExpressScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for ExpressScanner {
    fn id(&self) -> &'static str {
        "express-routes"
    }

    fn display_name(&self) -> &'static str {
        "Express.js Routes"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["javascript", "typescript"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        50
    }

    fn applicability(&self) -> Applicability {
        Applicability::has_any_files(PATTERNS).and(
            Applicability::has_dependency("express")
                .or(Applicability::file_contains("**/*.js", "express"))
                .or(Applicability::file_contains("**/*.ts", "express")),
        )
    }

    fn scan(&self, ctx: &ScanContext) -> ScanResult {
        ScanResult::from_outcome(self.id(), self.try_scan(ctx))
    }
}

/// Declarations, bundles and tests never register routes.
fn is_route_source(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let in_node_modules = path.components().any(|c| c.as_os_str() == "node_modules");
    !(name.ends_with(".d.ts") || name.ends_with(".min.js") || in_node_modules || support::is_test_path(path))
}

fn with_component(component: &Component, endpoints: Vec<ApiEndpoint>) -> Findings {
    let mut findings = Findings::new();
    if !endpoints.is_empty() {
        findings.components.push(component.clone());
    }
    findings.api_endpoints = endpoints;
    findings
}

struct Route<'a> {
    object: &'a str,
    verb: &'a str,
    path: String,
}

impl Route<'_> {
    fn to_endpoint(&self, component_id: &str, module: &str) -> Option<ApiEndpoint> {
        if !VERBS.contains(&self.verb) {
            return None;
        }
        // `cache.get('key')` and friends are not routes.
        if !(self.path.starts_with('/') || self.path == "*") {
            return None;
        }
        let method = if self.verb == "all" { "ANY" } else { self.verb };
        Some(
            ApiEndpoint::rest(component_id, method, self.path.clone())
                .with_description(format!("{}.{}.{}", module, self.object, self.verb)),
        )
    }
}

/// Tier 2.
fn endpoints_from_source(component_id: &str, module: &str, content: &str) -> Vec<ApiEndpoint> {
    ROUTE_CALL
        .captures_iter(content)
        .filter_map(|caps| {
            let route = Route {
                object: caps.get(1)?.as_str(),
                verb: caps.get(2)?.as_str(),
                path: caps.get(3)?.as_str().to_string(),
            };
            route.to_endpoint(component_id, module)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ROUTES_JS: &str = r#"
const express = require('express');
const app = express();
const router = express.Router();

app.get('/users', (req, res) => res.json([]));
router.post("/users/:id", update);
app.all('*', notFound);
cache.get('session');
app.use('/api', router);
"#;

    const ROUTES_TS: &str = r#"
import express, { Request, Response } from 'express';
const router = express.Router();

router.delete('/items/:id', (req: Request, res: Response): void => {
    res.sendStatus(204);
});
"#;

    fn pairs(endpoints: &[ApiEndpoint]) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.clone().unwrap_or_default(), e.path.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn test_fallback_routes() {
        let endpoints = endpoints_from_source("svc", "server", ROUTES_JS);
        assert_eq!(
            pairs(&endpoints),
            vec![
                ("ANY".to_string(), "*".to_string()),
                ("GET".to_string(), "/users".to_string()),
                ("POST".to_string(), "/users/:id".to_string()),
            ]
        );
        let get = endpoints.iter().find(|e| e.path == "/users").unwrap();
        assert_eq!(get.description.as_deref(), Some("server.app.get"));
    }

    #[test]
    fn test_route_source_filter() {
        assert!(is_route_source(Path::new("/p/src/routes.ts")));
        assert!(!is_route_source(Path::new("/p/src/types.d.ts")));
        assert!(!is_route_source(Path::new("/p/dist/app.min.js")));
        assert!(!is_route_source(Path::new("/p/node_modules/express/index.js")));
        assert!(!is_route_source(Path::new("/p/src/routes.spec.ts")));
    }

    #[test]
    fn test_scan_project_js_and_ts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("server.js"), ROUTES_JS).unwrap();
        fs::write(temp.path().join("items.ts"), ROUTES_TS).unwrap();
        fs::write(temp.path().join("items.d.ts"), "export declare function get(): void;").unwrap();
        let ctx = ScanContext::new(temp.path()).with_project_name("shop");
        let scanner = ExpressScanner::new();

        assert!(scanner.applies_to(&ctx));
        let result = scanner.scan(&ctx);
        assert!(result.success);
        assert_eq!(result.findings.api_endpoints.len(), 4);
        assert_eq!(result.findings.components.len(), 1);
        assert_eq!(result.statistics.files_discovered, 3);
        assert_eq!(result.statistics.files_scanned, 2);
    }

    #[test]
    fn test_not_applicable_without_express() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("util.js"), "module.exports = {};").unwrap();
        let ctx = ScanContext::new(temp.path());
        assert!(!ExpressScanner::new().applies_to(&ctx));
    }
}
