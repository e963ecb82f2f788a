//! Spring MVC REST controller scanner.
//!
//! Endpoints come from `@RestController` / `@Controller` classes. The class
//! level `@RequestMapping` supplies the base path; each method mapping
//! (`@GetMapping`, `@PostMapping`, ..., or `@RequestMapping(method = ...)`)
//! becomes one endpoint per HTTP method and path.

use std::path::Path;

use super::java::{self, Annotation, MemberKind};
use super::support;
use crate::model::{ApiEndpoint, Component};
use crate::parser::{languages::java as java_queries, query_parser, AstNode, Grammar, StructuralParser};
use crate::scanner::{
    Applicability, Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine,
};

const PATTERNS: &[&str] = &["**/*.java"];
const CONTROLLER_ANNOTATIONS: &[&str] = &["RestController", "Controller"];
const PARAMETER_ANNOTATIONS: &[&str] = &["PathVariable", "RequestParam", "RequestBody", "RequestHeader"];

pub struct SpringRestScanner {
    parser: Box<dyn StructuralParser>,
}

impl SpringRestScanner {
    pub fn new() -> Self {
        Self {
            parser: query_parser(Grammar::Java, java_queries::CONTROLLER_METHOD_QUERY),
        }
    }

    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let component = support::project_component(ctx, "Spring Boot");

        let extractor = |_: &Path, nodes: &[AstNode]| -> Vec<Findings> {
            let endpoints = nodes
                .iter()
                .flat_map(|node| {
                    let handler = Handler {
                        class_annotations: java::parse_annotations(node.capture("class_annotations").unwrap_or("")),
                        class_name: node.capture("class_name").unwrap_or(""),
                        method_annotations: java::parse_annotations(node.capture("method_annotations").unwrap_or("")),
                        method_name: node.capture("method_name").unwrap_or(""),
                        params: node.capture("params").unwrap_or("()"),
                    };
                    handler.endpoints(&component.id)
                })
                .collect();
            vec![with_component(&component, endpoints)]
        };
        let fallback = |_: &Path, content: &str| -> anyhow::Result<Vec<Findings>> {
            Ok(vec![with_component(&component, endpoints_from_source(&component.id, content))])
        };

        let engine = TierEngine::new(self.id(), self.parser.as_ref(), extractor, fallback)
            .with_pre_filter(|p: &Path| !support::is_test_path(p));
        support::scan_files(self.id(), ctx, PATTERNS, &engine)
    }
}

impl Default for SpringRestScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for SpringRestScanner {
    fn id(&self) -> &'static str {
        "spring-rest-api"
    }

    fn display_name(&self) -> &'static str {
        "Spring REST API"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        50
    }

    fn applicability(&self) -> Applicability {
        Applicability::has_files("**/*.java").and(
            Applicability::has_any_dependency(&["spring-web", "spring-boot-starter-web"])
                .or(Applicability::file_contains("**/*.java", "@RestController"))
                .or(Applicability::file_contains("**/*.java", "@Controller")),
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

/// A controller method as seen by either tier.
struct Handler<'a> {
    class_annotations: Vec<Annotation>,
    class_name: &'a str,
    method_annotations: Vec<Annotation>,
    method_name: &'a str,
    params: &'a str,
}

impl Handler<'_> {
    fn is_controller(&self) -> bool {
        self.class_annotations
            .iter()
            .any(|a| CONTROLLER_ANNOTATIONS.contains(&a.name.as_str()))
    }

    fn endpoints(&self, component_id: &str) -> Vec<ApiEndpoint> {
        if !self.is_controller() {
            return Vec::new();
        }
        let Some(mapping) = self.method_annotations.iter().find(|a| http_methods(a).is_some()) else {
            return Vec::new();
        };

        let base = self
            .class_annotations
            .iter()
            .find(|a| a.name == "RequestMapping")
            .map(Annotation::path)
            .unwrap_or_default();
        let request_schema = request_schema(self.params);
        let description = format!("{}.{}", self.class_name, self.method_name);

        let mut endpoints = Vec::new();
        for method in http_methods(mapping).unwrap_or_default() {
            for path in mapping_paths(mapping) {
                let mut endpoint = ApiEndpoint::rest(component_id, &method, support::join_paths(&base, &path))
                    .with_description(description.clone());
                endpoint.request_schema = request_schema.clone();
                endpoints.push(endpoint);
            }
        }
        endpoints
    }
}

/// HTTP methods of a mapping annotation, `None` if it is not one.
fn http_methods(annotation: &Annotation) -> Option<Vec<String>> {
    let fixed = match annotation.name.as_str() {
        "GetMapping" => "GET",
        "PostMapping" => "POST",
        "PutMapping" => "PUT",
        "DeleteMapping" => "DELETE",
        "PatchMapping" => "PATCH",
        "RequestMapping" => {
            let methods: Vec<String> = annotation
                .attribute("method")
                .map(|v| {
                    v.trim_matches(|c| c == '{' || c == '}')
                        .split(',')
                        .map(|m| m.trim().trim_start_matches("RequestMethod.").to_uppercase())
                        .filter(|m| !m.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            return Some(if methods.is_empty() { vec!["GET".to_string()] } else { methods });
        }
        _ => return None,
    };
    Some(vec![fixed.to_string()])
}

/// `@GetMapping({"/a", "/b"})` maps two paths; no path maps the base path.
fn mapping_paths(annotation: &Annotation) -> Vec<String> {
    let mut paths = annotation.string_list("value");
    if paths.is_empty() {
        paths = annotation.string_list("path");
    }
    if paths.is_empty() {
        paths.push(String::new());
    }
    paths
}

/// `PathVariable:id:Long, RequestBody:order:Order` for the annotated
/// parameters, or `None` when there are none.
fn request_schema(params: &str) -> Option<String> {
    let inner = params.trim().trim_start_matches('(').trim_end_matches(')');
    let parts: Vec<String> = java::split_top_level(inner)
        .into_iter()
        .filter_map(|param| {
            let (annotations, _, rest) = java::leading_annotations(param);
            let kind = annotations
                .iter()
                .find(|a| PARAMETER_ANNOTATIONS.contains(&a.name.as_str()))?;
            let (param_type, name) = rest.trim().rsplit_once(char::is_whitespace)?;
            Some(format!("{}:{}:{}", kind.name, name.trim(), param_type.trim()))
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Tier 2.
fn endpoints_from_source(component_id: &str, content: &str) -> Vec<ApiEndpoint> {
    let source = java::read_source(content);
    let mut endpoints = Vec::new();
    for (class, class_name) in source.classes() {
        for member in source.members_of(class_name) {
            if let MemberKind::Method { name, params, .. } = &member.kind {
                let handler = Handler {
                    class_annotations: class.annotations.clone(),
                    class_name,
                    method_annotations: member.annotations.clone(),
                    method_name: name,
                    params,
                };
                endpoints.extend(handler.endpoints(component_id));
            }
        }
    }
    endpoints
}
