//! JPA entity scanner.
//!
//! Every `@Entity` class becomes a table-type data entity owned by the
//! project database component. Association fields (`@ManyToOne`, ...) are
//! kept as fields that reference the target entity.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

use super::java::{self, Annotation, MemberKind};
use super::support;
use crate::model::{Component, DataEntity, Field, Relationship, RelationshipType};
use crate::parser::{languages::java as java_queries, query_parser, AstNode, Grammar, StructuralParser};
use crate::scanner::{
    Applicability, Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine,
};

const PATTERNS: &[&str] = &["**/*.java"];
const ASSOCIATIONS: &[&str] = &["OneToOne", "OneToMany", "ManyToOne", "ManyToMany"];
const PRIMITIVES: &[&str] = &["int", "long", "short", "byte", "char", "boolean", "double", "float"];

lazy_static! {
    static ref COLLECTION: Regex =
        Regex::new(r"^(?:java\.util\.)?(?:List|Set|Collection|SortedSet)\s*<\s*([\w.]+)\s*>$").unwrap();
    static ref CAMEL_BOUNDARY: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
}

pub struct JpaScanner {
    parser: Box<dyn StructuralParser>,
}

impl JpaScanner {
    pub fn new() -> Self {
        Self {
            parser: query_parser(Grammar::Java, java_queries::ENTITY_FIELD_QUERY),
        }
    }

    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let database = support::database_component(ctx).with_technology("JPA");
        let service_id = support::project_component_id(ctx);

        let extractor = |_: &Path, nodes: &[AstNode]| -> Vec<Findings> {
            vec![to_findings(&database, entities_from_nodes(&database.id, nodes))]
        };
        let fallback = |_: &Path, content: &str| -> anyhow::Result<Vec<Findings>> {
            Ok(vec![to_findings(&database, entities_from_source(&database.id, content))])
        };

        let engine = TierEngine::new(self.id(), self.parser.as_ref(), extractor, fallback)
            .with_pre_filter(|p: &Path| !support::is_test_path(p));
        let files = ctx.find_files_any(PATTERNS)?;
        let (mut findings, stats) = support::run_engine(ctx, &files, &engine);
        if !findings.data_entities.is_empty() {
            findings.relationships.push(
                Relationship::new(service_id, database.id.clone(), RelationshipType::Uses)
                    .with_description("Persists entities")
                    .with_technology("JPA"),
            );
        }
        Ok(support::finish(self.id(), findings, stats))
    }
}

impl Default for JpaScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for JpaScanner {
    fn id(&self) -> &'static str {
        "jpa-entities"
    }

    fn display_name(&self) -> &'static str {
        "JPA Entities"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        60
    }

    fn applicability(&self) -> Applicability {
        Applicability::has_files("**/*.java").and(
            Applicability::has_any_dependency(&[
                "jakarta.persistence",
                "javax.persistence",
                "hibernate",
                "spring-boot-starter-data-jpa",
            ])
            .or(Applicability::file_contains("**/*.java", "@Entity")),
        )
    }

    fn scan(&self, ctx: &ScanContext) -> ScanResult {
        ScanResult::from_outcome(self.id(), self.try_scan(ctx))
    }
}

fn to_findings(database: &Component, entities: Vec<DataEntity>) -> Findings {
    let mut findings = Findings::new();
    if !entities.is_empty() {
        findings.components.push(database.clone());
    }
    findings.data_entities = entities;
    findings
}

/// A field as seen by either tier.
struct FieldDecl {
    annotations: Vec<Annotation>,
    modifiers: Vec<String>,
    field_type: String,
    name: String,
}

impl FieldDecl {
    fn has(&self, annotation: &str) -> bool {
        self.annotations.iter().any(|a| a.name == annotation)
    }

    fn get(&self, annotation: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == annotation)
    }

    fn is_persistent(&self) -> bool {
        !self.modifiers.iter().any(|m| m == "static" || m == "transient") && !self.has("Transient")
    }

    fn is_id(&self) -> bool {
        self.has("Id") || self.has("EmbeddedId")
    }

    fn is_nullable(&self) -> bool {
        let column_not_null = ["Column", "JoinColumn"].iter().any(|name| {
            self.get(name)
                .and_then(|a| a.attribute("nullable"))
                .map_or(false, |v| v == "false")
        });
        let optional_false = self
            .annotations
            .iter()
            .filter(|a| ASSOCIATIONS.contains(&a.name.as_str()))
            .any(|a| a.attribute("optional").as_deref() == Some("false"));
        !(self.is_id()
            || column_not_null
            || optional_false
            || self.has("NotNull")
            || self.has("NonNull")
            || PRIMITIVES.contains(&self.field_type.as_str()))
    }

    fn column_name(&self) -> String {
        self.get("Column")
            .or_else(|| self.get("JoinColumn"))
            .and_then(|a| a.string_attribute("name"))
            .unwrap_or_else(|| self.name.clone())
    }

    fn to_field(&self) -> Field {
        let field = Field::new(self.column_name(), self.field_type.clone(), self.is_nullable());
        match self.annotations.iter().find(|a| ASSOCIATIONS.contains(&a.name.as_str())) {
            Some(association) => field
                .with_description(association.name.clone())
                .with_references(table_name_for(target_type(&self.field_type))),
            None => field,
        }
    }
}

/// `List<Order>` → `Order`.
fn target_type(field_type: &str) -> &str {
    COLLECTION
        .captures(field_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(field_type)
        .rsplit('.')
        .next()
        .unwrap_or(field_type)
}

/// Default JPA table name for a class: `OrderLine` → `order_line`.
fn table_name_for(class_name: &str) -> String {
    CAMEL_BOUNDARY.replace_all(class_name, "${1}_${2}").to_lowercase()
}

fn build_entity(database_id: &str, class_annotations: &[Annotation], class_name: &str, fields: &[FieldDecl]) -> Option<DataEntity> {
    if !class_annotations.iter().any(|a| a.name == "Entity") {
        return None;
    }
    let table = class_annotations
        .iter()
        .find(|a| a.name == "Table")
        .and_then(|a| a.string_attribute("name"))
        .unwrap_or_else(|| table_name_for(class_name));

    let mut entity = DataEntity::table(database_id, table);
    entity.description = Some(format!("JPA entity {}", class_name));
    for field in fields.iter().filter(|f| f.is_persistent()) {
        let converted = field.to_field();
        if field.is_id() && entity.primary_key.is_none() {
            entity.primary_key = Some(converted.name.clone());
        }
        entity.fields.push(converted);
    }
    Some(entity)
}

/// Tier 1: one node per field, grouped back into classes.
fn entities_from_nodes(database_id: &str, nodes: &[AstNode]) -> Vec<DataEntity> {
    let mut classes: BTreeMap<(usize, &str), (Vec<Annotation>, Vec<FieldDecl>)> = BTreeMap::new();
    for node in nodes {
        let (Some(class_name), Some(field_type), Some(field_name)) =
            (node.capture("class_name"), node.capture("field_type"), node.capture("field_name"))
        else {
            continue;
        };
        let (annotations, modifiers, _) = java::leading_annotations(node.capture("field_annotations").unwrap_or(""));
        let entry = classes.entry((node.line, class_name)).or_insert_with(|| {
            (java::parse_annotations(node.capture("class_annotations").unwrap_or("")), Vec::new())
        });
        entry.1.push(FieldDecl {
            annotations,
            modifiers,
            field_type: field_type.to_string(),
            name: field_name.to_string(),
        });
    }

    classes
        .iter()
        .filter_map(|((_, class_name), (annotations, fields))| build_entity(database_id, annotations, class_name, fields))
        .collect()
}

/// Tier 2.
fn entities_from_source(database_id: &str, content: &str) -> Vec<DataEntity> {
    let source = java::read_source(content);
    source
        .classes()
        .filter_map(|(class, class_name)| {
            let fields: Vec<FieldDecl> = source
                .members_of(class_name)
                .filter_map(|member| match &member.kind {
                    MemberKind::Field { field_type, name } => Some(FieldDecl {
                        annotations: member.annotations.clone(),
                        modifiers: member.modifiers.clone(),
                        field_type: field_type.clone(),
                        name: name.clone(),
                    }),
                    _ => None,
                })
                .collect();
            build_entity(database_id, &class.annotations, class_name, &fields)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ENTITY: &str = r#"
package com.acme.orders;

import jakarta.persistence.*;

@Entity
@Table(name = "orders")
public class Order {
    private static final long serialVersionUID = 1L;

    @Id
    @GeneratedValue(strategy = GenerationType.IDENTITY)
    private Long id;

    @Column(name = "order_number", nullable = false, length = 32)
    private String number;

    private String notes;

    private int quantity;

    @Transient
    private String cached;

    @ManyToOne(optional = false)
    @JoinColumn(name = "customer_id")
    private Customer customer;

    @OneToMany(mappedBy = "order")
    private List<OrderLine> lines;
}

@Embeddable
class Address {
    private String street;
}
"#;

    fn check(entities: &[DataEntity]) {
        assert_eq!(entities.len(), 1);
        let order = &entities[0];
        assert_eq!(order.name, "orders");
        assert_eq!(order.primary_key.as_deref(), Some("id"));

        let names: Vec<_> = order.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "order_number", "notes", "quantity", "customer_id", "lines"]);

        let nullable: Vec<_> = order.fields.iter().map(|f| f.nullable).collect();
        assert_eq!(nullable, vec![false, false, true, false, false, true]);

        assert_eq!(order.fields[4].references.as_deref(), Some("customer"));
        assert_eq!(order.fields[4].description.as_deref(), Some("ManyToOne"));
        assert_eq!(order.fields[5].references.as_deref(), Some("order_line"));
    }

    #[test]
    fn test_fallback_entities() {
        check(&entities_from_source("db", ENTITY));
    }

    #[test]
    fn test_table_name_default() {
        assert_eq!(table_name_for("OrderLine"), "order_line");
        assert_eq!(table_name_for("Customer"), "customer");
        assert_eq!(target_type("java.util.Set<com.acme.Tag>"), "Tag");
    }

    #[test]
    fn test_scan_project() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Order.java"), ENTITY).unwrap();
        let ctx = ScanContext::new(temp.path()).with_project_name("shop");
        let scanner = JpaScanner::new();

        assert!(scanner.applies_to(&ctx));
        let result = scanner.scan(&ctx);
        assert!(result.success);
        check(&result.findings.data_entities);
        assert_eq!(result.findings.components.len(), 1);
        assert_eq!(result.findings.components[0].name, "shop database");
        assert_eq!(result.findings.relationships.len(), 1);
        assert_eq!(result.findings.relationships[0].technology.as_deref(), Some("JPA"));
    }

    #[test]
    #[cfg(feature = "tree-sitter")]
    fn test_structural_entities() {
        let parser = query_parser(Grammar::Java, java_queries::ENTITY_FIELD_QUERY);
        let nodes = parser.parse(ENTITY.as_bytes()).unwrap();
        check(&entities_from_nodes("db", &nodes));
    }
}
