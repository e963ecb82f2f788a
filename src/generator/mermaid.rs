//! Mermaid diagrams, each wrapped in a Markdown document with a fenced
//! ```` ```mermaid ```` block so they render on GitHub and GitLab.

use std::collections::HashSet;

use super::{sanitize_id, DiagramGenerator, DiagramType, GeneratedDiagram, GeneratorConfig, GeneratorError};
use crate::model::{ArchitectureModel, Component, ComponentType, DataEntity, Field};

const SUPPORTED: &[DiagramType] = &[
    DiagramType::C4Context,
    DiagramType::C4Container,
    DiagramType::C4Component,
    DiagramType::DependencyGraph,
    DiagramType::ErDiagram,
    DiagramType::MessageFlow,
    DiagramType::Sequence,
];

pub struct MermaidGenerator;

impl DiagramGenerator for MermaidGenerator {
    fn id(&self) -> &'static str {
        "mermaid"
    }

    fn display_name(&self) -> &'static str {
        "Mermaid Diagram Generator"
    }

    fn file_extension(&self) -> &'static str {
        "md"
    }

    fn supported_diagram_types(&self) -> &'static [DiagramType] {
        SUPPORTED
    }

    fn generate(
        &self,
        model: &ArchitectureModel,
        diagram: DiagramType,
        config: &GeneratorConfig,
    ) -> Result<GeneratedDiagram, GeneratorError> {
        let (title, body) = match diagram {
            DiagramType::C4Context => ("C4 Context Diagram", c4_context(model, config)),
            DiagramType::C4Container => ("C4 Container Diagram", c4_container(model)),
            DiagramType::C4Component => ("C4 Component Diagram", c4_component(model)),
            DiagramType::DependencyGraph => ("Dependency Graph", dependency_graph(model)),
            DiagramType::ErDiagram => ("Entity-Relationship Diagram", er_diagram(model)),
            DiagramType::MessageFlow => ("Message Flow Diagram", message_flow(model)),
            DiagramType::Sequence => ("API Sequence Diagram", sequence(model)),
            other => {
                return Err(GeneratorError::UnsupportedDiagramType {
                    generator: self.id().to_string(),
                    diagram: other,
                })
            }
        };
        tracing::debug!(generator = self.id(), diagram = %diagram, "rendered diagram");

        let mut content = format!("# {}\n\n```mermaid\n", title);
        if let Some(theme) = &config.theme {
            content.push_str(&format!("%%{{init: {{'theme': '{}'}}}}%%\n", theme));
        }
        content.push_str(&body);
        content.push_str("```\n");
        Ok(GeneratedDiagram::new(diagram.as_str(), content, self.file_extension()))
    }
}

/// Make text safe inside a quoted Mermaid label.
fn escape(text: &str) -> String {
    text.replace('"', "'").replace(['\n', '\r'], " ")
}

fn is_internal(component: &Component) -> bool {
    matches!(
        component.component_type,
        ComponentType::Service | ComponentType::Module | ComponentType::ApiGateway
    )
}

fn c4_element(component: &Component) -> &'static str {
    match component.component_type {
        ComponentType::Service | ComponentType::Module | ComponentType::ApiGateway => "System",
        ComponentType::Database => "SystemDb_Ext",
        ComponentType::MessageBroker => "SystemQueue_Ext",
        _ => "System_Ext",
    }
}

/// `Rel(...)` lines for relationships whose ends were both drawn.
fn c4_relationships(model: &ArchitectureModel, drawn: &HashSet<&str>, out: &mut String) {
    let mut first = true;
    for rel in &model.relationships {
        if !drawn.contains(rel.source_id.as_str()) || !drawn.contains(rel.target_id.as_str()) {
            continue;
        }
        if first {
            out.push('\n');
            first = false;
        }
        let label = rel
            .description
            .clone()
            .unwrap_or_else(|| rel.relationship_type.as_str().to_string());
        out.push_str(&format!(
            "  Rel({}, {}, \"{}\", \"{}\")\n",
            sanitize_id(&rel.source_id),
            sanitize_id(&rel.target_id),
            escape(&label),
            escape(rel.technology.as_deref().unwrap_or(""))
        ));
    }
}

fn c4_context(model: &ArchitectureModel, config: &GeneratorConfig) -> String {
    let mut out = format!("C4Context\n  title System Context Diagram for {}\n\n", escape(&model.project_name));
    let shown: Vec<&Component> = model
        .components
        .iter()
        .filter(|c| config.include_external || is_internal(c))
        .collect();
    if shown.is_empty() {
        out.push_str("  System(placeholder, \"No components found\", \"\")\n");
        return out;
    }

    for component in &shown {
        let description = component
            .description
            .as_deref()
            .or(component.technology.as_deref())
            .unwrap_or("");
        out.push_str(&format!(
            "  {}({}, \"{}\", \"{}\")\n",
            c4_element(component),
            sanitize_id(&component.id),
            escape(&component.name),
            escape(description)
        ));
    }
    let drawn: HashSet<&str> = shown.iter().map(|c| c.id.as_str()).collect();
    c4_relationships(model, &drawn, &mut out);
    out
}

fn c4_container(model: &ArchitectureModel) -> String {
    let mut out = format!("C4Container\n  title Container Diagram for {}\n\n", escape(&model.project_name));
    if model.components.is_empty() {
        out.push_str("  Container(placeholder, \"No components found\", \"\", \"\")\n");
        return out;
    }

    for component in &model.components {
        let element = match component.component_type {
            ComponentType::Database => "ContainerDb",
            ComponentType::MessageBroker => "ContainerQueue",
            _ => "Container",
        };
        out.push_str(&format!(
            "  {}({}, \"{}\", \"{}\", \"{}\")\n",
            element,
            sanitize_id(&component.id),
            escape(&component.name),
            escape(component.technology.as_deref().unwrap_or("")),
            escape(component.description.as_deref().unwrap_or(""))
        ));
    }
    let drawn: HashSet<&str> = model.components.iter().map(|c| c.id.as_str()).collect();
    c4_relationships(model, &drawn, &mut out);
    out
}

/// Components of the project with the endpoints and entities they own.
fn c4_component(model: &ArchitectureModel) -> String {
    let mut out = format!("C4Component\n  title Component Diagram for {}\n\n", escape(&model.project_name));
    if model.components.is_empty() {
        out.push_str("  Component(placeholder, \"No components found\", \"\", \"\")\n");
        return out;
    }

    for component in &model.components {
        let endpoints = model.endpoints_for(&component.id).count();
        let entities = model.data_entities.iter().filter(|e| e.component_id == component.id).count();
        let mut description = component
            .description
            .clone()
            .unwrap_or_else(|| component.component_type.to_string());
        if endpoints > 0 || entities > 0 {
            description = format!("{} ({} endpoints, {} entities)", description, endpoints, entities);
        }
        out.push_str(&format!(
            "  Component({}, \"{}\", \"{}\", \"{}\")\n",
            sanitize_id(&component.id),
            escape(&component.name),
            escape(component.technology.as_deref().unwrap_or("")),
            escape(&description)
        ));
    }
    let drawn: HashSet<&str> = model.components.iter().map(|c| c.id.as_str()).collect();
    c4_relationships(model, &drawn, &mut out);
    out
}

fn dependency_graph(model: &ArchitectureModel) -> String {
    let mut out = String::from("graph LR\n");
    if model.components.is_empty() && model.dependencies.is_empty() {
        out.push_str("  A[No dependencies found]\n");
        return out;
    }

    let mut nodes = HashSet::new();
    for component in &model.components {
        let node = sanitize_id(&component.id);
        out.push_str(&format!("  {}[\"{}\"]\n", node, escape(&component.name)));
        nodes.insert(node);
    }

    for dep in &model.dependencies {
        let source = sanitize_id(&dep.source_component_id);
        if nodes.insert(source.clone()) {
            out.push_str(&format!("  {}[\"{}\"]\n", source, escape(&dep.source_component_id)));
        }
        let target = format!("dep_{}", sanitize_id(&format!("{}_{}", dep.group_id, dep.artifact_id)));
        if nodes.insert(target.clone()) {
            out.push_str(&format!("  {}([\"{}\"])\n", target, escape(&dep.artifact_id)));
        }
        match &dep.version {
            Some(version) => out.push_str(&format!("  {} -->|\"{}\"| {}\n", source, escape(version), target)),
            None => out.push_str(&format!("  {} --> {}\n", source, target)),
        }
    }

    for rel in &model.relationships {
        out.push_str(&format!(
            "  {} -.->|\"{}\"| {}\n",
            sanitize_id(&rel.source_id),
            rel.relationship_type.as_str(),
            sanitize_id(&rel.target_id)
        ));
    }
    out
}

fn table_name(name: &str) -> String {
    sanitize_id(name).to_uppercase()
}

/// Mermaid ER attribute types must be single words: `VARCHAR(255)` becomes
/// `VARCHAR`, `List<Order>` becomes `List_Order`.
fn attribute_type(data_type: &str) -> String {
    let base = data_type.split('(').next().unwrap_or("").trim();
    let cleaned = sanitize_id(base).trim_matches('_').to_string();
    if cleaned.is_empty() {
        "string".to_string()
    } else {
        cleaned
    }
}

fn attribute_keys(entity: &DataEntity, field: &Field) -> &'static str {
    let pk = entity.primary_key.as_deref() == Some(field.name.as_str());
    match (pk, field.references.is_some()) {
        (true, true) => " PK, FK",
        (true, false) => " PK",
        (false, true) => " FK",
        (false, false) => "",
    }
}

/// Entity a field points at: its explicit reference, otherwise a
/// `customer_id` / `customerId` naming match against known entities.
fn referenced_entity<'a>(model: &'a ArchitectureModel, field: &Field) -> Option<&'a DataEntity> {
    let matches = |candidate: &str| {
        model.data_entities.iter().find(|e| {
            let name = e.name.to_lowercase();
            name == candidate || name == format!("{}s", candidate)
        })
    };
    if let Some(target) = &field.references {
        return matches(&target.to_lowercase());
    }
    let stem = field
        .name
        .strip_suffix("_id")
        .or_else(|| field.name.strip_suffix("Id"))
        .filter(|s| !s.is_empty())?;
    matches(&stem.to_lowercase())
}

fn er_diagram(model: &ArchitectureModel) -> String {
    let mut out = String::from("erDiagram\n");
    if model.data_entities.is_empty() {
        out.push_str("  PLACEHOLDER {\n    string note \"No data entities found\"\n  }\n");
        return out;
    }

    for entity in &model.data_entities {
        out.push_str(&format!("  {} {{\n", table_name(&entity.name)));
        if entity.fields.is_empty() {
            out.push_str("    string placeholder \"No fields defined\"\n");
        }
        for field in &entity.fields {
            let comment = field
                .description
                .as_deref()
                .map(|d| format!(" \"{}\"", escape(d)))
                .unwrap_or_default();
            out.push_str(&format!(
                "    {} {}{}{}\n",
                attribute_type(&field.data_type),
                sanitize_id(&field.name),
                attribute_keys(entity, field),
                comment
            ));
        }
        out.push_str("  }\n");
    }

    let mut seen = HashSet::new();
    for entity in &model.data_entities {
        for field in &entity.fields {
            let Some(target) = referenced_entity(model, field) else {
                continue;
            };
            let line = format!(
                "  {} ||--o{{ {} : \"{}\"\n",
                table_name(&target.name),
                table_name(&entity.name),
                escape(&field.name)
            );
            if seen.insert(line.clone()) {
                out.push_str(&line);
            }
        }
    }
    out
}

fn message_flow(model: &ArchitectureModel) -> String {
    let mut out = String::from("graph TB\n");
    if model.message_flows.is_empty() {
        out.push_str("  A[No message flows found]\n");
        return out;
    }

    let mut nodes = HashSet::new();
    for flow in &model.message_flows {
        for component in [&flow.publisher_component_id, &flow.subscriber_component_id].into_iter().flatten() {
            let node = sanitize_id(component);
            if nodes.insert(node.clone()) {
                out.push_str(&format!("  {}[\"{}\"]\n", node, escape(model.component_name(component))));
            }
        }
        let topic = format!("topic_{}", sanitize_id(&flow.topic));
        if nodes.insert(topic.clone()) {
            out.push_str(&format!("  {}{{{{\"{}\"}}}}\n", topic, escape(&flow.topic)));
        }
    }

    out.push('\n');
    for flow in &model.message_flows {
        let topic = format!("topic_{}", sanitize_id(&flow.topic));
        if let Some(publisher) = &flow.publisher_component_id {
            let label = flow.message_type.as_deref().unwrap_or("message");
            out.push_str(&format!("  {} -->|\"{}\"| {}\n", sanitize_id(publisher), escape(label), topic));
        }
        if let Some(subscriber) = &flow.subscriber_component_id {
            out.push_str(&format!("  {} --> {}\n", topic, sanitize_id(subscriber)));
        }
    }
    out
}

fn sequence(model: &ArchitectureModel) -> String {
    let mut out = String::from("sequenceDiagram\n");
    if model.api_endpoints.is_empty() {
        out.push_str("  participant Client\n  participant System\n  Note over Client,System: No API endpoints found\n");
        return out;
    }

    out.push_str("  participant Client\n");
    let mut participants = HashSet::new();
    for endpoint in &model.api_endpoints {
        if participants.insert(endpoint.component_id.as_str()) {
            out.push_str(&format!(
                "  participant {} as {}\n",
                sanitize_id(&endpoint.component_id),
                escape(model.component_name(&endpoint.component_id))
            ));
        }
    }

    out.push('\n');
    for endpoint in &model.api_endpoints {
        let participant = sanitize_id(&endpoint.component_id);
        let method = endpoint.method.as_deref().unwrap_or("CALL");
        out.push_str(&format!("  Client->>{}: {} {}\n", participant, method, escape(&endpoint.path)));
        if let Some(description) = &endpoint.description {
            out.push_str(&format!("  Note over {}: {}\n", participant, escape(description)));
        }
        out.push_str(&format!("  {}-->>Client: Response\n", participant));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApiEndpoint, Dependency, MessageFlow, Relationship, RelationshipType};

    fn shop() -> ArchitectureModel {
        let mut model = ArchitectureModel::new("shop");
        model.components.push(
            Component::new("svc1", "orders", ComponentType::Service).with_description("Order service"),
        );
        model.components.push(Component::new("db1", "orders-db", ComponentType::Database).with_technology("SQL"));
        model.components.push(Component::new("ext1", "Stripe", ComponentType::External));
        model.relationships.push(
            Relationship::new("svc1", "db1", RelationshipType::WritesTo).with_technology("JDBC"),
        );
        model.relationships.push(Relationship::new("svc1", "ghost", RelationshipType::Calls));
        model
    }

    fn render(model: &ArchitectureModel, diagram: DiagramType) -> String {
        MermaidGenerator
            .generate(model, diagram, &GeneratorConfig::default())
            .unwrap()
            .content
    }

    #[test]
    fn test_rejects_api_catalog() {
        let err = MermaidGenerator
            .generate(&shop(), DiagramType::ApiCatalog, &GeneratorConfig::default())
            .unwrap_err();
        assert!(matches!(err, GeneratorError::UnsupportedDiagramType { diagram: DiagramType::ApiCatalog, .. }));
    }

    #[test]
    fn test_c4_context() {
        let content = render(&shop(), DiagramType::C4Context);
        assert!(content.starts_with("# C4 Context Diagram\n\n```mermaid\nC4Context\n"));
        assert!(content.contains("  System(svc1, \"orders\", \"Order service\")"));
        assert!(content.contains("  SystemDb_Ext(db1, \"orders-db\", \"SQL\")"));
        assert!(content.contains("  Rel(svc1, db1, \"writes to\", \"JDBC\")"));
        // Relationships to undrawn components are not rendered.
        assert!(!content.contains("ghost"));
        assert!(content.ends_with("```\n"));
    }

    #[test]
    fn test_c4_context_without_externals() {
        let config = GeneratorConfig {
            include_external: false,
            theme: Some("dark".into()),
            ..Default::default()
        };
        let content = MermaidGenerator.generate(&shop(), DiagramType::C4Context, &config).unwrap().content;
        assert!(content.contains("%%{init: {'theme': 'dark'}}%%"));
        assert!(!content.contains("Stripe"));
        assert!(!content.contains("Rel("));
    }

    #[test]
    fn test_empty_model_placeholders() {
        let empty = ArchitectureModel::new("empty");
        assert!(render(&empty, DiagramType::C4Context).contains("No components found"));
        assert!(render(&empty, DiagramType::DependencyGraph).contains("No dependencies found"));
        assert!(render(&empty, DiagramType::ErDiagram).contains("No data entities found"));
        assert!(render(&empty, DiagramType::MessageFlow).contains("No message flows found"));
        assert!(render(&empty, DiagramType::Sequence).contains("No API endpoints found"));
    }

    #[test]
    fn test_dependency_graph() {
        let mut model = shop();
        model.dependencies.push(
            Dependency::new("svc1", "org.postgresql", "postgresql").with_version(Some("42.7.1".into())),
        );
        model.dependencies.push(Dependency::new("svc1", "npm", "left-pad"));
        let content = render(&model, DiagramType::DependencyGraph);
        assert!(content.contains("  dep_org_postgresql_postgresql([\"postgresql\"])"));
        assert!(content.contains("  svc1 -->|\"42.7.1\"| dep_org_postgresql_postgresql"));
        assert!(content.contains("  svc1 --> dep_npm_left_pad"));
        assert!(content.contains("  svc1 -.->|"));
    }

    #[test]
    fn test_er_diagram_uses_references_and_keys() {
        let mut model = ArchitectureModel::new("shop");
        let mut customers = DataEntity::table("db1", "customers");
        customers.primary_key = Some("id".into());
        customers.fields.push(Field::new("id", "BIGINT", false));
        let mut orders = DataEntity::table("db1", "orders");
        orders.primary_key = Some("id".into());
        orders.fields.push(Field::new("id", "BIGINT", false));
        orders.fields.push(Field::new("buyer", "BIGINT", true).with_references("customers"));
        orders.fields.push(Field::new("total", "DECIMAL(10,2)", false).with_description("Gross \"total\""));
        model.data_entities.push(customers);
        model.data_entities.push(orders);

        let content = render(&model, DiagramType::ErDiagram);
        assert!(content.contains("  ORDERS {\n    BIGINT id PK\n    BIGINT buyer FK\n    DECIMAL total \"Gross 'total'\"\n  }"));
        assert!(content.contains("  CUSTOMERS ||--o{ ORDERS : \"buyer\""));
    }

    #[test]
    fn test_er_diagram_infers_relationship_from_naming() {
        let mut model = ArchitectureModel::new("shop");
        model.data_entities.push(DataEntity::table("db1", "Customer"));
        let mut order = DataEntity::table("db1", "Order");
        order.fields.push(Field::new("customerId", "Long", true));
        model.data_entities.push(order);

        let content = render(&model, DiagramType::ErDiagram);
        assert!(content.contains("  CUSTOMER {\n    string placeholder \"No fields defined\"\n  }"));
        assert!(content.contains("  CUSTOMER ||--o{ ORDER : \"customerId\""));
    }

    #[test]
    fn test_message_flow() {
        let mut model = shop();
        model.message_flows.push(
            MessageFlow::published("svc1", "orders.created").with_message_type(Some("OrderCreated".into())),
        );
        model.message_flows.push(MessageFlow::subscribed("billing", "orders.created"));
        let content = render(&model, DiagramType::MessageFlow);
        assert!(content.contains("  svc1[\"orders\"]"));
        assert!(content.contains("  billing[\"billing\"]"));
        assert_eq!(content.matches("topic_orders_created{{\"orders.created\"}}").count(), 1);
        assert!(content.contains("  svc1 -->|\"OrderCreated\"| topic_orders_created"));
        assert!(content.contains("  topic_orders_created --> billing"));
    }

    #[test]
    fn test_sequence() {
        let mut model = shop();
        model.api_endpoints.push(ApiEndpoint::rest("svc1", "get", "/orders/{id}").with_description("orders.get"));
        model.api_endpoints.push(ApiEndpoint::rest("svc1", "POST", "/orders"));
        let content = render(&model, DiagramType::Sequence);
        assert_eq!(content.matches("participant svc1 as orders").count(), 1);
        assert!(content.contains("  Client->>svc1: GET /orders/{id}\n  Note over svc1: orders.get\n  svc1-->>Client: Response"));
        assert!(content.contains("  Client->>svc1: POST /orders"));
    }

    #[test]
    fn test_attribute_type() {
        assert_eq!(attribute_type("VARCHAR(255)"), "VARCHAR");
        assert_eq!(attribute_type("List<Order>"), "List_Order");
        assert_eq!(attribute_type(""), "string");
    }
}
