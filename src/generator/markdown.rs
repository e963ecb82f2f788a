//! Markdown catalogs: tables of endpoints, components, dependencies, data
//! entities and message topics, plus the `index.md` that links everything.

use super::{group_by, DiagramGenerator, DiagramType, GeneratedDiagram, GeneratorConfig, GeneratorError};
use crate::model::{ArchitectureModel, QualityReport};

const SUPPORTED: &[DiagramType] = &[
    DiagramType::ApiCatalog,
    DiagramType::C4Component,
    DiagramType::DependencyGraph,
    DiagramType::ErDiagram,
    DiagramType::MessageFlow,
];

const DASH: &str = "-";

pub struct MarkdownGenerator;

impl DiagramGenerator for MarkdownGenerator {
    fn id(&self) -> &'static str {
        "markdown"
    }

    fn display_name(&self) -> &'static str {
        "Markdown Documentation Generator"
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
        _config: &GeneratorConfig,
    ) -> Result<GeneratedDiagram, GeneratorError> {
        let (name, content) = match diagram {
            DiagramType::ApiCatalog => ("api-catalog", api_catalog(model)),
            DiagramType::C4Component => ("component-catalog", component_catalog(model)),
            DiagramType::DependencyGraph => ("dependency-matrix", dependency_matrix(model)),
            DiagramType::ErDiagram => ("data-catalog", data_catalog(model)),
            DiagramType::MessageFlow => ("message-flows", message_flow_catalog(model)),
            other => {
                return Err(GeneratorError::UnsupportedDiagramType {
                    generator: self.id().to_string(),
                    diagram: other,
                })
            }
        };
        tracing::debug!(generator = self.id(), diagram = %diagram, "rendered document");
        Ok(GeneratedDiagram::new(name, content, self.file_extension()))
    }
}

/// Make text safe inside a table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).map(cell).unwrap_or_else(|| DASH.to_string())
}

fn table_header(out: &mut String, columns: &[&str]) {
    out.push_str(&format!("| {} |\n", columns.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(columns.len())));
}

fn table_row(out: &mut String, cells: &[String]) {
    out.push_str(&format!("| {} |\n", cells.join(" | ")));
}

/// `# Title` followed by a "nothing found" line when `empty`.
fn heading(out: &mut String, title: &str, empty: bool, what: &str) -> bool {
    out.push_str(&format!("# {}\n\n", title));
    if empty {
        out.push_str(&format!("No {} found in the system.\n", what));
    }
    empty
}

fn api_catalog(model: &ArchitectureModel) -> String {
    let mut out = String::new();
    if heading(&mut out, "API Catalog", model.api_endpoints.is_empty(), "API endpoints") {
        return out;
    }

    for (component_id, endpoints) in group_by(&model.api_endpoints, |e| e.component_id.clone()) {
        out.push_str(&format!("## {}\n\n", model.component_name(&component_id)));
        table_header(&mut out, &["Method", "Path", "Type", "Authentication", "Description"]);
        for endpoint in endpoints {
            table_row(
                &mut out,
                &[
                    or_dash(endpoint.method.as_deref()),
                    format!("`{}`", cell(&endpoint.path)),
                    endpoint.api_type.as_str().to_string(),
                    endpoint.authentication.as_deref().map(cell).unwrap_or_else(|| "None".to_string()),
                    or_dash(endpoint.description.as_deref()),
                ],
            );
        }
        out.push('\n');
    }
    out
}

fn component_catalog(model: &ArchitectureModel) -> String {
    let mut out = String::new();
    if heading(&mut out, "Component Catalog", model.components.is_empty(), "components") {
        return out;
    }

    let mut by_type = group_by(&model.components, |c| c.component_type);
    by_type.sort_by_key(|(kind, _)| *kind);
    for (kind, components) in by_type {
        out.push_str(&format!("## {}\n\n", kind.as_str().replace('_', " ")));
        table_header(&mut out, &["Name", "Technology", "Repository", "Description"]);
        for component in components {
            table_row(
                &mut out,
                &[
                    cell(&component.name),
                    or_dash(component.technology.as_deref()),
                    or_dash(component.repository.as_deref()),
                    or_dash(component.description.as_deref()),
                ],
            );
        }
        out.push('\n');
    }

    out.push_str("## Component Details\n");
    for component in &model.components {
        out.push_str(&format!("\n### {}\n\n", component.name));
        out.push_str(&format!("- **Type:** {}\n", component.component_type));
        if let Some(technology) = &component.technology {
            out.push_str(&format!("- **Technology:** {}\n", technology));
        }
        if let Some(description) = &component.description {
            out.push_str(&format!("- **Description:** {}\n", description));
        }
        if !component.metadata.is_empty() {
            out.push_str("- **Metadata:**\n");
            for (key, value) in &component.metadata {
                out.push_str(&format!("  - {}: {}\n", key, value));
            }
        }
        let endpoints = model.endpoints_for(&component.id).count();
        if endpoints > 0 {
            out.push_str(&format!("- **Exposed APIs:** {} endpoint(s)\n", endpoints));
        }
        let entities = model.data_entities.iter().filter(|e| e.component_id == component.id).count();
        if entities > 0 {
            out.push_str(&format!("- **Data Entities:** {} entity/entities\n", entities));
        }
    }
    out
}

fn dependency_matrix(model: &ArchitectureModel) -> String {
    let mut out = String::new();
    if heading(&mut out, "Dependency Matrix", model.dependencies.is_empty(), "external dependencies") {
        return out;
    }

    for (component_id, deps) in group_by(&model.dependencies, |d| d.source_component_id.clone()) {
        out.push_str(&format!("## {}\n\n", model.component_name(&component_id)));
        table_header(&mut out, &["Group", "Artifact", "Version", "Scope", "Type"]);
        for dep in deps {
            table_row(
                &mut out,
                &[
                    or_dash(Some(dep.group_id.as_str())),
                    cell(&dep.artifact_id),
                    or_dash(dep.version.as_deref()),
                    cell(&dep.scope),
                    if dep.direct { "Direct" } else { "Transitive" }.to_string(),
                ],
            );
        }
        out.push('\n');
    }

    let direct = model.dependencies.iter().filter(|d| d.direct).count();
    out.push_str("## Dependency Summary\n\n");
    table_header(&mut out, &["Metric", "Count"]);
    table_row(&mut out, &["Total Dependencies".into(), model.dependencies.len().to_string()]);
    table_row(&mut out, &["Direct Dependencies".into(), direct.to_string()]);
    table_row(
        &mut out,
        &["Transitive Dependencies".into(), (model.dependencies.len() - direct).to_string()],
    );
    out
}

fn data_catalog(model: &ArchitectureModel) -> String {
    let mut out = String::new();
    if heading(&mut out, "Data Entity Catalog", model.data_entities.is_empty(), "data entities") {
        return out;
    }

    for entity in &model.data_entities {
        out.push_str(&format!("## {}\n\n", entity.name));
        if let Some(description) = &entity.description {
            out.push_str(&format!("{}\n\n", description));
        }
        out.push_str(&format!("- **Type:** {}\n", entity.entity_type.as_deref().unwrap_or("table")));
        if let Some(pk) = &entity.primary_key {
            out.push_str(&format!("- **Primary Key:** {}\n", pk));
        }
        out.push_str(&format!("- **Component:** {}\n\n", model.component_name(&entity.component_id)));

        if entity.fields.is_empty() {
            continue;
        }
        table_header(&mut out, &["Field", "Data Type", "Nullable", "References", "Description"]);
        for field in &entity.fields {
            table_row(
                &mut out,
                &[
                    cell(&field.name),
                    format!("`{}`", cell(&field.data_type)),
                    if field.nullable { "Yes" } else { "No" }.to_string(),
                    or_dash(field.references.as_deref()),
                    or_dash(field.description.as_deref()),
                ],
            );
        }
        out.push('\n');
    }
    out
}

fn message_flow_catalog(model: &ArchitectureModel) -> String {
    let mut out = String::new();
    if heading(&mut out, "Message Flow Catalog", model.message_flows.is_empty(), "message flows") {
        return out;
    }

    for (topic, flows) in group_by(&model.message_flows, |f| f.topic.clone()) {
        let broker = flows.iter().find_map(|f| f.broker.as_deref()).unwrap_or("Unknown");
        out.push_str(&format!("## {}\n\n**Broker:** {}\n\n", topic, broker));
        table_header(&mut out, &["Publisher", "Subscriber", "Message Type", "Schema"]);
        for flow in flows {
            let name = |id: &Option<String>| or_dash(id.as_deref().map(|id| model.component_name(id)));
            table_row(
                &mut out,
                &[
                    name(&flow.publisher_component_id),
                    name(&flow.subscriber_component_id),
                    or_dash(flow.message_type.as_deref()),
                    or_dash(flow.schema.as_deref()),
                ],
            );
        }
        out.push('\n');
    }
    out
}

/// The `index.md` landing page: model statistics, scan quality when known,
/// and a link to every written file.
pub fn index_document(model: &ArchitectureModel, quality: Option<&QualityReport>, files: &[String]) -> String {
    let mut out = format!("# {} - Architecture Documentation\n\n", model.project_name);
    out.push_str(&format!(
        "This documentation provides a generated view of the {} architecture.\n\n",
        model.project_name
    ));

    out.push_str("## Architecture Statistics\n\n");
    table_header(&mut out, &["Metric", "Count"]);
    for (label, count) in [
        ("Components", model.components.len()),
        ("Dependencies", model.dependencies.len()),
        ("API Endpoints", model.api_endpoints.len()),
        ("Data Entities", model.data_entities.len()),
        ("Message Flows", model.message_flows.len()),
        ("Relationships", model.relationships.len()),
    ] {
        table_row(&mut out, &[label.to_string(), count.to_string()]);
    }

    if let Some(quality) = quality {
        out.push_str("\n## Scan Quality\n\n");
        out.push_str(&format!(
            "{} of {} files analyzed by {} scanner(s), {} failed.\n",
            quality.files_analyzed, quality.total_files, quality.scanners_run, quality.scanners_failed
        ));
        if !quality.gaps.is_empty() {
            out.push('\n');
            for gap in &quality.gaps {
                out.push_str(&format!("- **{}** `{}`: {}\n", gap.severity, gap.scanner_id, gap.message));
            }
        }
    }

    out.push_str("\n## Diagrams\n\n");
    if files.is_empty() {
        out.push_str("No diagrams were generated.\n");
    }
    for file in files {
        let title = file.rsplit_once('.').map_or(file.as_str(), |(stem, _)| stem);
        out.push_str(&format!("- [{}]({})\n", title, file));
    }
    out
}
