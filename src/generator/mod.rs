//! Diagram generators: render an [`ArchitectureModel`] as text.
//!
//! A generator supports a fixed set of [`DiagramType`]s and rejects the rest
//! with [`GeneratorError::UnsupportedDiagramType`]. Generators never fail on
//! an empty model; they emit a placeholder instead.

mod markdown;
mod mermaid;

pub use markdown::{index_document, MarkdownGenerator};
pub use mermaid::MermaidGenerator;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::GeneratorsConfig;
use crate::model::ArchitectureModel;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("generator '{generator}' does not support diagram type {diagram}")]
    UnsupportedDiagramType { generator: String, diagram: DiagramType },

    #[error("unknown diagram type '{0}' (available: {1})")]
    UnknownDiagramType(String, String),

    #[error("unknown generator '{0}'")]
    UnknownGenerator(String),
}

/// Kinds of diagram or document a generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramType {
    C4Context,
    C4Container,
    C4Component,
    DependencyGraph,
    ErDiagram,
    MessageFlow,
    ApiCatalog,
    Deployment,
    Sequence,
}

impl DiagramType {
    pub const ALL: &'static [DiagramType] = &[
        DiagramType::C4Context,
        DiagramType::C4Container,
        DiagramType::C4Component,
        DiagramType::DependencyGraph,
        DiagramType::ErDiagram,
        DiagramType::MessageFlow,
        DiagramType::ApiCatalog,
        DiagramType::Deployment,
        DiagramType::Sequence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramType::C4Context => "c4-context",
            DiagramType::C4Container => "c4-container",
            DiagramType::C4Component => "c4-component",
            DiagramType::DependencyGraph => "dependency-graph",
            DiagramType::ErDiagram => "er-diagram",
            DiagramType::MessageFlow => "message-flow",
            DiagramType::ApiCatalog => "api-catalog",
            DiagramType::Deployment => "deployment",
            DiagramType::Sequence => "sequence",
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramType {
    type Err = GeneratorError;

    /// Accepts `er-diagram`, `er_diagram` and `ER_DIAGRAM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        DiagramType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                let available: Vec<_> = DiagramType::ALL.iter().map(|t| t.as_str()).collect();
                GeneratorError::UnknownDiagramType(s.to_string(), available.join(", "))
            })
    }
}

/// Rendering options shared by all generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub theme: Option<String>,
    pub include_external: bool,
    /// Free-form generator settings.
    pub settings: BTreeMap<String, String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            theme: None,
            include_external: true,
            settings: BTreeMap::new(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_config(config: &GeneratorsConfig) -> Self {
        Self {
            theme: config.theme.clone(),
            include_external: config.include_external,
            settings: BTreeMap::new(),
        }
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// One rendered diagram or document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedDiagram {
    pub name: String,
    pub content: String,
    pub file_extension: String,
}

impl GeneratedDiagram {
    pub fn new(name: impl Into<String>, content: impl Into<String>, file_extension: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            file_extension: file_extension.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.file_extension)
    }
}

/// Diagram generator contract.
pub trait DiagramGenerator: Send + Sync {
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;

    fn supported_diagram_types(&self) -> &'static [DiagramType];

    fn supports(&self, diagram: DiagramType) -> bool {
        self.supported_diagram_types().contains(&diagram)
    }

    fn generate(
        &self,
        model: &ArchitectureModel,
        diagram: DiagramType,
        config: &GeneratorConfig,
    ) -> Result<GeneratedDiagram, GeneratorError>;
}

/// Every built-in generator.
pub fn builtin() -> Vec<Box<dyn DiagramGenerator>> {
    vec![Box::new(MermaidGenerator), Box::new(MarkdownGenerator)]
}

pub fn by_id(id: &str) -> Option<Box<dyn DiagramGenerator>> {
    builtin().into_iter().find(|g| g.id() == id)
}

/// Resolve generator ids and check that every requested diagram type is
/// supported by at least one of them.
pub fn resolve(
    generator_ids: &[String],
    diagrams: &[DiagramType],
) -> Result<Vec<Box<dyn DiagramGenerator>>, GeneratorError> {
    let generators = generator_ids
        .iter()
        .map(|id| by_id(id).ok_or_else(|| GeneratorError::UnknownGenerator(id.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(diagram) = diagrams
        .iter()
        .find(|d| !generators.iter().any(|g| g.supports(**d)))
    {
        return Err(GeneratorError::UnsupportedDiagramType {
            generator: generator_ids.join(", "),
            diagram: *diagram,
        });
    }
    Ok(generators)
}

/// Render every requested diagram with every enabled generator that supports
/// it. An empty `diagrams` list means everything each generator supports; a
/// requested type no enabled generator supports is an error.
pub fn render_all(
    model: &ArchitectureModel,
    generator_ids: &[String],
    diagrams: &[DiagramType],
    config: &GeneratorConfig,
) -> Result<Vec<GeneratedDiagram>, GeneratorError> {
    let mut rendered = Vec::new();
    for generator in resolve(generator_ids, diagrams)? {
        let wanted: Vec<DiagramType> = if diagrams.is_empty() {
            generator.supported_diagram_types().to_vec()
        } else {
            diagrams.iter().copied().filter(|d| generator.supports(*d)).collect()
        };
        for diagram in wanted {
            rendered.push(generator.generate(model, diagram, config)?);
        }
    }
    Ok(rendered)
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub(crate) fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Items grouped by key, groups in order of first appearance.
pub(crate) fn group_by<'a, T, K, F>(items: &'a [T], key: F) -> Vec<(K, Vec<&'a T>)>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();
    for item in items {
        let k = key(item);
        match groups.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, members)) => members.push(item),
            None => groups.push((k, vec![item])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagram_type_parsing() {
        assert_eq!("er-diagram".parse::<DiagramType>().unwrap(), DiagramType::ErDiagram);
        assert_eq!("C4_CONTEXT".parse::<DiagramType>().unwrap(), DiagramType::C4Context);
        let err = "gantt".parse::<DiagramType>().unwrap_err();
        assert!(err.to_string().contains("gantt"));
        assert!(err.to_string().contains("sequence"));
    }

    #[test]
    fn test_every_type_has_a_generator_except_deployment() {
        let generators = builtin();
        for diagram in DiagramType::ALL {
            let supported = generators.iter().any(|g| g.supports(*diagram));
            assert_eq!(supported, *diagram != DiagramType::Deployment, "{}", diagram);
        }
    }

    #[test]
    fn test_render_all_routes_types_to_supporting_generators() {
        let model = ArchitectureModel::new("shop");
        let ids = vec!["mermaid".to_string(), "markdown".to_string()];
        let rendered = render_all(&model, &ids, &[DiagramType::Sequence, DiagramType::ApiCatalog], &GeneratorConfig::default()).unwrap();
        let names: Vec<_> = rendered.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["sequence", "api-catalog"]);
    }

    #[test]
    fn test_render_all_rejects_types_no_generator_supports() {
        let model = ArchitectureModel::new("shop");
        let both = vec!["mermaid".to_string(), "markdown".to_string()];
        let err = render_all(&model, &both, &[DiagramType::Deployment], &GeneratorConfig::default()).unwrap_err();
        assert_eq!(
            err,
            GeneratorError::UnsupportedDiagramType {
                generator: "mermaid, markdown".into(),
                diagram: DiagramType::Deployment,
            }
        );

        let mermaid = vec!["mermaid".to_string()];
        let err = render_all(&model, &mermaid, &[DiagramType::Sequence, DiagramType::ApiCatalog], &GeneratorConfig::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "generator 'mermaid' does not support diagram type api-catalog");
    }

    #[test]
    fn test_render_all_rejects_unknown_generator() {
        let model = ArchitectureModel::new("shop");
        let err = render_all(&model, &["plantuml".to_string()], &[], &GeneratorConfig::default()).unwrap_err();
        assert_eq!(err, GeneratorError::UnknownGenerator("plantuml".into()));
    }

    #[test]
    fn test_default_rendering_has_unique_file_names() {
        let model = ArchitectureModel::new("shop");
        let ids = vec!["mermaid".to_string(), "markdown".to_string()];
        let rendered = render_all(&model, &ids, &[], &GeneratorConfig::default()).unwrap();
        let mut names: Vec<_> = rendered.iter().map(|d| d.file_name()).collect();
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_sanitize_and_group() {
        assert_eq!(sanitize_id("orders.created-v1"), "orders_created_v1");
        let groups = group_by(&["b1", "a1", "b2"], |s| s.chars().next());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, Some('b'));
        assert_eq!(groups[0].1, vec![&"b1", &"b2"]);
    }
}
