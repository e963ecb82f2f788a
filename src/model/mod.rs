//! Architecture findings and the merged architecture model.
//!
//! Scanners produce the finding types defined here (components, dependencies,
//! API endpoints, message flows, data entities, relationships). The
//! [`ArchitectureModel`] is the deduplicated union of all findings for one
//! project and is what diagram generators consume.

mod architecture;
pub mod ids;
mod quality;

pub use architecture::{ArchitectureModel, MergeInput};
pub use quality::{GapSeverity, QualityGap, QualityReport};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of architectural component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Service,
    Module,
    Library,
    External,
    Database,
    MessageBroker,
    ApiGateway,
    Cache,
    Unknown,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Service => "service",
            ComponentType::Module => "module",
            ComponentType::Library => "library",
            ComponentType::External => "external",
            ComponentType::Database => "database",
            ComponentType::MessageBroker => "message_broker",
            ComponentType::ApiGateway => "api_gateway",
            ComponentType::Cache => "cache",
            ComponentType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A deployable or logical unit of the system (service, module, database...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Deterministic identifier, see [`ids`].
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Component {
    pub fn new(id: impl Into<String>, name: impl Into<String>, component_type: ComponentType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            component_type,
            description: None,
            technology: None,
            repository: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A declared package dependency of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub source_component_id: String,
    /// Group/namespace (Maven groupId, npm scope, Go module path prefix...).
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Defaults to "compile".
    pub scope: String,
    pub direct: bool,
}

impl Dependency {
    pub fn new(
        source_component_id: impl Into<String>,
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
    ) -> Self {
        Self {
            source_component_id: source_component_id.into(),
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
            scope: "compile".to_string(),
            direct: true,
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version.filter(|v| !v.is_empty());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Human-readable coordinate, e.g. `org.springframework:spring-web:6.1.0`.
    pub fn coordinate(&self) -> String {
        let base = if self.group_id.is_empty() || self.group_id == self.artifact_id {
            self.artifact_id.clone()
        } else {
            format!("{}:{}", self.group_id, self.artifact_id)
        };
        match &self.version {
            Some(v) => format!("{}:{}", base, v),
            None => base,
        }
    }
}

/// API style of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiType {
    Rest,
    GraphqlQuery,
    GraphqlMutation,
    GraphqlSubscription,
    Grpc,
    Websocket,
    Soap,
}

impl ApiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiType::Rest => "REST",
            ApiType::GraphqlQuery => "GraphQL query",
            ApiType::GraphqlMutation => "GraphQL mutation",
            ApiType::GraphqlSubscription => "GraphQL subscription",
            ApiType::Grpc => "gRPC",
            ApiType::Websocket => "WebSocket",
            ApiType::Soap => "SOAP",
        }
    }
}

/// An API endpoint exposed by a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub component_id: String,
    #[serde(rename = "type")]
    pub api_type: ApiType,
    pub path: String,
    /// HTTP method or RPC name.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub request_schema: Option<String>,
    #[serde(default)]
    pub response_schema: Option<String>,
    #[serde(default)]
    pub authentication: Option<String>,
}

impl ApiEndpoint {
    pub fn rest(component_id: impl Into<String>, method: &str, path: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            api_type: ApiType::Rest,
            path: path.into(),
            method: Some(method.to_uppercase()),
            description: None,
            request_schema: None,
            response_schema: None,
            authentication: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Asynchronous message exchange over a broker topic or queue.
///
/// At least one of publisher or subscriber is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFlow {
    #[serde(default)]
    pub publisher_component_id: Option<String>,
    #[serde(default)]
    pub subscriber_component_id: Option<String>,
    pub topic: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub broker: Option<String>,
}

impl MessageFlow {
    pub fn published(publisher: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            publisher_component_id: Some(publisher.into()),
            subscriber_component_id: None,
            topic: topic.into(),
            message_type: None,
            schema: None,
            broker: None,
        }
    }

    pub fn subscribed(subscriber: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            publisher_component_id: None,
            subscriber_component_id: Some(subscriber.into()),
            topic: topic.into(),
            message_type: None,
            schema: None,
            broker: None,
        }
    }

    pub fn with_broker(mut self, broker: impl Into<String>) -> Self {
        self.broker = Some(broker.into());
        self
    }

    pub fn with_message_type(mut self, message_type: Option<String>) -> Self {
        self.message_type = message_type;
        self
    }
}

/// A single field of a [`DataEntity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Name of the entity this field points at (foreign key or ORM
    /// association).
    #[serde(default)]
    pub references: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            description: None,
            references: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_references(mut self, entity: impl Into<String>) -> Self {
        self.references = Some(entity.into());
        self
    }
}

/// A persistent data entity (table, document, ORM model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntity {
    pub component_id: String,
    pub name: String,
    /// Storage kind, e.g. "table" or "collection".
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl DataEntity {
    pub fn table(component_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            name: name.into(),
            entity_type: Some("table".to_string()),
            fields: Vec::new(),
            primary_key: None,
            description: None,
        }
    }
}

/// Kind of relationship between two components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Calls,
    Uses,
    Publishes,
    Subscribes,
    DependsOn,
    ReadsFrom,
    WritesTo,
    Contains,
    DeployedOn,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Calls => "calls",
            RelationshipType::Uses => "uses",
            RelationshipType::Publishes => "publishes",
            RelationshipType::Subscribes => "subscribes",
            RelationshipType::DependsOn => "depends on",
            RelationshipType::ReadsFrom => "reads from",
            RelationshipType::WritesTo => "writes to",
            RelationshipType::Contains => "contains",
            RelationshipType::DeployedOn => "deployed on",
        }
    }
}

/// Directed relationship between two component ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
}

impl Relationship {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship_type,
            description: None,
            technology: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }
}
