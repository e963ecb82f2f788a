//! The merged architecture model.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use super::{ApiEndpoint, Component, DataEntity, Dependency, MessageFlow, Relationship};
use crate::scanner::{ScanResult, ScanStatistics};

/// A scan result together with the priority of the scanner that produced it.
#[derive(Debug, Clone)]
pub struct MergeInput {
    pub priority: i32,
    pub result: ScanResult,
}

impl MergeInput {
    pub fn new(priority: i32, result: ScanResult) -> Self {
        Self { priority, result }
    }
}

/// Deduplicated union of every successful scanner's findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureModel {
    pub project_name: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub api_endpoints: Vec<ApiEndpoint>,
    #[serde(default)]
    pub message_flows: Vec<MessageFlow>,
    #[serde(default)]
    pub data_entities: Vec<DataEntity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Statistics of every scanner that ran, failed ones included.
    #[serde(default)]
    pub scanner_statistics: BTreeMap<String, ScanStatistics>,
}

/// Keeps the first item per key, in order.
struct Dedup<K, T> {
    seen: HashSet<K>,
    items: Vec<T>,
}

impl<K: Hash + Eq, T> Dedup<K, T> {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, key: K, item: T) {
        if self.seen.insert(key) {
            self.items.push(item);
        }
    }
}

impl ArchitectureModel {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Default::default()
        }
    }

    /// Merge scan results into one model.
    ///
    /// Results are ordered by (priority, scanner id) before merging, so the
    /// outcome does not depend on the order scanners finished in. When two
    /// findings share a dedup key the first one wins, which makes the
    /// lower-priority-number scanner authoritative. Failed results contribute
    /// statistics but no findings.
    pub fn merge(project_name: impl Into<String>, inputs: Vec<MergeInput>) -> Self {
        let mut inputs = inputs;
        inputs.sort_by(|a, b| {
            (a.priority, &a.result.scanner_id).cmp(&(b.priority, &b.result.scanner_id))
        });

        let mut components = Dedup::new();
        let mut dependencies = Dedup::new();
        let mut endpoints = Dedup::new();
        let mut flows = Dedup::new();
        let mut entities = Dedup::new();
        let mut relationships = Dedup::new();
        let mut scanner_statistics = BTreeMap::new();

        for MergeInput { result, .. } in inputs {
            scanner_statistics
                .entry(result.scanner_id.clone())
                .or_insert_with(|| result.statistics.clone());

            if !result.success {
                tracing::debug!(scanner = %result.scanner_id, "excluding findings of failed scanner");
                continue;
            }

            let findings = result.findings;
            for c in findings.components {
                components.push(c.id.clone(), c);
            }
            for d in findings.dependencies {
                let key = (
                    d.source_component_id.clone(),
                    d.group_id.clone(),
                    d.artifact_id.clone(),
                    d.version.clone(),
                );
                dependencies.push(key, d);
            }
            for e in findings.api_endpoints {
                let key = (e.component_id.clone(), e.method.clone(), e.path.clone());
                endpoints.push(key, e);
            }
            for f in findings.message_flows {
                let key = (
                    f.topic.clone(),
                    f.publisher_component_id.clone(),
                    f.subscriber_component_id.clone(),
                );
                flows.push(key, f);
            }
            for e in findings.data_entities {
                let key = (e.component_id.clone(), e.name.clone());
                entities.push(key, e);
            }
            for r in findings.relationships {
                let key = (r.source_id.clone(), r.target_id.clone(), r.technology.clone());
                relationships.push(key, r);
            }
        }

        Self {
            project_name: project_name.into(),
            components: components.items,
            dependencies: dependencies.items,
            api_endpoints: endpoints.items,
            message_flows: flows.items,
            data_entities: entities.items,
            relationships: relationships.items,
            scanner_statistics,
        }
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Display name for a component id, falling back to the id itself.
    pub fn component_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.component(id).map(|c| c.name.as_str()).unwrap_or(id)
    }

    pub fn endpoints_for<'a>(&'a self, component_id: &'a str) -> impl Iterator<Item = &'a ApiEndpoint> + 'a {
        self.api_endpoints
            .iter()
            .filter(move |e| e.component_id == component_id)
    }

    /// Sum of every scanner's statistics.
    pub fn total_statistics(&self) -> ScanStatistics {
        self.scanner_statistics
            .values()
            .fold(ScanStatistics::empty(), |acc, s| acc.combine(s))
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
            && self.dependencies.is_empty()
            && self.api_endpoints.is_empty()
            && self.message_flows.is_empty()
            && self.data_entities.is_empty()
            && self.relationships.is_empty()
    }

    pub fn finding_count(&self) -> usize {
        self.components.len()
            + self.dependencies.len()
            + self.api_endpoints.len()
            + self.message_flows.len()
            + self.data_entities.len()
            + self.relationships.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComponentType, RelationshipType};
    use crate::scanner::Findings;

    fn with_component(scanner: &str, description: &str) -> ScanResult {
        let mut findings = Findings::new();
        findings.components.push(
            Component::new("c-orders", "orders", ComponentType::Service).with_description(description),
        );
        ScanResult::success(scanner, findings, vec![], None)
    }

    #[test]
    fn test_lower_priority_number_wins_conflicts() {
        let a = with_component("maven", "from maven");
        let b = with_component("spring", "from spring");

        let forward = ArchitectureModel::merge(
            "p",
            vec![MergeInput::new(10, a.clone()), MergeInput::new(50, b.clone())],
        );
        let backward = ArchitectureModel::merge(
            "p",
            vec![MergeInput::new(50, b), MergeInput::new(10, a)],
        );

        assert_eq!(forward.components.len(), 1);
        assert_eq!(
            forward.components[0].description.as_deref(),
            Some("from maven")
        );
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_equal_priority_breaks_ties_by_scanner_id() {
        let a = with_component("alpha", "from alpha");
        let z = with_component("zeta", "from zeta");
        let model = ArchitectureModel::merge(
            "p",
            vec![MergeInput::new(50, z), MergeInput::new(50, a)],
        );
        assert_eq!(model.components[0].description.as_deref(), Some("from alpha"));
    }

    #[test]
    fn test_relationship_dedup_by_triple() {
        let mut findings = Findings::new();
        findings.relationships.push(
            Relationship::new("a", "b", RelationshipType::Calls)
                .with_technology("HTTP")
                .with_description("first"),
        );
        findings.relationships.push(
            Relationship::new("a", "b", RelationshipType::Uses)
                .with_technology("HTTP")
                .with_description("second"),
        );
        findings
            .relationships
            .push(Relationship::new("a", "b", RelationshipType::Calls).with_technology("gRPC"));
        let result = ScanResult::success("s", findings, vec![], None);

        let model = ArchitectureModel::merge("p", vec![MergeInput::new(1, result)]);
        assert_eq!(model.relationships.len(), 2);
        assert_eq!(model.relationships[0].description.as_deref(), Some("first"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut findings = Findings::new();
        findings
            .dependencies
            .push(Dependency::new("svc", "org.slf4j", "slf4j-api").with_version(Some("2.0.9".into())));
        findings
            .api_endpoints
            .push(ApiEndpoint::rest("svc", "get", "/health"));
        findings
            .message_flows
            .push(MessageFlow::published("svc", "orders"));
        findings.data_entities.push(DataEntity::table("svc", "orders"));
        let result = ScanResult::success("s", findings, vec![], None);

        let once = ArchitectureModel::merge("p", vec![MergeInput::new(1, result.clone())]);
        let twice = ArchitectureModel::merge(
            "p",
            vec![MergeInput::new(1, result.clone()), MergeInput::new(1, result)],
        );
        assert_eq!(once, twice);
        assert_eq!(once.finding_count(), 4);
    }

    #[test]
    fn test_failed_results_contribute_no_findings() {
        let ok = with_component("ok", "present");
        let failed = ScanResult::failed("broken", vec!["root unreadable".into()]);

        let model = ArchitectureModel::merge(
            "p",
            vec![MergeInput::new(1, failed), MergeInput::new(2, ok.clone())],
        );
        assert_eq!(model.components, ok.findings.components);
        assert!(model.scanner_statistics.contains_key("broken"));
        assert!(model.scanner_statistics.contains_key("ok"));
    }

    #[test]
    fn test_total_statistics() {
        let mut a = ScanResult::empty("a");
        a.statistics.files_scanned = 2;
        let mut b = ScanResult::empty("b");
        b.statistics.files_scanned = 3;
        b.statistics.files_failed = 1;

        let model = ArchitectureModel::merge(
            "p",
            vec![MergeInput::new(1, a), MergeInput::new(1, b)],
        );
        let total = model.total_statistics();
        assert_eq!(total.files_scanned, 5);
        assert_eq!(total.files_failed, 1);
    }
}
