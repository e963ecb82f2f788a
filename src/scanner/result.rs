//! The data package a scanner produces.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::{ApiEndpoint, Component, DataEntity, Dependency, MessageFlow, Relationship};

use super::{ScanError, ScanStatistics};

/// The findings collections of a scan. Every list defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
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
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
            && self.dependencies.is_empty()
            && self.api_endpoints.is_empty()
            && self.message_flows.is_empty()
            && self.data_entities.is_empty()
            && self.relationships.is_empty()
    }

    /// Total number of findings across all categories.
    pub fn len(&self) -> usize {
        self.components.len()
            + self.dependencies.len()
            + self.api_endpoints.len()
            + self.message_flows.len()
            + self.data_entities.len()
            + self.relationships.len()
    }

    /// Append another set of findings to this one.
    pub fn extend(&mut self, other: Findings) {
        self.components.extend(other.components);
        self.dependencies.extend(other.dependencies);
        self.api_endpoints.extend(other.api_endpoints);
        self.message_flows.extend(other.message_flows);
        self.data_entities.extend(other.data_entities);
        self.relationships.extend(other.relationships);
    }
}

/// Output of a single scanner invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scanner_id: String,
    pub success: bool,
    #[serde(flatten)]
    pub findings: Findings,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub statistics: ScanStatistics,
}

impl ScanResult {
    /// Successful result with no findings.
    pub fn empty(scanner_id: impl Into<String>) -> Self {
        Self::success(scanner_id, Findings::default(), Vec::new(), None)
    }

    /// Successful result. Omitted statistics default to a zero snapshot.
    pub fn success(
        scanner_id: impl Into<String>,
        findings: Findings,
        warnings: Vec<String>,
        statistics: Option<ScanStatistics>,
    ) -> Self {
        Self {
            scanner_id: scanner_id.into(),
            success: true,
            findings,
            warnings,
            errors: Vec::new(),
            statistics: statistics.unwrap_or_default(),
        }
    }

    /// Scanner-level precondition failure. Findings are always empty.
    pub fn failed(scanner_id: impl Into<String>, errors: Vec<String>) -> Self {
        let scanner_id = scanner_id.into();
        let errors = if errors.is_empty() {
            vec![format!("scanner {} failed", scanner_id)]
        } else {
            errors
        };
        Self {
            scanner_id,
            success: false,
            findings: Findings::default(),
            warnings: Vec::new(),
            errors,
            statistics: ScanStatistics::empty(),
        }
    }

    /// A scanner that exceeded its deadline. Partial statistics are kept so the
    /// degradation stays visible; partial findings are dropped.
    pub fn timed_out(
        scanner_id: impl Into<String>,
        timeout: Duration,
        partial: ScanStatistics,
    ) -> Self {
        let mut result = Self::failed(
            scanner_id,
            vec![format!("timed out after {:.1}s", timeout.as_secs_f64())],
        );
        result.statistics = partial;
        result
    }

    /// Convert the outcome of a fallible scan body into a result.
    pub fn from_outcome(scanner_id: &str, outcome: Result<ScanResult, ScanError>) -> Self {
        match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(scanner = scanner_id, error = %e, "scanner precondition failed");
                Self::failed(scanner_id, vec![e.to_string()])
            }
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }
}
