//! Project configuration (`archscan.yaml`).
//!
//! Every section is optional. A missing or broken file never stops a scan:
//! [`ProjectConfig::load_or_default`] logs the problem and falls back to the
//! defaults.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generator::{self, DiagramType};
use crate::scanner::groups;

/// File names looked up in the project root, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["archscan.yaml", ".archscan.yaml", "docarchitect.yaml"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_OUTPUT_DIR: &str = "docs/architecture";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default)]
    pub scanners: ScannersConfig,
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub generators: GeneratorsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// How the set of scanners to run is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerMode {
    /// Every registered scanner; each filters itself via applicability.
    Auto,
    /// Members of the listed groups.
    Groups,
    /// Exactly the listed scanner ids.
    Explicit,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ScannersConfig {
    /// Inferred from `groups` / `enabled` when absent.
    #[serde(default)]
    pub mode: Option<ScannerMode>,
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Never run, whatever the mode.
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Free-form scanner settings, e.g. `npm.include-dev: true`.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_yaml::Value>,
}

impl ScannersConfig {
    pub fn effective_mode(&self) -> ScannerMode {
        if let Some(mode) = self.mode {
            return mode;
        }
        if !self.groups.is_empty() {
            return ScannerMode::Groups;
        }
        if !self.enabled.is_empty() {
            return ScannerMode::Explicit;
        }
        ScannerMode::Auto
    }

    /// Whether the scanner with this id is selected to run.
    pub fn is_selected(&self, scanner_id: &str) -> bool {
        if self.disabled.iter().any(|d| d == scanner_id) {
            return false;
        }
        match self.effective_mode() {
            ScannerMode::Auto => true,
            ScannerMode::Groups => groups::is_in_groups(scanner_id, &self.groups),
            ScannerMode::Explicit => {
                self.enabled.is_empty() || self.enabled.iter().any(|e| e == scanner_id)
            }
        }
    }

    /// Settings rendered as strings, for [`crate::scanner::ScanContext`].
    pub fn settings_as_strings(&self) -> BTreeMap<String, String> {
        self.settings
            .iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Null => return None,
                    other => serde_yaml::to_string(other).ok()?.trim().to_string(),
                };
                Some((k.clone(), value))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScanSettings {
    /// Per-scanner timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Run scanners of one stage, and files within a scanner, in parallel.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Globs excluded from the file index.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            parallel: true,
            exclude: Vec::new(),
        }
    }
}

impl ScanSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GeneratorsConfig {
    /// Generator ids to run.
    #[serde(default = "default_generators")]
    pub enabled: Vec<String>,
    /// Diagram type names; empty means every type a generator supports.
    #[serde(default)]
    pub diagrams: Vec<String>,
    /// Mermaid theme (`default`, `dark`, `forest`, `neutral`).
    #[serde(default)]
    pub theme: Option<String>,
    /// Render external systems, databases and brokers in context diagrams.
    #[serde(default = "default_true")]
    pub include_external: bool,
}

impl Default for GeneratorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_generators(),
            diagrams: Vec::new(),
            theme: None,
            include_external: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: String,
    #[serde(default = "default_true")]
    pub generate_index: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            generate_index: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

fn default_generators() -> Vec<String> {
    vec!["mermaid".to_string(), "markdown".to_string()]
}

impl ProjectConfig {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        // An empty file is a valid, all-defaults config.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ProjectConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// First config file present in `root`.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file())
    }

    /// Load `explicit` if given, otherwise a discovered file, otherwise the
    /// defaults. Problems are logged and replaced by defaults.
    pub fn load_or_default(root: &Path, explicit: Option<&Path>) -> Self {
        let path = match explicit.map(Path::to_path_buf).or_else(|| Self::discover(root)) {
            Some(path) => path,
            None => {
                tracing::debug!(root = %root.display(), "no config file found, using defaults");
                return Self::default();
            }
        };

        match Self::parse_file(&path).and_then(|c| validate(&c).map(|_| c)) {
            Ok(config) => {
                tracing::info!(config = %path.display(), "loaded configuration");
                config
            }
            Err(e) => {
                tracing::warn!(config = %path.display(), error = %format!("{:#}", e), "ignoring invalid configuration");
                Self::default()
            }
        }
    }

    /// Project name from config, or the given fallback.
    pub fn project_name_or(&self, fallback: &str) -> String {
        self.project
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Validate a configuration.
pub fn validate(config: &ProjectConfig) -> anyhow::Result<()> {
    if config.scan.timeout_secs == 0 {
        anyhow::bail!("scan.timeout_secs must be greater than zero");
    }

    let unknown: Vec<_> = config
        .scanners
        .groups
        .iter()
        .filter(|g| !groups::GROUPS.contains_key(g.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        anyhow::bail!(
            "unknown scanner group(s): {} (available: {})",
            unknown.join(", "),
            groups::available_groups().join(", ")
        );
    }

    for id in &config.generators.enabled {
        if generator::by_id(id).is_none() {
            anyhow::bail!(
                "unknown generator '{}' (available: {})",
                id,
                generator::builtin().iter().map(|g| g.id()).collect::<Vec<_>>().join(", ")
            );
        }
    }
    let diagrams = config
        .generators
        .diagrams
        .iter()
        .map(|name| name.parse::<DiagramType>())
        .collect::<Result<Vec<_>, _>>()?;
    generator::resolve(&config.generators.enabled, &diagrams)?;

    for pattern in &config.scan.exclude {
        globset::Glob::new(pattern)
            .with_context(|| format!("invalid exclude pattern '{}'", pattern))?;
    }

    Ok(())
}
