//! Maven dependency scanner.
//!
//! Reads `pom.xml` files with element-level patterns rather than a full XML
//! parser. Plugin coordinates under `<build>` and `<reporting>` are ignored,
//! `<parent>` supplies missing coordinates, and `${...}` placeholders are
//! resolved against `<properties>` and the project coordinates.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use super::support;
use crate::model::{ids, Component, ComponentType, Dependency};
use crate::scanner::{Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine};

const PATTERNS: &[&str] = &["**/pom.xml"];

lazy_static! {
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref IGNORED_SECTIONS: Regex =
        Regex::new(r"(?s)<(build|reporting|profiles)>.*?</(build|reporting|profiles)>").unwrap();
    static ref PARENT: Regex = Regex::new(r"(?s)<parent>(.*?)</parent>").unwrap();
    static ref MANAGEMENT: Regex =
        Regex::new(r"(?s)<dependencyManagement>(.*?)</dependencyManagement>").unwrap();
    static ref PROPERTIES: Regex = Regex::new(r"(?s)<properties>(.*?)</properties>").unwrap();
    static ref PROPERTY: Regex = Regex::new(r"(?s)<([\w.\-]+)>\s*([^<]*?)\s*</[\w.\-]+>").unwrap();
    static ref DEPENDENCIES: Regex = Regex::new(r"(?s)<dependencies>.*?</dependencies>").unwrap();
    static ref DEPENDENCY: Regex = Regex::new(r"(?s)<dependency>(.*?)</dependency>").unwrap();
    static ref EXCLUSIONS: Regex = Regex::new(r"(?s)<exclusions>.*?</exclusions>").unwrap();
    static ref PLACEHOLDER: Regex = Regex::new(r"\$\{([^}]+)\}").unwrap();
    static ref GROUP_ID: Regex = tag("groupId");
    static ref ARTIFACT_ID: Regex = tag("artifactId");
    static ref VERSION: Regex = tag("version");
    static ref PACKAGING: Regex = tag("packaging");
    static ref SCOPE: Regex = tag("scope");
    static ref NAME: Regex = tag("name");
}

fn tag(name: &str) -> Regex {
    Regex::new(&format!(r"<{0}>\s*([^<]*?)\s*</{0}>", name)).unwrap()
}

fn first(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|c| c[1].to_string())
        .filter(|s| !s.is_empty())
}

pub struct MavenScanner;

impl Scanner for MavenScanner {
    fn id(&self) -> &'static str {
        "maven-dependencies"
    }

    fn display_name(&self) -> &'static str {
        "Maven Dependencies"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        10
    }

    fn scan(&self, ctx: &ScanContext) -> ScanResult {
        ScanResult::from_outcome(self.id(), self.try_scan(ctx))
    }
}

impl MavenScanner {
    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let engine = TierEngine::regex_only(self.id(), |file: &Path, content: &str| {
            let pom = Pom::parse(content)?;
            tracing::debug!(
                file = %file.display(),
                artifact = %pom.artifact_id,
                dependencies = pom.dependencies.len(),
                "parsed pom"
            );
            Ok(vec![pom.into_findings()])
        });
        support::scan_files(self.id(), ctx, PATTERNS, &engine)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PomDependency {
    group_id: String,
    artifact_id: String,
    version: Option<String>,
    scope: String,
    managed: bool,
}

#[derive(Debug)]
struct Pom {
    group_id: Option<String>,
    artifact_id: String,
    version: Option<String>,
    packaging: String,
    name: Option<String>,
    dependencies: Vec<PomDependency>,
}

impl Pom {
    fn parse(content: &str) -> anyhow::Result<Self> {
        let content = COMMENT.replace_all(content, "");
        let content = IGNORED_SECTIONS.replace_all(&content, "");

        let parent = PARENT.captures(&content).map(|c| c[1].to_string());
        let management = MANAGEMENT.captures(&content).map(|c| c[1].to_string());
        let properties_block = PROPERTIES.captures(&content).map(|c| c[1].to_string());

        let without_parent = PARENT.replace_all(&content, "");
        let without_management = MANAGEMENT.replace_all(&without_parent, "");
        let dependency_blocks: Vec<String> = DEPENDENCIES
            .find_iter(&without_management)
            .map(|m| m.as_str().to_string())
            .collect();
        let head = DEPENDENCIES.replace_all(&without_management, "");
        let head = PROPERTIES.replace_all(&head, "");

        let artifact_id = first(&ARTIFACT_ID, &head)
            .ok_or_else(|| anyhow::anyhow!("pom has no project artifactId"))?;
        let group_id = first(&GROUP_ID, &head).or_else(|| parent.as_deref().and_then(|p| first(&GROUP_ID, p)));
        let version = first(&VERSION, &head).or_else(|| parent.as_deref().and_then(|p| first(&VERSION, p)));
        let packaging = first(&PACKAGING, &head).unwrap_or_else(|| "jar".to_string());
        let name = first(&NAME, &head);

        let mut properties = HashMap::new();
        if let Some(block) = &properties_block {
            for caps in PROPERTY.captures_iter(block) {
                properties.insert(caps[1].to_string(), caps[2].to_string());
            }
        }
        properties.insert("project.artifactId".to_string(), artifact_id.clone());
        if let Some(g) = &group_id {
            properties.insert("project.groupId".to_string(), g.clone());
        }
        if let Some(v) = &version {
            properties.insert("project.version".to_string(), v.clone());
        }

        let mut dependencies = Vec::new();
        for block in &dependency_blocks {
            dependencies.extend(parse_dependencies(block, &properties, false));
        }
        if let Some(block) = &management {
            dependencies.extend(parse_dependencies(block, &properties, true));
        }

        Ok(Self {
            group_id,
            artifact_id,
            version,
            packaging,
            name,
            dependencies,
        })
    }

    fn component(&self) -> Component {
        let coordinate = match &self.group_id {
            Some(g) => format!("{}:{}", g, self.artifact_id),
            None => self.artifact_id.clone(),
        };
        // Plain jars are libraries; war/ear/pom projects are deployable units.
        let component_type = if self.packaging == "jar" {
            ComponentType::Library
        } else {
            ComponentType::Service
        };
        let mut component = Component::new(
            ids::component_id("maven", &coordinate),
            self.artifact_id.clone(),
            component_type,
        )
        .with_technology("Java/Maven")
        .with_description(self.name.clone().unwrap_or_else(|| format!("Maven project: {}", coordinate)))
        .with_metadata("packaging", self.packaging.clone());
        if let Some(g) = &self.group_id {
            component = component.with_metadata("groupId", g.clone());
        }
        if let Some(v) = &self.version {
            component = component.with_metadata("version", v.clone());
        }
        component
    }

    fn into_findings(self) -> Findings {
        let component = self.component();
        let mut findings = Findings::new();
        findings.dependencies = self
            .dependencies
            .into_iter()
            .map(|d| {
                let mut dependency = Dependency::new(component.id.clone(), d.group_id, d.artifact_id)
                    .with_version(d.version)
                    .with_scope(d.scope);
                dependency.direct = !d.managed;
                dependency
            })
            .collect();
        findings.components.push(component);
        findings
    }
}

fn parse_dependencies(block: &str, properties: &HashMap<String, String>, managed: bool) -> Vec<PomDependency> {
    DEPENDENCY
        .captures_iter(block)
        .filter_map(|caps| {
            let body = EXCLUSIONS.replace_all(&caps[1], "");
            let group_id = resolve(&first(&GROUP_ID, &body)?, properties);
            let artifact_id = resolve(&first(&ARTIFACT_ID, &body)?, properties);
            let version = first(&VERSION, &body).map(|v| resolve(&v, properties));
            let scope = first(&SCOPE, &body).unwrap_or_else(|| "compile".to_string());
            Some(PomDependency {
                group_id,
                artifact_id,
                version,
                scope,
                managed,
            })
        })
        .collect()
}

/// Replace `${name}` placeholders. Unknown names are left as written.
fn resolve(value: &str, properties: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(value, |caps: &regex::Captures| {
            properties
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
  <modelVersion>4.0.0</modelVersion>
  <parent>
    <groupId>org.springframework.boot</groupId>
    <artifactId>spring-boot-starter-parent</artifactId>
    <version>3.2.0</version>
  </parent>
  <artifactId>order-service</artifactId>
  <packaging>war</packaging>
  <properties>
    <kafka.version>3.6.1</kafka.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.springframework.boot</groupId>
      <artifactId>spring-boot-starter-web</artifactId>
    </dependency>
    <dependency>
      <groupId>org.apache.kafka</groupId>
      <artifactId>kafka-clients</artifactId>
      <version>${kafka.version}</version>
      <exclusions>
        <exclusion>
          <groupId>org.slf4j</groupId>
          <artifactId>slf4j-api</artifactId>
        </exclusion>
      </exclusions>
    </dependency>
    <!-- <dependency><groupId>x</groupId><artifactId>commented</artifactId></dependency> -->
    <dependency>
      <groupId>org.junit.jupiter</groupId>
      <artifactId>junit-jupiter</artifactId>
      <version>${project.version}</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
  <build>
    <plugins>
      <plugin>
        <groupId>org.springframework.boot</groupId>
        <artifactId>spring-boot-maven-plugin</artifactId>
      </plugin>
    </plugins>
  </build>
</project>
"#;

    #[test]
    fn test_parse_pom() {
        let pom = Pom::parse(POM).unwrap();
        assert_eq!(pom.artifact_id, "order-service");
        assert_eq!(pom.group_id.as_deref(), Some("org.springframework.boot"));
        assert_eq!(pom.version.as_deref(), Some("3.2.0"));
        assert_eq!(pom.packaging, "war");

        let artifacts: Vec<_> = pom.dependencies.iter().map(|d| d.artifact_id.as_str()).collect();
        assert_eq!(artifacts, vec!["spring-boot-starter-web", "kafka-clients", "junit-jupiter"]);
        assert_eq!(pom.dependencies[1].version.as_deref(), Some("3.6.1"));
        assert_eq!(pom.dependencies[2].version.as_deref(), Some("3.2.0"));
        assert_eq!(pom.dependencies[2].scope, "test");
        assert_eq!(pom.dependencies[0].scope, "compile");
    }

    #[test]
    fn test_unresolved_placeholder_is_kept() {
        let props = HashMap::new();
        assert_eq!(resolve("${missing}", &props), "${missing}");
    }

    #[test]
    fn test_managed_dependencies_are_indirect() {
        let pom = Pom::parse(
            r#"<project>
  <groupId>com.acme</groupId>
  <artifactId>bom</artifactId>
  <packaging>pom</packaging>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>com.fasterxml.jackson</groupId>
        <artifactId>jackson-bom</artifactId>
        <version>2.16.0</version>
        <scope>import</scope>
      </dependency>
    </dependencies>
  </dependencyManagement>
</project>"#,
        )
        .unwrap();
        let findings = pom.into_findings();
        assert_eq!(findings.components[0].component_type, ComponentType::Service);
        assert_eq!(findings.dependencies.len(), 1);
        assert!(!findings.dependencies[0].direct);
        assert_eq!(findings.dependencies[0].scope, "import");
    }

    #[test]
    fn test_scan_project() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("pom.xml"), POM).unwrap();
        fs::create_dir(temp.path().join("bad")).unwrap();
        fs::write(temp.path().join("bad/pom.xml"), "<project></project>").unwrap();
        let ctx = ScanContext::new(temp.path());

        let result = MavenScanner.scan(&ctx);
        assert!(result.success);
        assert_eq!(result.findings.components.len(), 1);
        assert_eq!(result.findings.components[0].technology.as_deref(), Some("Java/Maven"));
        assert_eq!(result.findings.dependencies.len(), 3);
        assert_eq!(result.statistics.files_parsed_with_fallback, 1);
        assert_eq!(result.statistics.files_failed, 1);
    }
}
