//! Kafka producer and consumer scanner.
//!
//! Java:
//! - `@KafkaListener(topics = {...})` methods subscribe; the first parameter
//!   type is the message type
//! - `@SendTo("topic")` methods publish their return type
//! - `kafkaTemplate.send("topic", ...)` publishes
//!
//! Python (kafka-python and confluent-kafka):
//! - `KafkaConsumer("a", "b", ...)` and `consumer.subscribe(["a"])` subscribe
//! - `producer.send("topic", ...)` / `producer.produce("topic", ...)` publish

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use super::java::{self, MemberKind};
use super::support;
use crate::model::{MessageFlow, Relationship, RelationshipType};
use crate::scanner::{
    Applicability, Findings, ScanContext, ScanError, ScanResult, Scanner, TierEngine,
};

const PATTERNS: &[&str] = &["**/*.java", "**/*.py"];
const BROKER: &str = "Kafka";

lazy_static! {
    static ref TEMPLATE_SEND: Regex =
        Regex::new(r#"(?i)\w*kafkaTemplate\s*\.\s*send\s*\(\s*"([^"]+)""#).unwrap();
    static ref PY_CONSUMER: Regex = Regex::new(r"KafkaConsumer\s*\(([^)]*)\)").unwrap();
    static ref PY_SUBSCRIBE: Regex = Regex::new(r"\.subscribe\s*\(\s*(?:topics\s*=\s*)?[\[(]([^\])]*)[\])]").unwrap();
    static ref PY_PRODUCE: Regex = Regex::new(r#"\.(?:send|produce)\s*\(\s*(?:topic\s*=\s*)?['"]([^'"]+)['"]"#).unwrap();
    static ref PY_STRING: Regex = Regex::new(r#"['"]([^'"]+)['"]"#).unwrap();
    static ref KEYWORD_ARG: Regex = Regex::new(r"\b\w+\s*=").unwrap();
}

pub struct KafkaScanner;

impl Scanner for KafkaScanner {
    fn id(&self) -> &'static str {
        "kafka-consumer"
    }

    fn display_name(&self) -> &'static str {
        "Kafka Messaging"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["java", "python"]
    }

    fn supported_file_patterns(&self) -> &'static [&'static str] {
        PATTERNS
    }

    fn priority(&self) -> i32 {
        70
    }

    fn applicability(&self) -> Applicability {
        Applicability::has_any_dependency(&["spring-kafka", "kafka-clients", "kafka-python", "confluent-kafka"])
            .or(Applicability::file_contains("**/*.java", "KafkaListener"))
            .or(Applicability::file_contains("**/*.java", "KafkaTemplate"))
            .or(Applicability::file_contains("**/*.py", "kafka"))
    }

    fn scan(&self, ctx: &ScanContext) -> ScanResult {
        ScanResult::from_outcome(self.id(), self.try_scan(ctx))
    }
}

impl KafkaScanner {
    fn try_scan(&self, ctx: &ScanContext) -> Result<ScanResult, ScanError> {
        let service_id = support::project_component_id(ctx);
        let engine = TierEngine::regex_only(self.id(), |file: &Path, content: &str| {
            let flows = match file.extension().and_then(|e| e.to_str()) {
                Some("java") => java_flows(&service_id, content),
                Some("py") => python_flows(&service_id, content),
                _ => Vec::new(),
            };
            let mut findings = Findings::new();
            findings.message_flows = flows;
            Ok(vec![findings])
        })
        .with_pre_filter(|p: &Path| !support::is_test_path(p));

        let files = ctx.find_files_any(PATTERNS)?;
        let (mut findings, stats) = support::run_engine(ctx, &files, &engine);
        if !findings.message_flows.is_empty() {
            add_topology(ctx, &mut findings);
        }
        Ok(support::finish(self.id(), findings, stats))
    }
}

/// The broker, the service and one relationship per direction used.
fn add_topology(ctx: &ScanContext, findings: &mut Findings) {
    let broker = support::broker_component(BROKER);
    let service = support::project_component(ctx, "Kafka client");
    let publishes = findings.message_flows.iter().any(|f| f.publisher_component_id.is_some());
    let subscribes = findings.message_flows.iter().any(|f| f.subscriber_component_id.is_some());

    if publishes {
        findings.relationships.push(
            Relationship::new(service.id.clone(), broker.id.clone(), RelationshipType::Publishes)
                .with_description("Publishes messages")
                .with_technology(BROKER),
        );
    }
    if subscribes {
        findings.relationships.push(
            Relationship::new(service.id.clone(), broker.id.clone(), RelationshipType::Subscribes)
                .with_description("Consumes messages")
                .with_technology(format!("{} consumer", BROKER)),
        );
    }
    findings.components.push(service);
    findings.components.push(broker);
}

fn java_flows(service_id: &str, content: &str) -> Vec<MessageFlow> {
    let source = java::read_source(content);
    let mut flows = Vec::new();

    for (_, class_name) in source.classes() {
        for member in source.members_of(class_name) {
            let MemberKind::Method { return_type, params, .. } = &member.kind else {
                continue;
            };
            if let Some(listener) = member.annotation("KafkaListener") {
                let mut topics = listener.string_list("topics");
                if topics.is_empty() {
                    topics = listener.string_list("value");
                }
                let message_type = first_parameter_type(params).unwrap_or_else(|| "Object".to_string());
                for topic in topics {
                    flows.push(
                        MessageFlow::subscribed(service_id, topic)
                            .with_broker(BROKER)
                            .with_message_type(Some(message_type.clone())),
                    );
                }
            }
            if let Some(topic) = member.annotation("SendTo").and_then(|a| a.string_attribute("value")) {
                flows.push(
                    MessageFlow::published(service_id, topic)
                        .with_broker(BROKER)
                        .with_message_type(Some(return_type.clone())),
                );
            }
        }
    }

    for caps in TEMPLATE_SEND.captures_iter(content) {
        flows.push(MessageFlow::published(service_id, &caps[1]).with_broker(BROKER));
    }
    flows
}

/// `(@Payload OrderEvent event, Acknowledgment ack)` → `OrderEvent`.
fn first_parameter_type(params: &str) -> Option<String> {
    let inner = params.trim().trim_start_matches('(').trim_end_matches(')');
    let first = java::split_top_level(inner).into_iter().next()?;
    let (_, _, rest) = java::leading_annotations(first);
    let (param_type, _) = rest.trim().rsplit_once(char::is_whitespace)?;
    Some(param_type.trim().to_string())
}

fn python_flows(service_id: &str, content: &str) -> Vec<MessageFlow> {
    if !content.to_lowercase().contains("kafka") {
        return Vec::new();
    }
    let mut flows = Vec::new();

    for caps in PY_CONSUMER.captures_iter(content) {
        // Topics are the positional arguments before the first keyword.
        let args = &caps[1];
        let positional = KEYWORD_ARG.find(args).map_or(args, |m| &args[..m.start()]);
        for topic in PY_STRING.captures_iter(positional) {
            flows.push(MessageFlow::subscribed(service_id, &topic[1]).with_broker(BROKER));
        }
    }
    for caps in PY_SUBSCRIBE.captures_iter(content) {
        for topic in PY_STRING.captures_iter(&caps[1]) {
            flows.push(MessageFlow::subscribed(service_id, &topic[1]).with_broker(BROKER));
        }
    }
    for caps in PY_PRODUCE.captures_iter(content) {
        flows.push(MessageFlow::published(service_id, &caps[1]).with_broker(BROKER));
    }
    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LISTENER: &str = r#"
package com.acme.billing;

@Component
public class BillingListener {
    private final KafkaTemplate<String, Invoice> kafkaTemplate;

    @KafkaListener(topics = {"orders.created", "orders.updated"}, groupId = "billing")
    public void onOrder(@Payload OrderEvent event, Acknowledgment ack) {
        kafkaTemplate.send("invoices", toInvoice(event));
    }

    @KafkaListener("refunds")
    @SendTo("refunds.processed")
    public RefundResult onRefund(RefundRequest request) {
        return process(request);
    }
}
"#;

    const PYTHON: &str = r#"
from kafka import KafkaConsumer, KafkaProducer

consumer = KafkaConsumer("payments", "chargebacks", bootstrap_servers="kafka:9092", group_id="ledger")
producer = KafkaProducer(bootstrap_servers="kafka:9092")

for message in consumer:
    producer.send("ledger.entries", value=message.value)
"#;

    fn topics(flows: &[MessageFlow], published: bool) -> Vec<String> {
        let mut topics: Vec<_> = flows
            .iter()
            .filter(|f| f.publisher_component_id.is_some() == published)
            .map(|f| f.topic.clone())
            .collect();
        topics.sort();
        topics
    }

    #[test]
    fn test_java_flows() {
        let flows = java_flows("svc", LISTENER);
        assert_eq!(topics(&flows, false), vec!["orders.created", "orders.updated", "refunds"]);
        assert_eq!(topics(&flows, true), vec!["invoices", "refunds.processed"]);

        let created = flows.iter().find(|f| f.topic == "orders.created").unwrap();
        assert_eq!(created.message_type.as_deref(), Some("OrderEvent"));
        assert_eq!(created.broker.as_deref(), Some("Kafka"));
        let processed = flows.iter().find(|f| f.topic == "refunds.processed").unwrap();
        assert_eq!(processed.message_type.as_deref(), Some("RefundResult"));
    }

    #[test]
    fn test_python_flows() {
        let flows = python_flows("svc", PYTHON);
        assert_eq!(topics(&flows, false), vec!["chargebacks", "payments"]);
        assert_eq!(topics(&flows, true), vec!["ledger.entries"]);
    }

    #[test]
    fn test_python_without_kafka_is_ignored() {
        let source = "import requests\nsession.send('not-a-topic')\n";
        assert!(python_flows("svc", source).is_empty());
    }

    #[test]
    fn test_scan_adds_broker_and_relationships() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("BillingListener.java"), LISTENER).unwrap();
        let ctx = ScanContext::new(temp.path()).with_project_name("billing");

        assert!(KafkaScanner.applies_to(&ctx));
        let result = KafkaScanner.scan(&ctx);
        assert!(result.success);
        assert_eq!(result.findings.message_flows.len(), 5);
        assert!(result.findings.components.iter().any(|c| c.name == "Kafka"));

        let kinds: Vec<_> = result.findings.relationships.iter().map(|r| r.relationship_type).collect();
        assert_eq!(kinds, vec![RelationshipType::Publishes, RelationshipType::Subscribes]);
    }

    #[test]
    fn test_scan_without_flows_adds_nothing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Plain.java"), "public class Plain {}").unwrap();
        let ctx = ScanContext::new(temp.path());

        let result = KafkaScanner.scan(&ctx);
        assert!(result.success);
        assert!(result.findings.is_empty());
    }
}
