//! End-to-end parser tests

use super::*;
use strategos_rpc::AgentId;

fn parser() -> CommandParser {
    CommandParser::new()
}

#[test]
fn test_implement_feature_intent() {
    let command = parser().parse("create a user registration endpoint", None);

    assert_eq!(command.intent, "implement_feature");
    assert_eq!(command.suggested_agent, AgentId::Developer);
    assert!(command.requires_multi_agent);
    assert!(command.confidence > 0.65);
    assert!(command.has_entity(EntityKind::Component));
    assert!(command.alternatives.is_empty());
    assert!(command.ambiguity < 0.1);
    assert!(command.suggestions.is_empty());
}

#[test]
fn test_fix_bug_with_file_path() {
    let command = parser().parse("fix the crash in src/payments/checkout.rs", None);

    assert_eq!(command.intent, "fix_bug");
    assert_eq!(command.suggested_agent, AgentId::Developer);
    assert!(!command.requires_multi_agent);
    assert_eq!(
        command.first_entity(EntityKind::FilePath),
        Some("src/payments/checkout.rs")
    );
}

#[test]
fn test_security_review_routes_to_guardian() {
    let command = parser().parse("audit the payment flow for vulnerabilities", None);

    assert_eq!(command.intent, "security_review");
    assert_eq!(command.suggested_agent, AgentId::Guardian);
}

#[test]
fn test_write_tests_routes_to_qa() {
    let command = parser().parse("write unit tests for the parser module", None);

    assert_eq!(command.intent, "write_tests");
    assert_eq!(command.suggested_agent, AgentId::Qa);
}

#[test]
fn test_unrecognized_input_yields_unknown() {
    let command = parser().parse("sdkfjh qwerty zzz", None);

    assert_eq!(command.intent, UNKNOWN_INTENT);
    assert!(!command.is_recognized());
    assert_eq!(command.suggested_agent, AgentId::Pm);
    assert!(command.confidence < 0.5);
    // Low confidence always produces "did you mean" hints
    assert!(!command.suggestions.is_empty());
}

#[test]
fn test_entities_survive_unknown_intent() {
    let command = parser().parse("migrate the database to postgres by friday", None);

    assert_eq!(command.intent, UNKNOWN_INTENT);
    assert_eq!(
        command.first_entity(EntityKind::Technology),
        Some("postgres")
    );
    assert_eq!(
        command.first_entity(EntityKind::Timeframe),
        Some("by friday")
    );
}

#[test]
fn test_ambiguous_input_lists_alternatives() {
    let command = parser().parse("test the deployment", None);

    assert_eq!(command.intent, "write_tests");
    assert_eq!(command.alternatives.len(), 1);
    assert_eq!(command.alternatives[0].intent, "deploy_release");
    assert_eq!(command.alternatives[0].agent, AgentId::Po);
    assert!(command.ambiguity > 0.5);
    assert!(!command.alternatives[0].reasoning.is_empty());
}

#[test]
fn test_context_injects_file_entity() {
    let context = ParseContext {
        current_file: Some("src/auth.rs".to_string()),
        ..Default::default()
    };

    let command = parser().parse("fix the bug", Some(&context));
    assert_eq!(command.first_entity(EntityKind::FilePath), Some("src/auth.rs"));

    // No duplicate when the text already names the same file
    let command = parser().parse("fix the bug in src/auth.rs", Some(&context));
    assert_eq!(command.entity_values(EntityKind::FilePath).len(), 1);
}

#[test]
fn test_parse_is_deterministic() {
    let p = parser();
    let text = "create a payment endpoint in src/pay.rs using rust by friday";

    let first = serde_json::to_value(p.parse(text, None)).unwrap();
    let second = serde_json::to_value(p.parse(text, None)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_input() {
    let command = parser().parse("", None);

    assert_eq!(command.intent, UNKNOWN_INTENT);
    assert!(command.entities.is_empty());
    assert!(command.alternatives.is_empty());
}

#[test]
fn test_confidence_never_exceeds_one() {
    // Dense input hitting regex, many keywords, and strong entities
    let command = parser().parse(
        "create add implement build a feature endpoint api service in src/api/users.rs",
        None,
    );
    assert!(command.confidence <= 1.0);
    assert!(command.confidence > 0.8);
}
