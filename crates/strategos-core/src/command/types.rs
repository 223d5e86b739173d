//! Core types for parsed commands

use serde::{Deserialize, Serialize};
use strategos_rpc::AgentId;

/// Kinds of entity the extractors know how to pull out of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A file or directory path
    FilePath,
    /// A programming language name
    Language,
    /// A framework or library name
    Framework,
    /// An action verb (create, fix, deploy, ...)
    Action,
    /// A component noun (endpoint, service, model, ...)
    Component,
    /// An infrastructure technology (docker, postgres, ...)
    Technology,
    /// A software design pattern
    DesignPattern,
    /// A time expression (today, this week, ...)
    Timeframe,
}

impl EntityKind {
    /// Snake-case name used in suggestions and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::FilePath => "file_path",
            EntityKind::Language => "language",
            EntityKind::Framework => "framework",
            EntityKind::Action => "action",
            EntityKind::Component => "component",
            EntityKind::Technology => "technology",
            EntityKind::DesignPattern => "design_pattern",
            EntityKind::Timeframe => "timeframe",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed value extracted from the command text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// What kind of value this is
    pub kind: EntityKind,
    /// The extracted text
    pub value: String,
    /// Extraction confidence in [0, 1]
    pub confidence: f64,
}

/// Grammatical role of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Known action word
    Verb,
    /// Known object word
    Noun,
    /// Anything else
    Other,
}

/// A single token of the normalized command text
#[derive(Debug, Clone)]
pub struct Token {
    /// Token text as it appears in the normalized input
    pub text: String,
    /// Naive lemma (suffix-stripped form)
    pub lemma: String,
    /// Verb/noun classification via the static lexicons
    pub kind: TokenKind,
    /// Zero-based position in the token stream
    pub position: usize,
}

/// A runner-up interpretation of the command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    /// Intent name
    pub intent: String,
    /// Agent that would handle it
    pub agent: AgentId,
    /// Score this interpretation reached
    pub confidence: f64,
    /// Short explanation of why it matched
    pub reasoning: String,
}

/// How urgent the caller considers the request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Can wait
    Low,
    /// Regular work
    #[default]
    Normal,
    /// Should jump the queue
    High,
    /// Production is on fire; some safety rails relax
    Emergency,
}

/// Caller-supplied context for a parse call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseContext {
    /// File the user currently has in focus
    pub current_file: Option<String>,
    /// Additional files the request concerns
    pub files: Vec<String>,
    /// Request urgency
    pub urgency: Urgency,
}

/// A parsed command. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Original input text
    pub raw: String,
    /// Detected intent name, `"unknown"` when nothing matched
    pub intent: String,
    /// Entities extracted from the text (and context)
    pub entities: Vec<Entity>,
    /// Confidence in the primary intent, [0, 1]
    pub confidence: f64,
    /// Agent best suited to handle the command
    pub suggested_agent: AgentId,
    /// Whether the intent typically spans several agents
    pub requires_multi_agent: bool,
    /// How ambiguous the interpretation is, [0, 1]
    pub ambiguity: f64,
    /// Runner-up interpretations, ranked
    pub alternatives: Vec<Alternative>,
    /// Hints shown when confidence is low or ambiguity high
    pub suggestions: Vec<String>,
}

impl Command {
    /// Whether the parser recognized any intent at all.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        self.intent != "unknown"
    }

    /// All values of a given entity kind, in extraction order.
    #[must_use]
    pub fn entity_values(&self, kind: EntityKind) -> Vec<&str> {
        self.entities
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.value.as_str())
            .collect()
    }

    /// First value of a given entity kind, if present.
    #[must_use]
    pub fn first_entity(&self, kind: EntityKind) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.value.as_str())
    }

    /// Whether any entity of the given kind was extracted.
    #[must_use]
    pub fn has_entity(&self, kind: EntityKind) -> bool {
        self.entities.iter().any(|e| e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_with_entities(entities: Vec<Entity>) -> Command {
        Command {
            raw: "test".to_string(),
            intent: "implement_feature".to_string(),
            entities,
            confidence: 0.9,
            suggested_agent: AgentId::Developer,
            requires_multi_agent: false,
            ambiguity: 0.0,
            alternatives: vec![],
            suggestions: vec![],
        }
    }

    #[test]
    fn test_entity_values_filters_by_kind() {
        let command = command_with_entities(vec![
            Entity {
                kind: EntityKind::FilePath,
                value: "src/auth.rs".to_string(),
                confidence: 0.9,
            },
            Entity {
                kind: EntityKind::Language,
                value: "rust".to_string(),
                confidence: 0.8,
            },
            Entity {
                kind: EntityKind::FilePath,
                value: "src/login.rs".to_string(),
                confidence: 0.7,
            },
        ]);

        assert_eq!(
            command.entity_values(EntityKind::FilePath),
            vec!["src/auth.rs", "src/login.rs"]
        );
        assert_eq!(command.first_entity(EntityKind::Language), Some("rust"));
        assert!(!command.has_entity(EntityKind::Framework));
    }

    #[test]
    fn test_urgency_default_and_serde() {
        assert_eq!(Urgency::default(), Urgency::Normal);
        let json = serde_json::to_string(&Urgency::Emergency).unwrap();
        assert_eq!(json, "\"emergency\"");
    }

    #[test]
    fn test_entity_kind_names() {
        assert_eq!(EntityKind::FilePath.as_str(), "file_path");
        assert_eq!(EntityKind::DesignPattern.to_string(), "design_pattern");
    }
}
