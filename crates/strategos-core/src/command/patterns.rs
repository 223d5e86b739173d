//! Intent pattern definitions and the built-in pattern table
//!
//! Patterns are plain data so the matcher stays pure: a regex gate, a
//! keyword set, required entity kinds, and routing metadata.

use super::types::{Entity, EntityKind};
use regex::Regex;
use std::collections::HashSet;
use strategos_rpc::AgentId;

/// Weight of a regex hit in the intent score.
pub(crate) const DEFAULT_MATCH_WEIGHT: f64 = 0.4;
/// Maximum contribution of keyword overlap.
pub(crate) const KEYWORD_WEIGHT: f64 = 0.4;
/// Maximum contribution of required-entity coverage.
pub(crate) const ENTITY_WEIGHT: f64 = 0.2;

/// A named intent rule
#[derive(Debug)]
pub struct IntentPattern {
    /// Intent name this pattern detects
    pub name: String,
    /// Optional regex gate over the normalized text
    pub regex: Option<Regex>,
    /// Keywords whose overlap with the input raises the score
    pub keywords: Vec<String>,
    /// Entity kinds the intent needs to be actionable
    pub required_entities: Vec<EntityKind>,
    /// Score contributed by a regex hit
    pub base_confidence: f64,
    /// Agent that handles this intent
    pub agent: AgentId,
    /// Whether fulfilling the intent typically spans several agents
    pub multi_agent: bool,
    /// Example phrasings, used for "did you mean" suggestions
    pub examples: Vec<String>,
}

impl IntentPattern {
    /// Create a pattern with no regex, keywords, or requirements.
    #[must_use]
    pub fn new(name: impl Into<String>, agent: AgentId) -> Self {
        Self {
            name: name.into(),
            regex: None,
            keywords: Vec::new(),
            required_entities: Vec::new(),
            base_confidence: DEFAULT_MATCH_WEIGHT,
            agent,
            multi_agent: false,
            examples: Vec::new(),
        }
    }

    /// Set the regex gate.
    #[must_use]
    pub fn with_regex(mut self, regex: Regex) -> Self {
        self.regex = Some(regex);
        self
    }

    /// Set the keyword list.
    #[must_use]
    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Set the required entity kinds.
    #[must_use]
    pub fn with_required(mut self, required: &[EntityKind]) -> Self {
        self.required_entities = required.to_vec();
        self
    }

    /// Set the regex-hit score contribution.
    #[must_use]
    pub fn with_base_confidence(mut self, base: f64) -> Self {
        self.base_confidence = base;
        self
    }

    /// Mark the intent as spanning several agents.
    #[must_use]
    pub fn multi_agent(mut self) -> Self {
        self.multi_agent = true;
        self
    }

    /// Set the example phrasings.
    #[must_use]
    pub fn with_examples(mut self, examples: &[&str]) -> Self {
        self.examples = examples.iter().map(|e| (*e).to_string()).collect();
        self
    }

    /// Whether the regex gate matches; false when the pattern has none.
    #[must_use]
    pub fn regex_matches(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Fraction of this pattern's keywords present in the token set.
    #[must_use]
    pub fn keyword_overlap(&self, words: &HashSet<&str>) -> f64 {
        if self.keywords.is_empty() {
            return 0.0;
        }
        let hits = self
            .keywords
            .iter()
            .filter(|k| words.contains(k.as_str()))
            .count();
        hits as f64 / self.keywords.len() as f64
    }

    /// Fraction of required entity kinds present; 1.0 when none required.
    #[must_use]
    pub fn entity_coverage(&self, entities: &[Entity]) -> f64 {
        if self.required_entities.is_empty() {
            return 1.0;
        }
        let hits = self
            .required_entities
            .iter()
            .filter(|kind| entities.iter().any(|e| e.kind == **kind))
            .count();
        hits as f64 / self.required_entities.len() as f64
    }

    /// The built-in pattern table.
    #[must_use]
    pub fn defaults() -> Vec<IntentPattern> {
        let re = |pattern: &str| {
            Regex::new(pattern).expect("default intent patterns are compile-time constants")
        };

        vec![
            IntentPattern::new("implement_feature", AgentId::Developer)
                .with_regex(re(
                    r"\b(?:creat(?:e|ing)?|add(?:ing)?|implement(?:ing)?|build(?:ing)?)\b\s+\S+",
                ))
                .with_keywords(&[
                    "create", "add", "implement", "build", "feature", "endpoint", "api", "service",
                ])
                .with_required(&[EntityKind::Component])
                .multi_agent()
                .with_examples(&[
                    "create a login endpoint",
                    "add a user profile page",
                    "implement a payment service",
                ]),
            IntentPattern::new("fix_bug", AgentId::Developer)
                .with_regex(re(
                    r"\b(?:fix(?:es|ed|ing)?|repair(?:ing)?|resolv(?:e|ing)|debug(?:ging)?|patch(?:ing)?)\b|\b(?:bug|crash|broken|failing)\b",
                ))
                .with_keywords(&[
                    "fix", "bug", "error", "crash", "issue", "broken", "failing", "debug",
                ])
                .with_examples(&[
                    "fix the login bug",
                    "the checkout page is broken",
                    "resolve the crash in payments",
                ]),
            IntentPattern::new("refactor_code", AgentId::Developer)
                .with_regex(re(
                    r"\b(?:refactor(?:ing)?|clean(?:up| up)?|simplif(?:y|ying)|restructur(?:e|ing)|optimiz(?:e|ing))\b",
                ))
                .with_keywords(&[
                    "refactor", "cleanup", "clean", "simplify", "restructure", "improve",
                    "optimize",
                ])
                .with_examples(&[
                    "refactor the auth module",
                    "clean up the parser",
                    "optimize the query layer",
                ]),
            IntentPattern::new("design_architecture", AgentId::Architect)
                .with_regex(re(r"\b(?:design(?:ing)?|architect(?:ure)?|diagram|blueprint)\b"))
                .with_keywords(&[
                    "design", "architecture", "structure", "diagram", "blueprint", "layout",
                ])
                .with_examples(&[
                    "design the service architecture",
                    "draw a component diagram for billing",
                ]),
            IntentPattern::new("write_tests", AgentId::Qa)
                .with_regex(re(r"\b(?:test(?:s|ing)?|coverage|unit|integration|e2e)\b"))
                .with_keywords(&["test", "coverage", "unit", "integration", "e2e", "regression"])
                .with_examples(&[
                    "write unit tests for the parser",
                    "increase coverage on the auth module",
                ]),
            IntentPattern::new("security_review", AgentId::Guardian)
                .with_regex(re(
                    r"\b(?:security|audit(?:ing)?|vulnerabilit(?:y|ies)|penetration|secure|harden(?:ing)?)\b",
                ))
                .with_keywords(&[
                    "security", "audit", "vulnerability", "review", "penetration", "secure",
                ])
                .with_examples(&[
                    "run a security audit",
                    "review the auth flow for vulnerabilities",
                ]),
            IntentPattern::new("analyze_impact", AgentId::Scout)
                .with_regex(re(
                    r"\b(?:analyz(?:e|ing)|analysis|impact|duplication|debt)\b",
                ))
                .with_keywords(&[
                    "analyze", "analysis", "impact", "duplication", "debt", "dependencies",
                ])
                .with_examples(&[
                    "analyze the impact of removing the cache",
                    "check for duplication before i start",
                ]),
            IntentPattern::new("plan_project", AgentId::Pm)
                .with_regex(re(r"\b(?:plan(?:ning)?|roadmap|milestone|schedule|sprint)\b"))
                .with_keywords(&[
                    "plan", "roadmap", "milestone", "schedule", "sprint", "breakdown",
                ])
                .multi_agent()
                .with_examples(&["plan the next sprint", "break down the billing epic"]),
            IntentPattern::new("deploy_release", AgentId::Po)
                .with_regex(re(
                    r"\b(?:deploy(?:ing|ment)?|releas(?:e|ing)|ship(?:ping)?|publish(?:ing)?|rollout)\b",
                ))
                .with_keywords(&[
                    "deploy", "release", "ship", "publish", "production", "rollout",
                ])
                .multi_agent()
                .with_examples(&["deploy to production", "ship the new release"]),
            IntentPattern::new("document_code", AgentId::Developer)
                .with_regex(re(r"\b(?:document(?:ation|ing)?|docs|readme)\b"))
                .with_keywords(&["document", "documentation", "docs", "readme", "comment"])
                .with_examples(&["document the public api", "update the readme"]),
        ]
    }
}
