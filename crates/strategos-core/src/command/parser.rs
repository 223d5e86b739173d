//! The command parser pipeline
//!
//! normalize → tokenize → extract entities → score patterns → rank
//! alternatives → ambiguity → suggestions. Pure computation, no I/O;
//! identical input and pattern table always produce identical output.

use super::entities::extract_entities;
use super::lexicon;
use super::patterns::{IntentPattern, ENTITY_WEIGHT, KEYWORD_WEIGHT};
use super::types::{Alternative, Command, Entity, EntityKind, ParseContext, Token, TokenKind};

use std::collections::HashSet;
use strategos_rpc::AgentId;
use tracing::debug;

/// Intent name when no pattern reaches the minimum score.
pub const UNKNOWN_INTENT: &str = "unknown";

/// Minimum score for a pattern to become the primary intent or an
/// alternative.
const MIN_INTENT_SCORE: f64 = 0.3;
/// Confidence assigned to entities injected from caller context.
const CONTEXT_ENTITY_CONFIDENCE: f64 = 0.6;
/// Per-entity confidence boost and its cap.
const ENTITY_BOOST: f64 = 0.05;
const ENTITY_BOOST_CAP: f64 = 0.2;
/// Boost applies only to entities above this confidence.
const ENTITY_BOOST_FLOOR: f64 = 0.8;
/// Thresholds past which the parser emits suggestions.
const LOW_CONFIDENCE: f64 = 0.5;
const HIGH_AMBIGUITY: f64 = 0.6;
/// Alternatives kept after ranking.
const MAX_ALTERNATIVES: usize = 3;

/// Lowercase, strip punctuation except path characters, collapse whitespace.
pub(crate) fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut cleaned = String::with_capacity(lower.len());
    for c in lower.chars() {
        if c.is_alphanumeric() || matches!(c, '/' | '\\' | '.' | '_' | '-') {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into classified tokens.
///
/// Trailing dots are sentence punctuation, not path characters, so they are
/// trimmed from the token text (".env" and "main.rs" survive intact).
pub(crate) fn tokenize(normalized: &str) -> Vec<Token> {
    normalized
        .split_whitespace()
        .enumerate()
        .map(|(position, raw)| {
            let trimmed = raw.trim_end_matches('.');
            let text = if trimmed.is_empty() { raw } else { trimmed }.to_string();
            let lemma = lexicon::lemma(&text);
            let kind = if lexicon::is_verb(&text) {
                TokenKind::Verb
            } else if lexicon::is_noun(&text) {
                TokenKind::Noun
            } else {
                TokenKind::Other
            };
            Token {
                text,
                lemma,
                kind,
                position,
            }
        })
        .collect()
}

/// The command-intent parser.
///
/// Holds the pattern table; everything else is computed per call.
pub struct CommandParser {
    patterns: Vec<IntentPattern>,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Create a parser with the built-in pattern table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: IntentPattern::defaults(),
        }
    }

    /// Create a parser with a custom pattern table.
    #[must_use]
    pub fn with_patterns(patterns: Vec<IntentPattern>) -> Self {
        Self { patterns }
    }

    /// Parse free text into a structured command.
    #[must_use]
    pub fn parse(&self, text: &str, context: Option<&ParseContext>) -> Command {
        let normalized = normalize(text);
        let tokens = tokenize(&normalized);
        let mut entities = extract_entities(&normalized, &tokens);
        inject_context_entities(&mut entities, context);

        let words: HashSet<&str> = tokens
            .iter()
            .flat_map(|t| [t.text.as_str(), t.lemma.as_str()])
            .collect();

        // One score per pattern, in table order.
        let scores: Vec<f64> = self
            .patterns
            .iter()
            .map(|p| {
                let mut score = 0.0;
                if p.regex_matches(&normalized) {
                    score += p.base_confidence;
                }
                score += KEYWORD_WEIGHT * p.keyword_overlap(&words);
                score += ENTITY_WEIGHT * p.entity_coverage(&entities);
                score
            })
            .collect();

        let primary = scores
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                // Ties go to the earlier pattern for determinism.
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ib.cmp(ia))
            })
            .map(|(i, score)| (i, *score))
            .filter(|(_, score)| *score > MIN_INTENT_SCORE);

        let alternatives = self.rank_alternatives(&scores, primary.map(|(i, _)| i), &words);

        let (intent, agent, multi_agent, confidence) = match primary {
            Some((index, score)) => {
                let pattern = &self.patterns[index];
                let confidence = (score + entity_boost(&entities)).min(1.0);
                (
                    pattern.name.clone(),
                    pattern.agent,
                    pattern.multi_agent,
                    confidence,
                )
            }
            None => {
                let best = scores.iter().copied().fold(0.0f64, f64::max);
                (UNKNOWN_INTENT.to_string(), AgentId::Pm, false, best)
            }
        };

        let ambiguity = ambiguity_score(confidence, &alternatives);
        let suggestions = if confidence < LOW_CONFIDENCE || ambiguity > HIGH_AMBIGUITY {
            self.build_suggestions(&normalized, primary.map(|(i, _)| i), &entities)
        } else {
            Vec::new()
        };

        debug!(
            intent = %intent,
            confidence = confidence,
            ambiguity = ambiguity,
            entities = entities.len(),
            "parsed command"
        );

        Command {
            raw: text.to_string(),
            intent,
            entities,
            confidence,
            suggested_agent: agent,
            requires_multi_agent: multi_agent,
            ambiguity,
            alternatives,
            suggestions,
        }
    }

    /// Patterns above the cutoff, deduplicated by (intent, agent), ranked,
    /// top three kept.
    fn rank_alternatives(
        &self,
        scores: &[f64],
        primary: Option<usize>,
        words: &HashSet<&str>,
    ) -> Vec<Alternative> {
        let mut alternatives: Vec<Alternative> = Vec::new();

        for (index, score) in scores.iter().enumerate() {
            if Some(index) == primary || *score <= MIN_INTENT_SCORE {
                continue;
            }
            let pattern = &self.patterns[index];
            let candidate = Alternative {
                intent: pattern.name.clone(),
                agent: pattern.agent,
                confidence: *score,
                reasoning: reasoning_for(pattern, words),
            };

            match alternatives
                .iter_mut()
                .find(|a| a.intent == candidate.intent && a.agent == candidate.agent)
            {
                Some(existing) if existing.confidence < candidate.confidence => {
                    *existing = candidate;
                }
                Some(_) => {}
                None => alternatives.push(candidate),
            }
        }

        alternatives.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.intent.cmp(&b.intent))
        });
        alternatives.truncate(MAX_ALTERNATIVES);
        alternatives
    }

    /// Missing-entity hints plus nearest example phrasings.
    fn build_suggestions(
        &self,
        normalized: &str,
        primary: Option<usize>,
        entities: &[Entity],
    ) -> Vec<String> {
        let mut suggestions = Vec::new();

        if let Some(index) = primary {
            for kind in &self.patterns[index].required_entities {
                if !entities.iter().any(|e| e.kind == *kind) {
                    suggestions.push(format!(
                        "Try including a {}, e.g. {}",
                        kind,
                        entity_example(*kind)
                    ));
                }
            }
        }

        let mut ranked: Vec<(f64, &str)> = self
            .patterns
            .iter()
            .flat_map(|p| p.examples.iter())
            .map(|example| (lexicon::similarity(normalized, example), example.as_str()))
            .collect();
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });
        for (_, example) in ranked.into_iter().take(2) {
            suggestions.push(format!("Did you mean: \"{example}\"?"));
        }

        suggestions
    }
}

/// Caller context contributes file-path entities the text itself lacks.
fn inject_context_entities(entities: &mut Vec<Entity>, context: Option<&ParseContext>) {
    let Some(context) = context else { return };
    for file in context.current_file.iter().chain(context.files.iter()) {
        if !entities
            .iter()
            .any(|e| e.kind == EntityKind::FilePath && e.value == *file)
        {
            entities.push(Entity {
                kind: EntityKind::FilePath,
                value: file.clone(),
                confidence: CONTEXT_ENTITY_CONFIDENCE,
            });
        }
    }
}

/// +0.05 per high-confidence entity, capped at +0.2.
fn entity_boost(entities: &[Entity]) -> f64 {
    let strong = entities
        .iter()
        .filter(|e| e.confidence > ENTITY_BOOST_FLOOR)
        .count();
    (ENTITY_BOOST * strong as f64).min(ENTITY_BOOST_CAP)
}

/// Mean of the closeness-to-best-alternative term and the
/// alternative-count term.
fn ambiguity_score(confidence: f64, alternatives: &[Alternative]) -> f64 {
    let closeness = match alternatives.first() {
        Some(best) => (1.0 - 2.0 * (confidence - best.confidence)).clamp(0.0, 1.0),
        None => 0.0,
    };
    let count = (alternatives.len() as f64 / MAX_ALTERNATIVES as f64).min(1.0);
    (closeness + count) / 2.0
}

/// Short explanation attached to an alternative.
fn reasoning_for(pattern: &IntentPattern, words: &HashSet<&str>) -> String {
    let matched: Vec<&str> = pattern
        .keywords
        .iter()
        .filter(|k| words.contains(k.as_str()))
        .map(String::as_str)
        .take(3)
        .collect();
    if matched.is_empty() {
        format!("pattern {} structure matched", pattern.name)
    } else {
        format!("matched keywords: {}", matched.join(", "))
    }
}

/// A plausible example value for a missing entity hint.
fn entity_example(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::FilePath => "src/main.rs",
        EntityKind::Language => "rust",
        EntityKind::Framework => "axum",
        EntityKind::Action => "create",
        EntityKind::Component => "endpoint",
        EntityKind::Technology => "postgres",
        EntityKind::DesignPattern => "repository",
        EntityKind::Timeframe => "this week",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_path_characters() {
        assert_eq!(
            normalize("Fix the BUG in src/auth_v2/login.rs, please!"),
            "fix the bug in src/auth_v2/login.rs please"
        );
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  create   a\tservice  "), "create a service");
    }

    #[test]
    fn test_tokenize_trims_sentence_dots() {
        let tokens = tokenize("fix the bug. now");
        assert_eq!(tokens[2].text, "bug");
        assert_eq!(tokens[2].kind, TokenKind::Noun);
        assert_eq!(tokens[3].position, 3);
    }

    #[test]
    fn test_tokenize_classifies_verbs() {
        let tokens = tokenize("deploying the service");
        assert_eq!(tokens[0].kind, TokenKind::Verb);
        assert_eq!(tokens[0].lemma, "deploy");
    }

    #[test]
    fn test_entity_boost_cap() {
        let strong = |kind| Entity {
            kind,
            value: "v".to_string(),
            confidence: 0.9,
        };
        let entities = vec![
            strong(EntityKind::FilePath),
            strong(EntityKind::Language),
            strong(EntityKind::Framework),
            strong(EntityKind::Component),
            strong(EntityKind::Technology),
        ];
        assert!((entity_boost(&entities) - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ambiguity_zero_without_alternatives() {
        assert!((ambiguity_score(0.9, &[]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ambiguity_high_when_close() {
        let alternatives = vec![
            Alternative {
                intent: "a".to_string(),
                agent: AgentId::Developer,
                confidence: 0.58,
                reasoning: String::new(),
            },
            Alternative {
                intent: "b".to_string(),
                agent: AgentId::Qa,
                confidence: 0.4,
                reasoning: String::new(),
            },
            Alternative {
                intent: "c".to_string(),
                agent: AgentId::Pm,
                confidence: 0.35,
                reasoning: String::new(),
            },
        ];
        // closeness = 1 - 2*(0.6 - 0.58) = 0.96, count = 1.0
        let score = ambiguity_score(0.6, &alternatives);
        assert!((score - 0.98).abs() < 1e-9);
    }
}
