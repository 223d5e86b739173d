//! Typed entity extraction from normalized command text
//!
//! Each extractor pairs a regex with the context keywords that raise a
//! match's confidence when they appear within five tokens of it.

use super::types::{Entity, EntityKind, Token};
use regex::Regex;
use std::sync::LazyLock;

/// Base confidence for any regex match.
const BASE_CONFIDENCE: f64 = 0.7;
/// Confidence added per context keyword found near the match.
const CONTEXT_BONUS: f64 = 0.1;
/// Tokens on each side of a match that count as "nearby".
const CONTEXT_WINDOW: usize = 5;

/// A single entity extractor: regex plus confidence context.
pub(crate) struct EntityExtractor {
    pub(crate) kind: EntityKind,
    pub(crate) regex: Regex,
    pub(crate) context_keywords: &'static [&'static str],
}

fn extractor(
    kind: EntityKind,
    pattern: &str,
    context_keywords: &'static [&'static str],
) -> EntityExtractor {
    EntityExtractor {
        kind,
        regex: Regex::new(pattern).expect("extractor patterns are compile-time constants"),
        context_keywords,
    }
}

/// The built-in extractor registry, compiled once.
pub(crate) static EXTRACTORS: LazyLock<Vec<EntityExtractor>> = LazyLock::new(|| {
    vec![
        extractor(
            EntityKind::FilePath,
            r"(?:[a-z0-9_.-]+[/\\])+[a-z0-9_.-]+|\b[a-z0-9_-]+\.(?:rs|ts|tsx|js|jsx|py|go|java|rb|c|cpp|h|css|html|json|toml|yaml|yml|md|sql)\b",
            &["file", "path", "in", "inside", "under", "open"],
        ),
        extractor(
            EntityKind::Language,
            r"\b(?:rust|python|typescript|javascript|java|golang|ruby|kotlin|swift|scala|elixir)\b",
            &["language", "code", "in", "using", "with", "written"],
        ),
        extractor(
            EntityKind::Framework,
            r"\b(?:react|vue|angular|svelte|nextjs|axum|actix|tokio|django|flask|fastapi|rails|spring|express|laravel)\b",
            &["framework", "using", "with", "app", "frontend", "backend"],
        ),
        extractor(
            EntityKind::Action,
            r"\b(?:creat|implement|build|fix|repair|refactor|design|test|validat|verify|review|audit|deploy|releas|analyz|document|optimiz|migrat|updat|secur)(?:e|es|ed|ing|s)?\b",
            &[],
        ),
        extractor(
            EntityKind::Component,
            r"\b(?:endpoint|api|service|module|component|function|class|interface|model|schema|database|pipeline|controller|handler|middleware|queue|cache|dashboard|form|page)s?\b",
            &["create", "add", "build", "implement", "design", "new"],
        ),
        extractor(
            EntityKind::Technology,
            r"\b(?:docker|kubernetes|postgres|postgresql|mysql|sqlite|redis|kafka|rabbitmq|nginx|aws|gcp|azure|grpc|graphql|rest|websocket|oauth)\b",
            &["deploy", "using", "on", "via", "infrastructure", "stack"],
        ),
        extractor(
            EntityKind::DesignPattern,
            r"\b(?:singleton|factory|observer|strategy|adapter|decorator|facade|repository|mediator|visitor|mvc|cqrs|event[ -]?sourcing|pub[ -]?sub)\b",
            &["pattern", "design", "apply", "using", "refactor"],
        ),
        extractor(
            EntityKind::Timeframe,
            r"\b(?:today|tomorrow|tonight|asap|immediately|this (?:week|month|sprint)|next (?:week|month|sprint)|by (?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|eod|eow))\b",
            &["deadline", "due", "schedule", "finish", "deliver", "done"],
        ),
    ]
});

/// Run every extractor over the normalized text.
///
/// Duplicate (kind, value) pairs keep the highest-confidence occurrence;
/// distinct values of the same kind all survive. Output order follows the
/// registry then match position, so extraction is deterministic.
pub(crate) fn extract_entities(normalized: &str, tokens: &[Token]) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::new();

    for extractor in EXTRACTORS.iter() {
        for found in extractor.regex.find_iter(normalized) {
            let confidence = match_confidence(normalized, found.start(), extractor, tokens);
            let value = found.as_str().to_string();

            if let Some(existing) = entities
                .iter_mut()
                .find(|e| e.kind == extractor.kind && e.value == value)
            {
                if confidence > existing.confidence {
                    existing.confidence = confidence;
                }
            } else {
                entities.push(Entity {
                    kind: extractor.kind,
                    value,
                    confidence,
                });
            }
        }
    }

    entities
}

/// Base confidence plus a bonus per distinct context keyword within the
/// window around the match, capped at 1.0.
fn match_confidence(
    normalized: &str,
    match_start: usize,
    extractor: &EntityExtractor,
    tokens: &[Token],
) -> f64 {
    let index = normalized[..match_start].split_whitespace().count();
    let from = index.saturating_sub(CONTEXT_WINDOW);
    let to = (index + CONTEXT_WINDOW + 1).min(tokens.len());
    let window = &tokens[from..to.max(from)];

    let nearby = extractor
        .context_keywords
        .iter()
        .filter(|kw| window.iter().any(|t| t.text == **kw || t.lemma == **kw))
        .count();

    (BASE_CONFIDENCE + CONTEXT_BONUS * nearby as f64).min(1.0)
}
