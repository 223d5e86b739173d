//! Static lexicons and string helpers for tokenization
//!
//! Word lists are deliberately small and curated; classification only has to
//! be good enough to drive keyword overlap and entity context scoring.

/// Action words the tokenizer classifies as verbs.
const VERBS: &[&str] = &[
    "create", "add", "implement", "build", "make", "write", "develop", "fix", "repair", "resolve",
    "debug", "patch", "refactor", "clean", "simplify", "restructure", "optimize", "design", "plan",
    "architect", "test", "verify", "validate", "check", "review", "audit", "analyze", "inspect",
    "scan", "deploy", "release", "ship", "publish", "update", "upgrade", "migrate", "remove",
    "delete", "document", "schedule", "secure",
];

/// Object words the tokenizer classifies as nouns.
const NOUNS: &[&str] = &[
    "feature", "function", "endpoint", "api", "module", "component", "service", "bug", "error",
    "crash", "issue", "defect", "test", "coverage", "architecture", "structure", "design",
    "diagram", "database", "schema", "model", "interface", "class", "method", "pipeline",
    "workflow", "code", "file", "project", "release", "deployment", "security", "vulnerability",
    "authentication", "login", "password", "token", "payment", "performance", "documentation",
    "roadmap", "milestone",
];

/// Filler words ignored for keyword matching.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "to", "for", "of", "in", "on", "at", "with", "and", "or", "please", "can",
    "could", "you", "we", "i", "me", "my", "our", "us", "this", "that", "it", "is", "are", "be",
    "do", "does", "need", "want", "should", "would", "some",
];

/// Words that force a validation step into any workflow touching them.
pub const SECURITY_KEYWORDS: &[&str] = &[
    "security", "auth", "authentication", "authorization", "password", "token", "secret",
    "credential", "payment", "encryption", "vulnerability", "login", "oauth", "session",
];

/// Whether the word (or its lemma) is a known action verb.
#[must_use]
pub fn is_verb(word: &str) -> bool {
    if VERBS.contains(&word) {
        return true;
    }
    let stem = lemma(word);
    VERBS.contains(&stem.as_str()) || VERBS.contains(&format!("{stem}e").as_str())
}

/// Whether the word (or its lemma) is a known object noun.
#[must_use]
pub fn is_noun(word: &str) -> bool {
    if NOUNS.contains(&word) {
        return true;
    }
    let stem = lemma(word);
    NOUNS.contains(&stem.as_str()) || NOUNS.contains(&format!("{stem}e").as_str())
}

/// Whether the word carries no signal for intent matching.
#[must_use]
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Naive lemma: strip `ing`/`ed`/plural `s` suffixes.
///
/// First matching rule wins; short words are left alone so "ring" or "red"
/// survive intact.
#[must_use]
pub fn lemma(word: &str) -> String {
    if word.len() > 5 {
        if let Some(stem) = word.strip_suffix("ing") {
            return stem.to_string();
        }
    }
    if word.len() > 4 {
        if let Some(stem) = word.strip_suffix("ied") {
            return format!("{stem}y");
        }
        if let Some(stem) = word.strip_suffix("ed") {
            return stem.to_string();
        }
        for plural in ["ses", "xes", "ches", "shes"] {
            if word.ends_with(plural) {
                return word[..word.len() - 2].to_string();
            }
        }
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

/// Edit-distance similarity in [0, 1]; 1.0 means identical.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}
