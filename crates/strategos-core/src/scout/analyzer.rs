//! The three pre-analysis passes: duplication, dependency impact, tech debt
//!
//! All passes are pure, synchronous computations over the request content.
//! The duplication pass compares against a registry of implementations the
//! codebase is known to already have.

use crate::command::lexicon;
use crate::scout::types::{
    DebtKind, DebtSeverity, DependencyImpact, DuplicationMatch, RiskLevel, ScoutRequest,
    TechDebtItem,
};
use std::collections::{HashMap, HashSet};

/// Minimum snippet-to-signature similarity that counts as a match.
const SNIPPET_SIMILARITY_FLOOR: f64 = 0.3;

/// Minimum file-stem similarity that counts as a naming sibling.
const SIBLING_SIMILARITY_FLOOR: f64 = 0.7;

/// Character budget per code block before it counts as a complexity smell.
const BLOCK_SIZE_LIMIT: usize = 1000;

/// Character budget past which an oversized block is high severity.
const BLOCK_SIZE_SEVERE: usize = 2000;

struct KnownImplementation {
    keywords: &'static [&'static str],
    file: &'static str,
    pattern: &'static str,
    signature: &'static str,
    suggestion: &'static str,
}

static KNOWN_IMPLEMENTATIONS: &[KnownImplementation] = &[
    KnownImplementation {
        keywords: &["auth", "authentication", "login", "session", "oauth"],
        file: "src/auth/service.rs",
        pattern: "authentication flow",
        signature: "pub async fn authenticate(credentials: Credentials) -> Result<Session> { let user = verify_password(&credentials).await?; issue_session_token(user) }",
        suggestion: "Extend the existing authentication service instead of adding a second login path",
    },
    KnownImplementation {
        keywords: &["payment", "billing", "checkout", "invoice"],
        file: "src/billing/processor.rs",
        pattern: "payment processing",
        signature: "pub async fn charge(order: &Order, method: PaymentMethod) -> Result<Receipt> { validate_amount(order)?; gateway.charge(order.total, method).await }",
        suggestion: "Reuse the billing processor; new payment flows belong behind its gateway trait",
    },
    KnownImplementation {
        keywords: &["user", "registration", "signup", "account", "profile"],
        file: "src/users/registry.rs",
        pattern: "user registration",
        signature: "pub async fn register_user(input: NewUser) -> Result<UserId> { validate_email(&input.email)?; store.insert_user(input).await }",
        suggestion: "The user registry already covers registration and profile management",
    },
    KnownImplementation {
        keywords: &["cache", "caching", "memoize", "ttl"],
        file: "src/cache/store.rs",
        pattern: "cache layer",
        signature: "pub fn get_or_insert(&self, key: &str, produce: impl FnOnce() -> CachedValue) -> CachedValue { self.entries.entry(key.to_string()).or_insert_with(produce).clone() }",
        suggestion: "Use the shared cache store rather than a new ad-hoc map",
    },
    KnownImplementation {
        keywords: &["validation", "validate", "sanitize", "schema"],
        file: "src/validation/rules.rs",
        pattern: "input validation",
        signature: "pub fn validate_input(value: &Value, rules: &[Rule]) -> Vec<Violation> { rules.iter().filter_map(|rule| rule.check(value)).collect() }",
        suggestion: "Add a rule to the validation module instead of inline checks",
    },
    KnownImplementation {
        keywords: &["api", "endpoint", "rest", "route", "handler"],
        file: "src/api/routes.rs",
        pattern: "http routing",
        signature: "pub fn register_routes(router: Router) -> Router { router.route(\"/v1/users\", post(create_user)).route(\"/v1/users/:id\", get(fetch_user)) }",
        suggestion: "Register new endpoints in the existing route table",
    },
    KnownImplementation {
        keywords: &["config", "configuration", "settings"],
        file: "src/config/loader.rs",
        pattern: "configuration loading",
        signature: "pub fn load_settings(path: &Path) -> Result<Settings> { let raw = fs::read_to_string(path)?; toml::from_str(&raw).map_err(Into::into) }",
        suggestion: "Extend the configuration loader rather than reading files directly",
    },
    KnownImplementation {
        keywords: &["notification", "email", "webhook", "alert"],
        file: "src/notify/dispatcher.rs",
        pattern: "notification dispatch",
        signature: "pub async fn dispatch(notification: Notification) -> Result<()> { for channel in active_channels() { channel.deliver(&notification).await?; } Ok(()) }",
        suggestion: "Route new notification kinds through the dispatcher",
    },
];

/// Breaking-change wording scanned for in the description.
static BREAKING_MARKERS: &[&str] = &[
    "remove",
    "delete",
    "drop",
    "rename",
    "replace",
    "breaking",
    "migrate",
    "migration",
    "deprecate",
    "incompatible",
    "rewrite",
    "restructure",
];

fn token_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| token.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

/// Search for existing implementations the request would duplicate.
///
/// Three sources feed the result: keyword overlap between the description
/// and the registry, token similarity between the provided snippet and the
/// registry signatures, and file-name siblings in the file context. Matches
/// are deduplicated per file keeping the highest similarity.
pub fn find_duplications(request: &ScoutRequest) -> Vec<DuplicationMatch> {
    let description_tokens = token_set(&format!("{} {}", request.operation, request.description));
    let mut matches: Vec<DuplicationMatch> = Vec::new();

    for known in KNOWN_IMPLEMENTATIONS {
        let hits = known
            .keywords
            .iter()
            .filter(|keyword| description_tokens.contains(**keyword))
            .count();
        if hits > 0 {
            let similarity = 0.5 + 0.5 * (hits as f64 / known.keywords.len() as f64);
            matches.push(DuplicationMatch {
                file: known.file.to_string(),
                similarity,
                lines: Vec::new(),
                pattern: known.pattern.to_string(),
                suggestion: known.suggestion.to_string(),
            });
        }
    }

    if let Some(snippet) = &request.snippet {
        let snippet_tokens = token_set(snippet);
        let snippet_lines = snippet.lines().count().max(1) as u32;
        for known in KNOWN_IMPLEMENTATIONS {
            let similarity = jaccard(&snippet_tokens, &token_set(known.signature));
            if similarity > SNIPPET_SIMILARITY_FLOOR {
                matches.push(DuplicationMatch {
                    file: known.file.to_string(),
                    similarity,
                    lines: vec![(1, snippet_lines)],
                    pattern: known.pattern.to_string(),
                    suggestion: known.suggestion.to_string(),
                });
            }
        }
    }

    for file in &request.files {
        let stem = file_stem(file);
        for known in KNOWN_IMPLEMENTATIONS {
            let known_stem = file_stem(known.file);
            let similarity = lexicon::similarity(stem, known_stem);
            if similarity > SIBLING_SIMILARITY_FLOOR {
                matches.push(DuplicationMatch {
                    file: known.file.to_string(),
                    similarity,
                    lines: Vec::new(),
                    pattern: "file naming overlap".to_string(),
                    suggestion: format!("Review {} before adding {}", known.file, file),
                });
            }
        }
    }

    let mut by_file: HashMap<String, DuplicationMatch> = HashMap::new();
    for candidate in matches {
        match by_file.get(&candidate.file) {
            Some(existing) if existing.similarity >= candidate.similarity => {}
            _ => {
                by_file.insert(candidate.file.clone(), candidate);
            }
        }
    }

    let mut deduped: Vec<DuplicationMatch> = by_file.into_values().collect();
    deduped.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.file.cmp(&b.file))
    });
    deduped
}

/// Estimate which files the operation touches and how risky it is.
pub fn assess_dependencies(request: &ScoutRequest) -> DependencyImpact {
    let description_tokens = token_set(&format!("{} {}", request.operation, request.description));

    let mut affected: Vec<String> = request.files.clone();
    for known in KNOWN_IMPLEMENTATIONS {
        let touches = known
            .keywords
            .iter()
            .any(|keyword| description_tokens.contains(*keyword));
        if touches {
            affected.push(known.file.to_string());
        }
    }
    affected.sort();
    affected.dedup();

    let breaking_changes: Vec<String> = BREAKING_MARKERS
        .iter()
        .filter(|marker| description_tokens.contains(**marker))
        .map(|marker| format!("description mentions \"{marker}\""))
        .collect();

    let risk = RiskLevel::from_breaking_changes(breaking_changes.len());
    let effort_estimate = match risk {
        RiskLevel::Low => "a few hours",
        RiskLevel::Medium => "one to two days",
        RiskLevel::High => "three to five days",
        RiskLevel::Critical => "a week or more",
    }
    .to_string();

    DependencyImpact {
        affected_files: affected,
        breaking_changes,
        risk,
        effort_estimate,
    }
}

/// Scan a snippet for stale markers, debug statements and oversized blocks.
pub fn scan_tech_debt(snippet: &str) -> Vec<TechDebtItem> {
    let mut items = Vec::new();

    let markers: [(&str, DebtSeverity); 4] = [
        ("TODO", DebtSeverity::Low),
        ("FIXME", DebtSeverity::Medium),
        ("HACK", DebtSeverity::High),
        ("XXX", DebtSeverity::High),
    ];
    let debug_calls = [
        "println!",
        "dbg!",
        "console.log",
        "console.debug",
        "print(",
        "debugger",
    ];

    for (idx, line) in snippet.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        for (marker, severity) in markers {
            if line.contains(marker) {
                items.push(TechDebtItem {
                    kind: DebtKind::Obsolete,
                    severity,
                    line: Some(line_no),
                    description: format!("stale {marker} marker"),
                    suggestion: format!("Resolve or file the {marker} before building on this code"),
                });
            }
        }
        for call in debug_calls {
            if line.contains(call) {
                items.push(TechDebtItem {
                    kind: DebtKind::Debug,
                    severity: DebtSeverity::Low,
                    line: Some(line_no),
                    description: format!("debug statement {call}"),
                    suggestion: "Replace debug output with structured logging".to_string(),
                });
                break;
            }
        }
    }

    items.extend(scan_oversized_blocks(snippet));
    items
}

/// Blocks are runs of non-blank lines; a block past the size limit is a
/// complexity smell.
fn scan_oversized_blocks(snippet: &str) -> Vec<TechDebtItem> {
    let mut items = Vec::new();
    let mut block_start: Option<u32> = None;
    let mut block_chars = 0usize;

    let mut flush = |start: Option<u32>, chars: usize, items: &mut Vec<TechDebtItem>| {
        let Some(start_line) = start else { return };
        if chars > BLOCK_SIZE_LIMIT {
            let severity = if chars > BLOCK_SIZE_SEVERE {
                DebtSeverity::High
            } else {
                DebtSeverity::Medium
            };
            items.push(TechDebtItem {
                kind: DebtKind::Complexity,
                severity,
                line: Some(start_line),
                description: format!("block of {chars} characters starting at line {start_line}"),
                suggestion: "Split this block into smaller units".to_string(),
            });
        }
    };

    for (idx, line) in snippet.lines().enumerate() {
        if line.trim().is_empty() {
            flush(block_start, block_chars, &mut items);
            block_start = None;
            block_chars = 0;
        } else {
            if block_start.is_none() {
                block_start = Some((idx + 1) as u32);
            }
            block_chars += line.len() + 1;
        }
    }
    flush(block_start, block_chars, &mut items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Urgency;

    #[test]
    fn test_keyword_mapping_finds_known_implementation() {
        let request = ScoutRequest::new("create_feature", "implement payment processing");
        let matches = find_duplications(&request);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].file, "src/billing/processor.rs");
        assert!((matches[0].similarity - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_dense_keyword_coverage_scores_above_blocking_threshold() {
        let request = ScoutRequest::new(
            "create_feature",
            "rework the login authentication session oauth flow",
        );
        let matches = find_duplications(&request);
        assert_eq!(matches[0].file, "src/auth/service.rs");
        assert!(matches[0].similarity > 0.8);
    }

    #[test]
    fn test_snippet_similarity_matches_signature() {
        let request = ScoutRequest::new("create_feature", "add a helper")
            .with_snippet("async fn authenticate(credentials: Credentials) -> Session");
        let matches = find_duplications(&request);
        assert!(matches
            .iter()
            .any(|m| m.file == "src/auth/service.rs" && m.similarity > 0.3));
        let auth = matches
            .iter()
            .find(|m| m.file == "src/auth/service.rs")
            .unwrap();
        assert_eq!(auth.lines, vec![(1, 1)]);
    }

    #[test]
    fn test_file_name_sibling_detected() {
        let request = ScoutRequest::new("create_feature", "add a module")
            .with_files(vec!["src/users/registry2.rs".to_string()]);
        let matches = find_duplications(&request);
        assert!(matches
            .iter()
            .any(|m| m.file == "src/users/registry.rs" && m.pattern == "file naming overlap"));
    }

    #[test]
    fn test_matches_deduplicated_by_file() {
        let request = ScoutRequest::new("create_feature", "implement user registration")
            .with_files(vec!["src/users/registry2.rs".to_string()]);
        let matches = find_duplications(&request);
        let registry_matches = matches
            .iter()
            .filter(|m| m.file == "src/users/registry.rs")
            .count();
        assert_eq!(registry_matches, 1);
    }

    #[test]
    fn test_no_breaking_markers_is_low_risk() {
        let request = ScoutRequest::new("create_feature", "add a status page");
        let impact = assess_dependencies(&request);
        assert!(impact.breaking_changes.is_empty());
        assert_eq!(impact.risk, RiskLevel::Low);
    }

    #[test]
    fn test_breaking_markers_raise_risk() {
        let request = ScoutRequest::new(
            "refactor_code",
            "remove the legacy api and rename the config keys",
        );
        let impact = assess_dependencies(&request);
        assert_eq!(impact.breaking_changes.len(), 2);
        assert_eq!(impact.risk, RiskLevel::Medium);

        let heavy = ScoutRequest::new(
            "refactor_code",
            "remove delete rename replace and migrate everything",
        );
        let impact = assess_dependencies(&heavy);
        assert_eq!(impact.breaking_changes.len(), 5);
        assert_eq!(impact.risk, RiskLevel::Critical);
    }

    #[test]
    fn test_affected_files_merge_context_and_known() {
        let request = ScoutRequest::new("fix_bug", "fix the payment checkout flow")
            .with_files(vec!["src/orders.rs".to_string()]);
        let impact = assess_dependencies(&request);
        assert!(impact
            .affected_files
            .contains(&"src/billing/processor.rs".to_string()));
        assert!(impact.affected_files.contains(&"src/orders.rs".to_string()));
    }

    #[test]
    fn test_debt_scan_finds_marker_and_oversized_block() {
        let big_block = "let x = 1;".repeat(120);
        let snippet = format!("// TODO: clean this up\n\n{big_block}\n");
        let items = scan_tech_debt(&snippet);

        assert!(items
            .iter()
            .any(|i| i.kind == DebtKind::Obsolete && i.line == Some(1)));
        assert!(items.iter().any(|i| i.kind == DebtKind::Complexity));
    }

    #[test]
    fn test_debt_scan_finds_debug_statements() {
        let snippet = "fn run() {\n    println!(\"here\");\n}";
        let items = scan_tech_debt(snippet);
        assert!(items
            .iter()
            .any(|i| i.kind == DebtKind::Debug && i.line == Some(2)));
    }

    #[test]
    fn test_clean_snippet_has_no_debt() {
        let snippet = "fn add(a: u32, b: u32) -> u32 {\n    a + b\n}";
        assert!(scan_tech_debt(snippet).is_empty());
    }

    #[test]
    fn test_oversized_block_severity_scales() {
        let medium = "let value = compute();\n".repeat(50);
        let items = scan_oversized_blocks(&medium);
        assert_eq!(items[0].severity, DebtSeverity::Medium);

        let severe = "let value = compute();\n".repeat(100);
        let items = scan_oversized_blocks(&severe);
        assert_eq!(items[0].severity, DebtSeverity::High);
    }

    #[test]
    fn test_urgency_does_not_change_analysis() {
        let normal = ScoutRequest::new("fix_bug", "fix the payment flow");
        let urgent = normal.clone().with_urgency(Urgency::Emergency);
        let a = find_duplications(&normal);
        let b = find_duplications(&urgent);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].similarity, b[0].similarity);
    }
}
