//! Pre-analysis request and report types

use crate::command::Urgency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Breaking-change risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No breaking changes detected
    Low,
    /// One or two breaking changes
    Medium,
    /// Three or four breaking changes
    High,
    /// Five or more breaking changes
    Critical,
}

impl RiskLevel {
    /// Derive a risk level from the number of detected breaking changes.
    #[must_use]
    pub fn from_breaking_changes(count: usize) -> Self {
        match count {
            0 => Self::Low,
            1..=2 => Self::Medium,
            3..=4 => Self::High,
            _ => Self::Critical,
        }
    }

    /// Stable wire name for the risk level
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-analysis request describing the operation about to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutRequest {
    /// Short operation name, e.g. the parsed intent
    pub operation: String,
    /// What the operation intends to do
    pub description: String,
    /// Code context, when the caller has a relevant snippet
    pub snippet: Option<String>,
    /// File context, when the caller knows which files are involved
    pub files: Vec<String>,
    /// Urgency carried over from the originating command
    pub urgency: Urgency,
}

impl ScoutRequest {
    /// Create a request with no code or file context.
    #[must_use]
    pub fn new(operation: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            description: description.into(),
            snippet: None,
            files: Vec::new(),
            urgency: Urgency::default(),
        }
    }

    /// Attach a code snippet.
    #[must_use]
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Attach file context.
    #[must_use]
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    /// Set the urgency.
    #[must_use]
    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Stable cache key over operation, description and context.
    ///
    /// Urgency is deliberately not part of the key: it shapes the
    /// recommendation, not the analysis itself.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.operation.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.description.as_bytes());
        hasher.update([0x1f]);
        if let Some(snippet) = &self.snippet {
            hasher.update(snippet.as_bytes());
        }
        hasher.update([0x1f]);
        for file in &self.files {
            hasher.update(file.as_bytes());
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A detected similarity to existing code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicationMatch {
    /// File believed to contain the similar implementation
    pub file: String,
    /// Similarity in [0, 1]
    pub similarity: f64,
    /// Matched line ranges, when known
    pub lines: Vec<(u32, u32)>,
    /// Label for the matched pattern
    pub pattern: String,
    /// What to do instead of duplicating
    pub suggestion: String,
}

/// Estimated blast radius of the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyImpact {
    /// Files likely touched by the operation
    pub affected_files: Vec<String>,
    /// Breaking-change indicators found in the request
    pub breaking_changes: Vec<String>,
    /// Risk level derived from the breaking-change count
    pub risk: RiskLevel,
    /// Rough effort estimate matching the risk
    pub effort_estimate: String,
}

/// Kind of technical debt found in a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtKind {
    /// Stale markers such as TODO or FIXME
    Obsolete,
    /// Leftover debug statements
    Debug,
    /// Oversized code blocks
    Complexity,
}

/// Severity of a technical-debt item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtSeverity {
    /// Cosmetic
    Low,
    /// Worth cleaning up soon
    Medium,
    /// Actively risky to build on
    High,
    /// Must be addressed before new work
    Critical,
}

/// A single technical-debt finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechDebtItem {
    /// What kind of debt this is
    pub kind: DebtKind,
    /// How urgent it is
    pub severity: DebtSeverity,
    /// Line in the snippet, when attributable
    pub line: Option<u32>,
    /// What was found
    pub description: String,
    /// How to address it
    pub suggestion: String,
}

/// Compact risk overview for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummary {
    /// Worst risk across all three analyses
    pub overall: RiskLevel,
    /// Number of duplication matches
    pub duplication_count: usize,
    /// Highest duplication similarity found
    pub highest_similarity: f64,
    /// Number of breaking-change indicators
    pub breaking_change_count: usize,
    /// Number of technical-debt findings
    pub debt_count: usize,
    /// One-line human-readable summary
    pub headline: String,
}

/// The combined pre-analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutReport {
    /// Operation this report was produced for
    pub operation: String,
    /// Similar existing implementations
    pub duplications: Vec<DuplicationMatch>,
    /// Estimated blast radius
    pub dependency_impact: DependencyImpact,
    /// Technical-debt findings in the provided snippet
    pub tech_debt: Vec<TechDebtItem>,
    /// Whether the workflow should continue without confirmation
    pub should_proceed: bool,
    /// Human-readable warnings
    pub warnings: Vec<String>,
    /// Human-readable suggestions
    pub suggestions: Vec<String>,
    /// Confidence in the analysis, based on its completeness
    pub confidence: f64,
    /// Compact overview for status displays
    pub risk_summary: RiskSummary,
    /// True when served from the cache
    pub cache_hit: bool,
    /// When the analysis ran
    pub generated_at: DateTime<Utc>,
}
