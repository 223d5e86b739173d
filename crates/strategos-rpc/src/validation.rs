//! Validation backend wire types and client
//!
//! Validation requests ride the same agent transport as any other call: the
//! payload carries an `action` discriminant plus its parameters, and the
//! response embeds the shared issue/report shapes defined here.

use crate::error::{Error, Result};
use crate::transport::AgentTransport;
use crate::types::{AgentId, AgentRequest, TaskKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Severity of a single validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Informational finding
    Info,
    /// Should be addressed, does not block
    Warning,
    /// Defect that should block risky operations
    Error,
    /// Must be fixed before anything ships
    Critical,
}

impl IssueSeverity {
    /// All severities, mildest first.
    pub const ALL: [IssueSeverity; 4] = [
        IssueSeverity::Info,
        IssueSeverity::Warning,
        IssueSeverity::Error,
        IssueSeverity::Critical,
    ];

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Info => "info",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
            IssueSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad category a validation rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    /// Vulnerabilities and unsafe handling of data
    Security,
    /// Slow paths and wasteful resource use
    Performance,
    /// General code quality and style
    Quality,
    /// Structural and layering violations
    Architecture,
    /// Missing or weak test coverage
    Testing,
    /// Release and deployment readiness
    Deployment,
}

/// A single finding reported by the validation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Unique issue id
    pub id: Uuid,
    /// Identifier of the rule that fired
    pub rule_id: String,
    /// How serious the finding is
    pub severity: IssueSeverity,
    /// Rule category
    pub category: IssueCategory,
    /// Short human-readable title
    pub title: String,
    /// Longer description of the finding
    pub description: String,
    /// File the issue was found in, if file-scoped
    pub file: Option<String>,
    /// 1-based line number, if known
    pub line: Option<u32>,
    /// Whether the backend can fix this automatically
    pub auto_fixable: bool,
    /// Whether the issue has since been resolved
    pub resolved: bool,
}

impl ValidationIssue {
    /// Create a new unresolved issue.
    #[must_use]
    pub fn new(
        rule_id: impl Into<String>,
        severity: IssueSeverity,
        category: IssueCategory,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule_id.into(),
            severity,
            category,
            title: title.into(),
            description: String::new(),
            file: None,
            line: None,
            auto_fixable: false,
            resolved: false,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the file location.
    #[must_use]
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Mark the issue as automatically fixable.
    #[must_use]
    pub fn auto_fixable(mut self) -> Self {
        self.auto_fixable = true;
        self
    }
}

/// Result of a project-wide validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Every issue found in the run
    pub issues: Vec<ValidationIssue>,
    /// Number of files the backend examined
    pub files_checked: usize,
    /// When the report was assembled
    pub generated_at: DateTime<Utc>,
}

impl ValidationReport {
    /// Number of issues at exactly this severity.
    #[must_use]
    pub fn count(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// True when the run found nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Outcome of an auto-fix request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoFixOutcome {
    /// Ids of issues the backend fixed
    pub fixed: Vec<Uuid>,
    /// Ids the backend could not fix
    pub failed: Vec<Uuid>,
}

impl AutoFixOutcome {
    /// Number of successful fixes.
    #[must_use]
    pub fn fixed_count(&self) -> usize {
        self.fixed.len()
    }
}

/// Client for the validation backend.
///
/// Every operation is a single request/response exchange addressed to the
/// guardian agent; a backend that omits the expected fields is treated as
/// having found nothing, so an offline mock degrades to clean results.
pub struct ValidationClient {
    transport: Arc<dyn AgentTransport>,
}

impl ValidationClient {
    /// Create a client over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }

    /// Validate a single file.
    pub async fn validate_file(&self, file_path: &str) -> Result<Vec<ValidationIssue>> {
        let result = self
            .send(serde_json::json!({
                "action": "validate-file",
                "file_path": file_path,
            }))
            .await?;
        parse_issues(&result)
    }

    /// Validate an entire project tree.
    pub async fn validate_project(&self, project_path: &str) -> Result<ValidationReport> {
        let result = self
            .send(serde_json::json!({
                "action": "validate-project",
                "project_path": project_path,
            }))
            .await?;
        parse_report(&result)
    }

    /// Validate the files staged for a commit.
    pub async fn validate_before_commit(
        &self,
        changed_files: &[String],
    ) -> Result<Vec<ValidationIssue>> {
        let result = self
            .send(serde_json::json!({
                "action": "validate-before-commit",
                "changed_files": changed_files,
            }))
            .await?;
        parse_issues(&result)
    }

    /// Validate readiness for a deployment target.
    pub async fn validate_before_deploy(&self, target: &str) -> Result<ValidationReport> {
        let result = self
            .send(serde_json::json!({
                "action": "validate-before-deploy",
                "target": target,
            }))
            .await?;
        parse_report(&result)
    }

    /// Ask the backend to fix the given issues in a file.
    pub async fn auto_fix(&self, file_path: &str, issue_ids: &[Uuid]) -> Result<AutoFixOutcome> {
        let result = self
            .send(serde_json::json!({
                "action": "auto-fix",
                "file_path": file_path,
                "issue_ids": issue_ids,
            }))
            .await?;
        match result.get("fix") {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| Error::InvalidPayload(format!("auto-fix outcome: {e}"))),
            None => Ok(AutoFixOutcome::default()),
        }
    }

    async fn send(&self, input: serde_json::Value) -> Result<serde_json::Value> {
        let request = AgentRequest::new(AgentId::Guardian, TaskKind::Validation, input);
        let response = self.transport.call(request).await?;
        Ok(response.result)
    }
}

/// Extract the issue list from a backend response, empty when absent.
fn parse_issues(result: &serde_json::Value) -> Result<Vec<ValidationIssue>> {
    match result.get("issues") {
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| Error::InvalidPayload(format!("issue list: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Assemble a report from a backend response.
fn parse_report(result: &serde_json::Value) -> Result<ValidationReport> {
    Ok(ValidationReport {
        issues: parse_issues(result)?,
        files_checked: result
            .get("files_checked")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as usize,
        generated_at: Utc::now(),
    })
}
