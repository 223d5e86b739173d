//! Error taxonomy and classification
//!
//! Maps raw transport failures onto a structured [`AgentError`] by message
//! inspection. Category drives retry behavior; severity drives reporting.

use serde::{Deserialize, Serialize};
use strategos_rpc::AgentId;
use uuid::Uuid;

/// What went wrong, at the level recovery strategies care about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Connectivity failure between the engine and an agent
    Network,
    /// The agent itself failed or is unavailable
    Agent,
    /// The request or response violated a contract
    Validation,
    /// The operation exceeded its time budget
    Timeout,
    /// The engine lacks rights to perform the operation
    Permission,
    /// Memory, disk, or quota exhaustion
    Resource,
    /// The engine itself is misconfigured
    Configuration,
    /// Nothing matched
    Unknown,
}

impl ErrorCategory {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Agent => "agent",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Whether errors of this category are worth retrying at all.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Resource
                | ErrorCategory::Agent
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How bad it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Cosmetic or self-healing
    Low,
    /// Degraded but recoverable
    Medium,
    /// Needs attention soon
    High,
    /// Needs attention now
    Critical,
}

/// A classified agent failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentError {
    /// Unique error id
    pub id: Uuid,
    /// Classified category
    pub category: ErrorCategory,
    /// Assessed severity
    pub severity: ErrorSeverity,
    /// Original error message
    pub message: String,
    /// Agent the failure relates to, if known
    pub agent: Option<AgentId>,
    /// Task the failure occurred in, if known
    pub task_id: Option<Uuid>,
    /// Retries already spent on this error
    pub retry_count: u32,
    /// Retry budget for this category
    pub max_retries: u32,
    /// Whether another attempt could help
    pub retryable: bool,
    /// Human-readable next step
    pub resolution: String,
}

impl AgentError {
    /// Whether the recovery loop may try again.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.retryable && self.retry_count < self.max_retries
    }
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.category, self.message)
    }
}

/// Map a message onto a category by keyword inspection.
///
/// More specific categories are checked first so "agent request timed out"
/// lands on timeout, not agent.
#[must_use]
pub fn categorize_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["timeout", "timed out", "deadline exceeded"]) {
        ErrorCategory::Timeout
    } else if has(&["permission", "unauthorized", "forbidden", "access denied"]) {
        ErrorCategory::Permission
    } else if has(&[
        "out of memory",
        "oom",
        "disk full",
        "quota",
        "resource exhausted",
        "too many open files",
    ]) {
        ErrorCategory::Resource
    } else if has(&[
        "network",
        "connection refused",
        "connection reset",
        "unreachable",
        "dns",
        "socket",
        "broken pipe",
    ]) {
        ErrorCategory::Network
    } else if has(&["validation", "invalid", "malformed", "schema", "unexpected field"]) {
        ErrorCategory::Validation
    } else if has(&["agent", "unavailable", "crashed", "not responding", "overloaded"]) {
        ErrorCategory::Agent
    } else if has(&["configuration", "misconfigured", "config"]) {
        ErrorCategory::Configuration
    } else {
        ErrorCategory::Unknown
    }
}

/// Severity policy: permission worst, transient plumbing in the middle.
#[must_use]
pub fn assess_severity(category: ErrorCategory, message: &str) -> ErrorSeverity {
    match category {
        ErrorCategory::Permission => ErrorSeverity::Critical,
        ErrorCategory::Validation | ErrorCategory::Agent => ErrorSeverity::High,
        ErrorCategory::Network | ErrorCategory::Timeout => ErrorSeverity::Medium,
        ErrorCategory::Resource => {
            let lower = message.to_lowercase();
            if lower.contains("out of memory") || lower.contains("oom") {
                ErrorSeverity::Critical
            } else {
                ErrorSeverity::High
            }
        }
        ErrorCategory::Configuration => ErrorSeverity::High,
        ErrorCategory::Unknown => ErrorSeverity::Low,
    }
}

/// Retry budget per category.
#[must_use]
pub fn retry_budget(category: ErrorCategory, network_retries: u32) -> u32 {
    match category {
        ErrorCategory::Network => network_retries,
        ErrorCategory::Timeout => 2,
        // One reroute for agents, one retry after reclamation for resources
        ErrorCategory::Agent | ErrorCategory::Resource => 1,
        _ => 0,
    }
}

/// Suggested next step per category.
#[must_use]
pub fn suggested_resolution(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Network => "Check connectivity to the agent endpoint and retry",
        ErrorCategory::Agent => "Reroute to an alternative agent or wait for recovery",
        ErrorCategory::Validation => "Fix the request payload; retrying will not help",
        ErrorCategory::Timeout => "Retry, or raise the operation's time budget",
        ErrorCategory::Permission => "Grant the missing permission before retrying",
        ErrorCategory::Resource => "Free resources (caches, handles) and retry once",
        ErrorCategory::Configuration => "Correct the engine configuration and restart the operation",
        ErrorCategory::Unknown => "Inspect the logs; the failure did not match any known category",
    }
}

/// Classify a transport failure into a structured [`AgentError`].
///
/// The wire error variant seeds the category; message inspection can refine
/// it (a generic agent error whose message says "connection refused" is a
/// network problem).
#[must_use]
pub fn classify(
    error: &strategos_rpc::Error,
    agent: Option<AgentId>,
    task_id: Option<Uuid>,
    network_retries: u32,
) -> AgentError {
    let message = error.to_string();
    let from_message = categorize_message(&message);
    let category = if from_message == ErrorCategory::Unknown {
        match error {
            strategos_rpc::Error::Network(_) | strategos_rpc::Error::StreamClosed(_) => {
                ErrorCategory::Network
            }
            strategos_rpc::Error::Timeout(_) => ErrorCategory::Timeout,
            strategos_rpc::Error::AgentUnavailable(_) | strategos_rpc::Error::Agent(_) => {
                ErrorCategory::Agent
            }
            strategos_rpc::Error::InvalidPayload(_) | strategos_rpc::Error::Serialization(_) => {
                ErrorCategory::Validation
            }
        }
    } else {
        from_message
    };

    let severity = assess_severity(category, &message);
    AgentError {
        id: Uuid::new_v4(),
        category,
        severity,
        message,
        agent,
        task_id,
        retry_count: 0,
        max_retries: retry_budget(category, network_retries),
        retryable: category.is_retryable(),
        resolution: suggested_resolution(category).to_string(),
    }
}
