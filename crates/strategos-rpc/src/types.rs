//! Agent request, response and streaming-event types
//!
//! These are the wire shapes shared by every Strategos component that talks
//! to a remote agent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of remote agent capabilities.
///
/// Dispatch is keyed on this enum rather than free-form strings so an
/// unknown agent is unrepresentable past the parsing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    /// Pre-analysis screening (duplication, dependency impact, debt)
    Scout,
    /// System and API design
    Architect,
    /// Code implementation
    Developer,
    /// Validation, security review and gating
    Guardian,
    /// Test creation and quality assurance
    Qa,
    /// Project management and planning
    Pm,
    /// Product ownership and prioritization
    Po,
}

impl AgentId {
    /// All known agents, in routing-priority order.
    pub const ALL: [AgentId; 7] = [
        AgentId::Scout,
        AgentId::Architect,
        AgentId::Developer,
        AgentId::Guardian,
        AgentId::Qa,
        AgentId::Pm,
        AgentId::Po,
    ];

    /// Stable wire name for the agent
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scout => "scout",
            Self::Architect => "architect",
            Self::Developer => "developer",
            Self::Guardian => "guardian",
            Self::Qa => "qa",
            Self::Pm => "pm",
            Self::Po => "po",
        }
    }

    /// Parse a wire name back into an agent id
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "scout" => Some(Self::Scout),
            "architect" => Some(Self::Architect),
            "developer" => Some(Self::Developer),
            "guardian" => Some(Self::Guardian),
            "qa" => Some(Self::Qa),
            "pm" => Some(Self::Pm),
            "po" => Some(Self::Po),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of work a task asks an agent to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Scout screening before an operation starts
    PreAnalysis,
    /// Architecture / design work
    Design,
    /// Code implementation
    Implementation,
    /// Guardian validation pass
    Validation,
    /// Test creation
    TestCreation,
    /// Planning / coordination work
    Planning,
}

impl TaskKind {
    /// Stable wire name for the task kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreAnalysis => "pre_analysis",
            Self::Design => "design",
            Self::Implementation => "implementation",
            Self::Validation => "validation",
            Self::TestCreation => "test_creation",
            Self::Planning => "planning",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request dispatched to a remote agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Target agent
    pub agent: AgentId,
    /// Kind of work requested
    pub task: TaskKind,
    /// Task payload (free-form JSON, shape owned by the caller)
    pub input: serde_json::Value,
    /// Correlation id for tracing the call through logs and events
    pub request_id: Uuid,
}

impl AgentRequest {
    /// Create a new request with a fresh correlation id
    #[must_use]
    pub fn new(agent: AgentId, task: TaskKind, input: serde_json::Value) -> Self {
        Self {
            agent,
            task,
            input,
            request_id: Uuid::new_v4(),
        }
    }

    /// Override the correlation id
    #[must_use]
    pub fn with_request_id(mut self, id: Uuid) -> Self {
        self.request_id = id;
        self
    }
}

/// A response returned by a remote agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Result payload
    pub result: serde_json::Value,
    /// Time the agent spent on the request
    pub execution_time_ms: u64,
    /// Agent that produced the response
    pub agent: AgentId,
    /// Correlation id echoed from the request
    pub request_id: Uuid,
}

impl AgentResponse {
    /// Convenience accessor: result as a string, when it is one
    #[must_use]
    pub fn result_text(&self) -> Option<&str> {
        self.result.as_str()
    }
}

/// Kind of asynchronous event an agent may push during a long operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventKind {
    /// Free-form status text
    StatusUpdate,
    /// Partial or final agent output
    AgentResponse,
    /// A validation concern surfaced mid-operation
    ValidationWarning,
    /// Progress indication (0-100)
    Progress,
}

/// An event pushed over the duplex channel during a long operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Event discriminator
    #[serde(rename = "type")]
    pub kind: AgentEventKind,
    /// Event payload
    pub data: serde_json::Value,
    /// Source agent
    pub agent: AgentId,
}
