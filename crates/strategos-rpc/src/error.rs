//! Error types for strategos-rpc

use thiserror::Error;

/// Transport error type
#[derive(Debug, Error)]
pub enum Error {
    /// Agent endpoint not configured or unknown
    #[error("agent not available: {0}")]
    AgentUnavailable(String),

    /// Network/connection failure
    #[error("network error: {0}")]
    Network(String),

    /// Call exceeded its deadline
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Remote side rejected the request
    #[error("agent error: {0}")]
    Agent(String),

    /// Request or response failed validation
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event stream closed before the operation finished
    #[error("stream closed: {0}")]
    StreamClosed(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
