//! Error types for strategos-core
//!
//! This module provides the engine-level error type. Per-call agent failures
//! are classified separately in [`crate::resilience`]; the variants here are
//! what callers of the engine surface see.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("invalid configuration: {field}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Configuration error (malformed workflows, double starts, bad settings)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Command could not be parsed into an intent
    #[error("parse error: {0}")]
    Parse(String),

    /// Workflow construction or lookup failed
    #[error("workflow error: {0}")]
    Workflow(String),

    /// Task execution failed after recovery was exhausted
    #[error("execution error: {0}")]
    Execution(String),

    /// Confirmation denied or timed out
    #[error("confirmation error: {0}")]
    Confirmation(String),

    /// Guardian watcher or validation failure
    #[error("guardian error: {0}")]
    Guardian(String),

    /// Pre-analysis pipeline failure
    #[error("scout error: {0}")]
    Scout(String),

    /// Transport-level failure
    #[error("rpc error: {0}")]
    Rpc(#[from] strategos_rpc::Error),

    /// File watcher error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Internal error (serialization, channel teardown, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error must halt the current operation outright.
    ///
    /// Configuration errors are never retried or recovered; everything else
    /// may pass through the resilience layer first.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::InvalidConfig { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_fatal() {
        assert!(Error::Configuration("bad graph".to_string()).is_fatal());
        assert!(Error::InvalidConfig {
            field: "guardian.batch_size".to_string(),
            message: "must be positive".to_string(),
        }
        .is_fatal());
    }

    #[test]
    fn test_execution_errors_are_not_fatal() {
        assert!(!Error::Execution("agent crashed".to_string()).is_fatal());
        assert!(!Error::Rpc(strategos_rpc::Error::Timeout(5000)).is_fatal());
    }

    #[test]
    fn test_display_includes_field() {
        let error = Error::InvalidConfig {
            field: "workflow.max_parallel".to_string(),
            message: "must be positive".to_string(),
        };
        assert!(error.to_string().contains("workflow.max_parallel"));
    }
}
