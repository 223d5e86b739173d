//! Failure classification and recovery
//!
//! Every agent call made by the engine goes through this module. Failures
//! are classified into categories, each category maps to a recovery action,
//! and per-agent circuit breakers stop the engine from hammering an agent
//! that keeps failing.
//!
//! # Module Structure
//!
//! - `classify` - Error taxonomy and transport-failure classification
//! - `breaker` - Per-agent circuit breakers and their registry
//! - `retry` - Exponential backoff schedule
//! - `executor` - The recovery loop wrapping a transport

mod breaker;
mod classify;
mod executor;
mod retry;

pub use breaker::{BreakerConfig, BreakerRegistry, BreakerState, CircuitBreaker};
pub use classify::{
    assess_severity, categorize_message, classify, retry_budget, suggested_resolution, AgentError,
    ErrorCategory, ErrorSeverity,
};
pub use executor::{reroute_target, CallOutcome, ResilientExecutor, ResourceGuard};
pub use retry::backoff_delay;
