//! Strategos RPC - Agent Transport Abstraction
//!
//! This crate provides the wire layer for Strategos:
//! - Types: agent identities, task kinds, request/response/event shapes
//! - Transport: the `AgentTransport` trait plus a duplex event stream
//! - Mock: deterministic scripted transport for tests and offline use
//! - Validation: validation backend wire shapes and client

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mock;
pub mod transport;
pub mod types;
pub mod validation;

pub use error::{Error, Result};
pub use mock::{offline_result, MockTransport, ScriptedReply};
pub use transport::{AgentTransport, EventStream};
pub use types::{
    AgentEvent, AgentEventKind, AgentId, AgentRequest, AgentResponse, TaskKind,
};
pub use validation::{
    AutoFixOutcome, IssueCategory, IssueSeverity, ValidationClient, ValidationIssue,
    ValidationReport,
};
