//! Strategos Core - Workflow Coordination Engine
//!
//! This crate provides the coordination logic for the Strategos agent
//! workflow engine, including:
//! - Command: Parsing natural language requests into routed commands
//! - Workflow: Building and executing multi-agent task graphs
//! - Scout: Pre-operation analysis with caching and risk assessment
//! - Guardian: Continuous validation, commit and deploy gates
//! - Resilience: Circuit breakers, retries, reroutes, and offline fallback
//! - Events: Broadcast stream of engine lifecycle events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod guardian;
pub mod resilience;
pub mod scout;
pub mod workflow;

pub use command::{
    Alternative, Command, CommandParser, Entity, EntityKind, IntentPattern, ParseContext,
    Urgency, UNKNOWN_INTENT,
};
pub use config::{
    load_config, EngineConfig, ResilienceSettings, ScoutSettings, WorkflowSettings,
};
pub use error::{Error, Result};
pub use events::{EngineEvent, EventBus};
pub use guardian::{
    BlockingThresholds, CommitCheck, DeployCheck, GuardianConfig, GuardianEngine,
    GuardianState, GuardianStatus,
};
pub use resilience::{
    AgentError, BreakerState, CallOutcome, CircuitBreaker, ErrorCategory, ErrorSeverity,
    ResilientExecutor, ResourceGuard,
};
pub use scout::{
    RiskLevel, RiskSummary, ScoutPipeline, ScoutReport, ScoutRequest,
};
pub use workflow::{
    build_workflow, TaskPriority, TaskResult, TaskStatus, Workflow, WorkflowEngine,
    WorkflowOptions, WorkflowState, WorkflowStatus, WorkflowTask,
};
