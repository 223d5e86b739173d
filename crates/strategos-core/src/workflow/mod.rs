//! Workflow orchestration
//!
//! Turns parsed commands into dependency-ordered task graphs and drives
//! them to completion: dispatch in bounded waves, confirmation pauses on
//! risky operations, cooperative cancellation, and failure isolation so
//! one bad agent call never takes the engine down with it.
//!
//! # Module Structure
//!
//! - `types`: task and workflow data model
//! - `builder`: command-to-graph construction rules
//! - `gate`: confirmation gate for high-risk pauses
//! - `engine`: the orchestrator itself

mod builder;
mod engine;
mod gate;
mod types;


pub use builder::{build_workflow, WorkflowOptions};
pub use engine::WorkflowEngine;
pub use gate::ConfirmationGate;
pub use types::{
    TaskPriority, TaskResult, TaskStatus, Workflow, WorkflowState, WorkflowStatus, WorkflowTask,
};
