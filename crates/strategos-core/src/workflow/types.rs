//! Task and workflow data model
//!
//! A workflow is a directed acyclic graph of agent tasks plus the parsed
//! command that produced it. Tasks only move forward through their
//! lifecycle; a result is attached once and never overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strategos_rpc::{AgentId, TaskKind};
use uuid::Uuid;

use crate::command::{Command, ParseContext, Urgency};
use crate::error::Result;
use crate::workflow::builder::validate_graph;

/// Lifecycle state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for its dependencies to finish
    Pending,
    /// Dependencies satisfied, picked up for the next dispatch round
    Ready,
    /// Handed to its agent
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Abandoned before it could finish
    Cancelled,
}

impl TaskStatus {
    /// True once the task can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase name used in logs and status payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority, derived from the command's urgency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Can wait
    Low,
    /// Regular work
    #[default]
    Normal,
    /// Should jump the queue
    High,
    /// Drop everything else
    Critical,
}

impl From<Urgency> for TaskPriority {
    fn from(urgency: Urgency) -> Self {
        match urgency {
            Urgency::Low => Self::Low,
            Urgency::Normal => Self::Normal,
            Urgency::High => Self::High,
            Urgency::Emergency => Self::Critical,
        }
    }
}

/// What a finished task produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Agent output payload
    pub output: serde_json::Value,
    /// Error description, set when the task failed
    pub error: Option<String>,
    /// Agent that actually served the task, when it ran through the transport
    pub served_by: Option<AgentId>,
    /// True when the output is the offline fallback rather than real agent work
    pub fallback: bool,
    /// True when a non-critical dependency failed and the task ran on
    /// partial upstream results
    pub degraded: bool,
    /// Wall-clock duration of the task
    pub duration_ms: u64,
}

impl TaskResult {
    /// A successful result.
    #[must_use]
    pub fn success(output: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            output,
            error: None,
            served_by: None,
            fallback: false,
            degraded: false,
            duration_ms,
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            output: serde_json::Value::Null,
            error: Some(error.into()),
            served_by: None,
            fallback: false,
            degraded: false,
            duration_ms,
        }
    }

    /// Whether the task succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One unit of agent work inside a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTask {
    /// Task identifier, unique within the workflow
    pub id: Uuid,
    /// Agent responsible for the work
    pub agent: AgentId,
    /// Kind of work requested
    pub kind: TaskKind,
    /// Payload handed to the agent
    pub input: serde_json::Value,
    /// Tasks that must reach a terminal state before this one starts
    pub depends_on: Vec<Uuid>,
    /// Current lifecycle state
    pub status: TaskStatus,
    /// Result, present once the task is terminal
    pub result: Option<TaskResult>,
    /// Scheduling priority
    pub priority: TaskPriority,
    /// When true, a failure here cancels every dependent task. Non-critical
    /// tasks let dependents continue with a degraded result instead.
    pub critical: bool,
}

impl WorkflowTask {
    /// Create a pending critical task with no dependencies.
    #[must_use]
    pub fn new(agent: AgentId, kind: TaskKind, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent,
            kind,
            input,
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            result: None,
            priority: TaskPriority::default(),
            critical: true,
        }
    }

    /// Add a dependency.
    #[must_use]
    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        self.depends_on.push(task_id);
        self
    }

    /// Set the scheduling priority.
    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Mark the task as non-critical: its failure degrades dependents
    /// instead of cancelling them.
    #[must_use]
    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }
}

/// Lifecycle state of a workflow as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Built and validated, not yet executed
    Created,
    /// Tasks are being dispatched
    Running,
    /// Paused on a risk confirmation
    AwaitingConfirmation,
    /// Every task terminal, no critical failure
    Completed,
    /// A critical task failed
    Failed,
    /// Cancelled by the caller or a denied confirmation
    Cancelled,
}

impl WorkflowState {
    /// True once the workflow can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Snake-case name used in logs and status payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated task graph plus the command context that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow identifier
    pub id: Uuid,
    /// Short name derived from the parsed intent
    pub name: String,
    /// The raw request text
    pub description: String,
    /// Current lifecycle state
    pub state: WorkflowState,
    /// The task graph, in insertion order
    pub tasks: Vec<WorkflowTask>,
    /// The command this workflow was built from
    pub command: Command,
    /// Caller context captured at parse time
    pub context: ParseContext,
    /// When the workflow was created
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Assemble a workflow after validating the task graph.
    ///
    /// Rejects empty graphs, unknown dependency references and cycles.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tasks: Vec<WorkflowTask>,
        command: Command,
        context: ParseContext,
    ) -> Result<Self> {
        validate_graph(&tasks)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            state: WorkflowState::Created,
            tasks,
            command,
            context,
            created_at: Utc::now(),
        })
    }

    /// Look up a task by id.
    #[must_use]
    pub fn task(&self, task_id: Uuid) -> Option<&WorkflowTask> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub(crate) fn task_mut(&mut self, task_id: Uuid) -> Option<&mut WorkflowTask> {
        self.tasks.iter_mut().find(|task| task.id == task_id)
    }

    /// Tasks assigned to a given agent.
    pub fn tasks_for(&self, agent: AgentId) -> impl Iterator<Item = &WorkflowTask> {
        self.tasks.iter().filter(move |task| task.agent == agent)
    }

    /// Aggregate status snapshot.
    #[must_use]
    pub fn status(&self) -> WorkflowStatus {
        let total = self.tasks.len();
        let count =
            |status: TaskStatus| self.tasks.iter().filter(|t| t.status == status).count();
        let completed = count(TaskStatus::Completed);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let progress = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u8
        };
        WorkflowStatus {
            workflow_id: self.id,
            name: self.name.clone(),
            state: self.state,
            total,
            completed,
            running: count(TaskStatus::Running),
            failed: count(TaskStatus::Failed),
            cancelled: count(TaskStatus::Cancelled),
            progress,
        }
    }
}

/// Aggregate progress snapshot of a workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatus {
    /// Workflow identifier
    pub workflow_id: Uuid,
    /// Workflow name
    pub name: String,
    /// Lifecycle state
    pub state: WorkflowState,
    /// Number of tasks in the graph
    pub total: usize,
    /// Tasks that finished successfully
    pub completed: usize,
    /// Tasks currently running
    pub running: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Tasks that were cancelled
    pub cancelled: usize,
    /// Completed share of the graph as a rounded percentage
    pub progress: u8,
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::command::CommandParser;
    use serde_json::json;

    fn workflow_with(statuses: &[TaskStatus]) -> Workflow {
        let parser = CommandParser::new();
        let command = parser.parse("fix the login bug", None);
        let tasks = statuses
            .iter()
            .map(|status| {
                let mut task =
                    WorkflowTask::new(AgentId::Developer, TaskKind::Implementation, json!({}));
                task.status = *status;
                task
            })
            .collect();
        Workflow::new("fix bug", "fix the login bug", tasks, command, ParseContext::default())
            .expect("valid graph")
    }

    #[test]
    fn test_progress_rounds_to_nearest_percent() {
        let workflow = workflow_with(&[
            TaskStatus::Completed,
            TaskStatus::Pending,
            TaskStatus::Pending,
        ]);
        assert_eq!(workflow.status().progress, 33);

        let workflow = workflow_with(&[
            TaskStatus::Completed,
            TaskStatus::Completed,
            TaskStatus::Pending,
        ]);
        assert_eq!(workflow.status().progress, 67);

        let workflow = workflow_with(&[TaskStatus::Completed, TaskStatus::Completed]);
        assert_eq!(workflow.status().progress, 100);
    }

    #[test]
    fn test_priority_follows_urgency() {
        assert_eq!(TaskPriority::from(Urgency::Low), TaskPriority::Low);
        assert_eq!(TaskPriority::from(Urgency::Normal), TaskPriority::Normal);
        assert_eq!(TaskPriority::from(Urgency::High), TaskPriority::High);
        assert_eq!(TaskPriority::from(Urgency::Emergency), TaskPriority::Critical);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Ready.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());

        assert!(!WorkflowState::AwaitingConfirmation.is_terminal());
        assert!(WorkflowState::Cancelled.is_terminal());
    }
}
