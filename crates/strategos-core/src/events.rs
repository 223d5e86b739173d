//! EventBus - broadcast-based event system for engine progress events.
//!
//! Publishes events during parsing, workflow execution, and guardian
//! validation so UIs and internal subscribers can follow along in real time.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the coordination engine.
///
/// Events carry identifiers and summaries only; full task payloads stay on
/// the workflow record and are fetched through the engine API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A workflow was created and its graph validated
    WorkflowCreated {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Workflow name
        name: String,
        /// Number of tasks in the graph
        task_count: usize,
    },
    /// Workflow execution has started
    WorkflowStarted {
        /// Workflow identifier
        workflow_id: Uuid,
    },
    /// A task was dispatched to its agent
    TaskStarted {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Task identifier within the workflow
        task_id: Uuid,
        /// Agent the task was dispatched to
        agent: String,
    },
    /// A task finished, successfully or not
    TaskCompleted {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Task identifier within the workflow
        task_id: Uuid,
        /// Whether the task succeeded
        success: bool,
        /// Wall-clock duration in milliseconds
        duration_ms: u64,
    },
    /// A failing task was handed to an alternative agent
    TaskRerouted {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Task identifier within the workflow
        task_id: Uuid,
        /// Agent that failed
        from_agent: String,
        /// Agent taking over
        to_agent: String,
    },
    /// A task is waiting on user confirmation
    ConfirmationRequired {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Task identifier within the workflow
        task_id: Uuid,
        /// Confirmation request id to respond to
        request_id: Uuid,
    },
    /// Workflow finished with every critical task successful
    WorkflowCompleted {
        /// Workflow identifier
        workflow_id: Uuid,
    },
    /// Workflow failed
    WorkflowFailed {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Error description
        error: String,
    },
    /// Workflow was cancelled
    WorkflowCancelled {
        /// Workflow identifier
        workflow_id: Uuid,
    },
    /// Pre-analysis finished for a request
    ScoutCompleted {
        /// Whether the report came from cache
        cache_hit: bool,
        /// Scout's recommendation
        should_proceed: bool,
    },
    /// Guardian began watching a project root
    GuardianStarted {
        /// Number of files under watch
        watched_files: usize,
    },
    /// Guardian stopped watching
    GuardianStopped,
    /// A validation batch surfaced issues in a file
    ValidationIssuesFound {
        /// File the issues were found in
        file: String,
        /// Number of issues
        count: usize,
        /// Whether a blocking threshold was exceeded
        blocking: bool,
    },
    /// Guardian auto-fixed issues in a file
    AutoFixApplied {
        /// File that was fixed
        file: String,
        /// Number of issues fixed
        fixed: usize,
    },
    /// A circuit breaker changed state
    BreakerStateChanged {
        /// Agent the breaker guards
        agent: String,
        /// New state name
        state: String,
    },
}

impl EngineEvent {
    /// Get the workflow id carried by this event, if it has one.
    #[must_use]
    pub fn workflow_id(&self) -> Option<Uuid> {
        match self {
            Self::WorkflowCreated { workflow_id, .. }
            | Self::WorkflowStarted { workflow_id }
            | Self::TaskStarted { workflow_id, .. }
            | Self::TaskCompleted { workflow_id, .. }
            | Self::TaskRerouted { workflow_id, .. }
            | Self::ConfirmationRequired { workflow_id, .. }
            | Self::WorkflowCompleted { workflow_id }
            | Self::WorkflowFailed { workflow_id, .. }
            | Self::WorkflowCancelled { workflow_id } => Some(*workflow_id),
            Self::ScoutCompleted { .. }
            | Self::GuardianStarted { .. }
            | Self::GuardianStopped
            | Self::ValidationIssuesFound { .. }
            | Self::AutoFixApplied { .. }
            | Self::BreakerStateChanged { .. } => None,
        }
    }
}

/// Broadcast-based event bus for engine events.
///
/// Uses `tokio::broadcast` so multiple subscribers can receive the same
/// events. Slow subscribers miss events (lagged) rather than blocking the
/// publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events. Returns a receiver that will get all future events.
    ///
    /// If a subscriber falls behind by more than `capacity` events, it will
    /// receive a `RecvError::Lagged` on next recv.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all active subscribers.
    ///
    /// Returns the number of subscribers that received the event. If there
    /// are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: EngineEvent) -> usize {
        // send() returns Err if there are no receivers, which is fine
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the current number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
