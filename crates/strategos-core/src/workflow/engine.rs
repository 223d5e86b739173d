//! The workflow engine
//!
//! Owns the workflow registry and drives execution: ready tasks are
//! dispatched in waves through a bounded semaphore, scout verdicts can
//! park a run on the confirmation gate, and cancellation is cooperative
//! through a per-execution token. Task failures land on the task record;
//! execution itself only fails for unknown or misused workflows.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use strategos_rpc::{AgentId, AgentRequest, AgentTransport, TaskKind};

use crate::command::{Command, CommandParser, ParseContext};
use crate::config::{EngineConfig, ResilienceSettings};
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventBus};
use crate::guardian::{CommitCheck, DeployCheck, GuardianEngine, GuardianStatus};
use crate::resilience::{classify, AgentError, ResilientExecutor, ResourceGuard};
use crate::scout::{ScoutPipeline, ScoutReport, ScoutRequest};
use crate::workflow::builder::{build_workflow, WorkflowOptions};
use crate::workflow::gate::ConfirmationGate;
use crate::workflow::types::{
    TaskResult, TaskStatus, Workflow, WorkflowState, WorkflowStatus,
};

/// What the dispatch loop needs to run one task, captured while the
/// registry lock is held so the task itself runs lock-free.
struct TaskSpec {
    task_id: Uuid,
    agent: AgentId,
    kind: TaskKind,
    input: serde_json::Value,
    degraded: bool,
}

/// Frees the scout analysis cache when an agent reports resource
/// exhaustion.
struct ScoutCacheGuard {
    scout: Arc<ScoutPipeline>,
}

#[async_trait]
impl ResourceGuard for ScoutCacheGuard {
    fn name(&self) -> &str {
        "scout-cache"
    }

    async fn reclaim(&self) -> Result<()> {
        self.scout.clear_cache();
        Ok(())
    }
}

/// Coordinates the full request lifecycle: parse, build a graph, dispatch
/// tasks in dependency order, recover from failures.
pub struct WorkflowEngine {
    parser: CommandParser,
    scout: Arc<ScoutPipeline>,
    guardian: Arc<GuardianEngine>,
    executor: Arc<ResilientExecutor>,
    workflows: DashMap<Uuid, Workflow>,
    executions: DashMap<Uuid, CancellationToken>,
    gate: ConfirmationGate,
    dispatch_slots: Arc<Semaphore>,
    resilience: ResilienceSettings,
    events: EventBus,
}

impl WorkflowEngine {
    /// Wire up the engine from configuration and a transport.
    pub fn new(
        config: &EngineConfig,
        transport: Arc<dyn AgentTransport>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;
        let scout = Arc::new(ScoutPipeline::new(&config.scout, events.clone()));
        let guardian = Arc::new(GuardianEngine::new(
            config.guardian.clone(),
            Arc::clone(&transport),
            events.clone(),
        )?);
        let executor = Arc::new(
            ResilientExecutor::new(transport, config.resilience.clone(), events.clone())
                .with_guard(Arc::new(ScoutCacheGuard {
                    scout: Arc::clone(&scout),
                })),
        );
        Ok(Self {
            parser: CommandParser::new(),
            scout,
            guardian,
            executor,
            workflows: DashMap::new(),
            executions: DashMap::new(),
            gate: ConfirmationGate::new(Duration::from_secs(
                config.workflow.confirmation_timeout_secs,
            )),
            dispatch_slots: Arc::new(Semaphore::new(config.workflow.max_parallel)),
            resilience: config.resilience.clone(),
            events,
        })
    }

    /// The scout pipeline.
    #[must_use]
    pub fn scout(&self) -> &Arc<ScoutPipeline> {
        &self.scout
    }

    /// The guardian engine.
    #[must_use]
    pub fn guardian(&self) -> &Arc<GuardianEngine> {
        &self.guardian
    }

    /// The resilient executor.
    #[must_use]
    pub fn executor(&self) -> &Arc<ResilientExecutor> {
        &self.executor
    }

    /// Parse a request without creating a workflow.
    #[must_use]
    pub fn parse(&self, text: &str, context: Option<&ParseContext>) -> Command {
        self.parser.parse(text, context)
    }

    /// Run scout pre-analysis outside any workflow.
    pub async fn analyze_before_operation(&self, request: &ScoutRequest) -> ScoutReport {
        self.scout.analyze(request).await
    }

    /// Start guardian continuous validation over `root`.
    pub async fn start_continuous_validation(&self, root: impl AsRef<Path>) -> Result<()> {
        self.guardian.start(root).await
    }

    /// Stop guardian continuous validation.
    pub async fn stop_continuous_validation(&self) {
        self.guardian.stop().await;
    }

    /// Guardian status snapshot.
    #[must_use]
    pub fn validation_status(&self) -> GuardianStatus {
        self.guardian.status()
    }

    /// Gate a commit on the files it changes.
    pub async fn validate_before_commit(&self, changed_files: &[String]) -> Result<CommitCheck> {
        self.guardian.validate_before_commit(changed_files).await
    }

    /// Gate a deploy on a whole-project validation pass.
    pub async fn validate_before_deploy(&self, target: &str) -> Result<DeployCheck> {
        self.guardian.validate_before_deploy(target).await
    }

    /// Classify a transport failure the way the recovery loop does.
    #[must_use]
    pub fn handle_error(
        &self,
        error: &strategos_rpc::Error,
        agent: Option<AgentId>,
        task_id: Option<Uuid>,
    ) -> AgentError {
        classify(error, agent, task_id, self.resilience.max_retries)
    }

    /// Parse `text` and build a validated workflow graph from it.
    pub fn create_workflow(&self, text: &str, context: &ParseContext) -> Result<Workflow> {
        self.create_workflow_with(text, context, &WorkflowOptions::default())
    }

    /// Like [`WorkflowEngine::create_workflow`], with construction options.
    pub fn create_workflow_with(
        &self,
        text: &str,
        context: &ParseContext,
        options: &WorkflowOptions,
    ) -> Result<Workflow> {
        let command = self.parser.parse(text, Some(context));
        let workflow = build_workflow(command, context, options)?;
        info!(
            workflow_id = %workflow.id,
            name = %workflow.name,
            intent = %workflow.command.intent,
            tasks = workflow.tasks.len(),
            "workflow created"
        );
        self.events.publish(EngineEvent::WorkflowCreated {
            workflow_id: workflow.id,
            name: workflow.name.clone(),
            task_count: workflow.tasks.len(),
        });
        self.workflows.insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    /// Execute a workflow to a terminal state and return its final status.
    ///
    /// Individual task failures land on the task records; this method only
    /// errors for a workflow that is unknown, already finished, or already
    /// executing.
    pub async fn execute(&self, workflow_id: Uuid) -> Result<WorkflowStatus> {
        let state = self
            .workflows
            .get(&workflow_id)
            .map(|workflow| workflow.state)
            .ok_or_else(|| Error::Workflow(format!("unknown workflow {workflow_id}")))?;
        if state.is_terminal() {
            return Err(Error::Workflow(format!(
                "workflow {workflow_id} already finished (state: {state})"
            )));
        }

        let token = CancellationToken::new();
        match self.executions.entry(workflow_id) {
            Entry::Occupied(_) => {
                return Err(Error::Workflow(format!(
                    "workflow {workflow_id} is already executing"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }

        self.set_workflow_state(workflow_id, WorkflowState::Running);
        self.events
            .publish(EngineEvent::WorkflowStarted { workflow_id });
        info!(%workflow_id, "workflow execution started");

        let outcome = self.drive(workflow_id, &token).await;
        self.executions.remove(&workflow_id);
        outcome
    }

    /// Status snapshot, if the workflow exists.
    #[must_use]
    pub fn status(&self, workflow_id: Uuid) -> Option<WorkflowStatus> {
        self.workflows.get(&workflow_id).map(|w| w.status())
    }

    /// Full workflow record, if it exists.
    #[must_use]
    pub fn workflow(&self, workflow_id: Uuid) -> Option<Workflow> {
        self.workflows.get(&workflow_id).map(|w| w.clone())
    }

    /// Status of every known workflow.
    #[must_use]
    pub fn list_workflows(&self) -> Vec<WorkflowStatus> {
        self.workflows
            .iter()
            .map(|entry| entry.value().status())
            .collect()
    }

    /// Cancel a workflow.
    ///
    /// A running execution stops at its next dispatch boundary and discards
    /// in-flight results; a workflow that never started goes straight to
    /// cancelled. A confirmation the workflow is parked on is denied.
    pub fn cancel(&self, workflow_id: Uuid) -> Result<()> {
        let state = self
            .workflows
            .get(&workflow_id)
            .map(|workflow| workflow.state)
            .ok_or_else(|| Error::Workflow(format!("unknown workflow {workflow_id}")))?;
        if state.is_terminal() {
            return Err(Error::Workflow(format!(
                "workflow {workflow_id} already finished (state: {state})"
            )));
        }

        self.gate.clear(workflow_id);
        if let Some((_, token)) = self.executions.remove(&workflow_id) {
            info!(%workflow_id, "cancellation requested for running workflow");
            token.cancel();
            return Ok(());
        }
        let _ = self.finish_cancelled(workflow_id)?;
        Ok(())
    }

    /// Answer a pending confirmation. Returns false when nothing was
    /// waiting for this workflow.
    pub fn resolve_confirmation(&self, workflow_id: Uuid, proceed: bool) -> bool {
        self.gate.resolve(workflow_id, proceed)
    }

    /// Number of workflows parked on the confirmation gate.
    #[must_use]
    pub fn pending_confirmations(&self) -> usize {
        self.gate.pending_count()
    }

    /// Stop background work: running executions, guardian watching, the
    /// scout cache sweeper.
    pub async fn shutdown(&self) {
        for entry in self.executions.iter() {
            entry.value().cancel();
        }
        self.guardian.stop().await;
        self.scout.shutdown();
        info!("engine shut down");
    }

    /// Dispatch rounds of ready tasks until the graph is terminal.
    async fn drive(&self, workflow_id: Uuid, token: &CancellationToken) -> Result<WorkflowStatus> {
        loop {
            if token.is_cancelled() {
                return self.finish_cancelled(workflow_id);
            }

            let round = self.next_round(workflow_id)?;
            if round.is_empty() {
                return self.finalize(workflow_id);
            }
            debug!(%workflow_id, tasks = round.len(), "dispatching ready tasks");

            let scout_task = round
                .iter()
                .find(|spec| spec.agent == AgentId::Scout)
                .map(|spec| spec.task_id);

            let futures: Vec<_> = round
                .into_iter()
                .map(|spec| self.run_task(workflow_id, spec, token))
                .collect();
            tokio::select! {
                _ = join_all(futures) => {}
                () = token.cancelled() => {
                    debug!(%workflow_id, "cancelled mid-round, discarding in-flight results");
                    return self.finish_cancelled(workflow_id);
                }
            }

            if let Some(task_id) = scout_task {
                if !self.confirm_if_blocked(workflow_id, task_id).await {
                    return self.finish_cancelled(workflow_id);
                }
            }
        }
    }

    /// Promote every dispatchable task to ready and hand back its spec.
    ///
    /// Pending tasks whose critical dependency failed, or whose dependency
    /// was cancelled, are cancelled here, transitively. A task whose
    /// non-critical dependency failed stays eligible and runs degraded.
    fn next_round(&self, workflow_id: Uuid) -> Result<Vec<TaskSpec>> {
        let mut entry = self
            .workflows
            .get_mut(&workflow_id)
            .ok_or_else(|| Error::Workflow(format!("unknown workflow {workflow_id}")))?;
        let workflow = entry.value_mut();

        loop {
            let doomed: Vec<Uuid> = workflow
                .tasks
                .iter()
                .filter(|task| task.status == TaskStatus::Pending)
                .filter(|task| {
                    task.depends_on.iter().any(|dep| {
                        workflow.task(*dep).map_or(false, |d| {
                            d.status == TaskStatus::Cancelled
                                || (d.status == TaskStatus::Failed && d.critical)
                        })
                    })
                })
                .map(|task| task.id)
                .collect();
            if doomed.is_empty() {
                break;
            }
            for task_id in doomed {
                if let Some(task) = workflow.task_mut(task_id) {
                    task.status = TaskStatus::Cancelled;
                    debug!(%workflow_id, %task_id, "task cancelled: upstream failure");
                }
            }
        }

        let ready: Vec<(Uuid, bool)> = workflow
            .tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
            .filter(|task| {
                task.depends_on.iter().all(|dep| {
                    workflow.task(*dep).map_or(false, |d| {
                        d.status == TaskStatus::Completed
                            || (d.status == TaskStatus::Failed && !d.critical)
                    })
                })
            })
            .map(|task| {
                let degraded = task.depends_on.iter().any(|dep| {
                    workflow
                        .task(*dep)
                        .map_or(false, |d| d.status == TaskStatus::Failed)
                });
                (task.id, degraded)
            })
            .collect();

        let mut specs = Vec::with_capacity(ready.len());
        for (task_id, degraded) in ready {
            if let Some(task) = workflow.task_mut(task_id) {
                task.status = TaskStatus::Ready;
                specs.push(TaskSpec {
                    task_id,
                    agent: task.agent,
                    kind: task.kind,
                    input: task.input.clone(),
                    degraded,
                });
            }
        }
        Ok(specs)
    }

    /// Run one task through its agent and record the outcome.
    async fn run_task(&self, workflow_id: Uuid, spec: TaskSpec, token: &CancellationToken) {
        let _permit = self
            .dispatch_slots
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");
        if token.is_cancelled() {
            return;
        }

        self.mark_running(workflow_id, spec.task_id);
        self.events.publish(EngineEvent::TaskStarted {
            workflow_id,
            task_id: spec.task_id,
            agent: spec.agent.as_str().to_string(),
        });
        debug!(
            %workflow_id,
            task_id = %spec.task_id,
            agent = %spec.agent,
            kind = %spec.kind,
            "task dispatched"
        );

        let started = Instant::now();
        let mut result = match spec.agent {
            AgentId::Scout => self.run_scout(workflow_id).await,
            AgentId::Guardian => self.run_guardian(&spec).await,
            _ => self.run_remote(workflow_id, &spec).await,
        };
        #[allow(clippy::cast_possible_truncation)]
        {
            result.duration_ms = started.elapsed().as_millis() as u64;
        }
        result.degraded = spec.degraded;

        let success = result.is_success();
        let duration_ms = result.duration_ms;
        self.record_task_result(workflow_id, spec.task_id, result);
        self.events.publish(EngineEvent::TaskCompleted {
            workflow_id,
            task_id: spec.task_id,
            success,
            duration_ms,
        });
    }

    /// A scout task runs the local pre-analysis pipeline.
    async fn run_scout(&self, workflow_id: Uuid) -> TaskResult {
        let request = match self.workflows.get(&workflow_id) {
            Some(workflow) => ScoutRequest::new(&workflow.command.intent, &workflow.command.raw)
                .with_files(workflow.context.files.clone())
                .with_urgency(workflow.context.urgency),
            None => return TaskResult::failure("workflow record disappeared", 0),
        };
        let report = self.scout.analyze(&request).await;
        let should_proceed = report.should_proceed;
        let output = serde_json::to_value(&report)
            .unwrap_or_else(|_| json!({ "should_proceed": should_proceed }));
        TaskResult::success(output, 0)
    }

    /// A guardian task validates the change set, or the whole project when
    /// no files are known.
    async fn run_guardian(&self, spec: &TaskSpec) -> TaskResult {
        let files: Vec<String> = spec
            .input
            .get("files")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        if files.is_empty() {
            match self.guardian.validate_project().await {
                Ok(report) => {
                    let clean = report.is_clean();
                    TaskResult::success(
                        json!({
                            "clean": clean,
                            "files_checked": report.files_checked,
                            "issues": report.issues,
                        }),
                        0,
                    )
                }
                Err(error) => TaskResult::failure(format!("validation failed: {error}"), 0),
            }
        } else {
            match self.guardian.validate_before_commit(&files).await {
                Ok(check) => TaskResult::success(
                    json!({
                        "passed": check.passed,
                        "issues": check.issues,
                        "blocking_reason": check.blocking_reason,
                    }),
                    0,
                ),
                Err(error) => TaskResult::failure(format!("validation failed: {error}"), 0),
            }
        }
    }

    /// Any other task goes to its agent through the recovery pipeline.
    async fn run_remote(&self, workflow_id: Uuid, spec: &TaskSpec) -> TaskResult {
        let request = AgentRequest::new(spec.agent, spec.kind, spec.input.clone());
        match self.executor.execute(request).await {
            Ok(outcome) => {
                if outcome.served_by != spec.agent && !outcome.fallback {
                    self.events.publish(EngineEvent::TaskRerouted {
                        workflow_id,
                        task_id: spec.task_id,
                        from_agent: spec.agent.as_str().to_string(),
                        to_agent: outcome.served_by.as_str().to_string(),
                    });
                }
                let mut result =
                    TaskResult::success(outcome.response.result, outcome.response.execution_time_ms);
                result.served_by = Some(outcome.served_by);
                result.fallback = outcome.fallback;
                result
            }
            Err(error) => {
                warn!(
                    %workflow_id,
                    task_id = %spec.task_id,
                    agent = %spec.agent,
                    %error,
                    "task failed after recovery attempts"
                );
                TaskResult::failure(error.to_string(), 0)
            }
        }
    }

    /// Park on the confirmation gate when scout recommended blocking.
    ///
    /// Returns true when execution may continue.
    async fn confirm_if_blocked(&self, workflow_id: Uuid, task_id: Uuid) -> bool {
        let should_proceed = self
            .workflows
            .get(&workflow_id)
            .and_then(|workflow| {
                workflow
                    .task(task_id)
                    .and_then(|task| task.result.as_ref())
                    .map(|result| {
                        result
                            .output
                            .get("should_proceed")
                            .and_then(serde_json::Value::as_bool)
                            .unwrap_or(true)
                    })
            })
            .unwrap_or(true);
        if should_proceed {
            return true;
        }

        let (request_id, receiver) = self.gate.request(workflow_id);
        self.set_workflow_state(workflow_id, WorkflowState::AwaitingConfirmation);
        self.events.publish(EngineEvent::ConfirmationRequired {
            workflow_id,
            task_id,
            request_id,
        });
        info!(
            %workflow_id,
            %request_id,
            "pre-analysis flagged the operation, waiting for confirmation"
        );

        let proceed = self.gate.wait(workflow_id, receiver).await;
        if proceed {
            self.set_workflow_state(workflow_id, WorkflowState::Running);
            info!(%workflow_id, "confirmation granted, resuming");
        } else {
            info!(%workflow_id, "confirmation denied or timed out, cancelling");
        }
        proceed
    }

    /// Mark every non-terminal task cancelled and close out the workflow.
    fn finish_cancelled(&self, workflow_id: Uuid) -> Result<WorkflowStatus> {
        let status = {
            let mut entry = self
                .workflows
                .get_mut(&workflow_id)
                .ok_or_else(|| Error::Workflow(format!("unknown workflow {workflow_id}")))?;
            let workflow = entry.value_mut();
            for task in &mut workflow.tasks {
                if !task.status.is_terminal() {
                    task.status = TaskStatus::Cancelled;
                }
            }
            workflow.state = WorkflowState::Cancelled;
            workflow.status()
        };
        self.events
            .publish(EngineEvent::WorkflowCancelled { workflow_id });
        info!(%workflow_id, "workflow cancelled");
        Ok(status)
    }

    /// Close out a workflow whose tasks have all reached a terminal state.
    fn finalize(&self, workflow_id: Uuid) -> Result<WorkflowStatus> {
        let (status, failure) = {
            let mut entry = self
                .workflows
                .get_mut(&workflow_id)
                .ok_or_else(|| Error::Workflow(format!("unknown workflow {workflow_id}")))?;
            let workflow = entry.value_mut();
            for task in &mut workflow.tasks {
                if !task.status.is_terminal() {
                    task.status = TaskStatus::Cancelled;
                }
            }
            let failure = workflow
                .tasks
                .iter()
                .find(|task| task.critical && task.status == TaskStatus::Failed)
                .map(|task| {
                    let reason = task
                        .result
                        .as_ref()
                        .and_then(|result| result.error.clone())
                        .unwrap_or_else(|| "task failed".to_string());
                    format!("{} task failed: {reason}", task.agent)
                });
            workflow.state = if failure.is_some() {
                WorkflowState::Failed
            } else {
                WorkflowState::Completed
            };
            (workflow.status(), failure)
        };

        match failure {
            Some(error) => {
                warn!(%workflow_id, %error, "workflow failed");
                self.events.publish(EngineEvent::WorkflowFailed {
                    workflow_id,
                    error,
                });
            }
            None => {
                info!(
                    %workflow_id,
                    completed = status.completed,
                    failed = status.failed,
                    "workflow completed"
                );
                self.events
                    .publish(EngineEvent::WorkflowCompleted { workflow_id });
            }
        }
        Ok(status)
    }

    fn mark_running(&self, workflow_id: Uuid, task_id: Uuid) {
        if let Some(mut entry) = self.workflows.get_mut(&workflow_id) {
            if let Some(task) = entry.value_mut().task_mut(task_id) {
                task.status = TaskStatus::Running;
            }
        }
    }

    fn record_task_result(&self, workflow_id: Uuid, task_id: Uuid, result: TaskResult) {
        if let Some(mut entry) = self.workflows.get_mut(&workflow_id) {
            if let Some(task) = entry.value_mut().task_mut(task_id) {
                task.status = if result.is_success() {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Failed
                };
                task.result = Some(result);
            }
        }
    }

    fn set_workflow_state(&self, workflow_id: Uuid, state: WorkflowState) {
        if let Some(mut entry) = self.workflows.get_mut(&workflow_id) {
            entry.value_mut().state = state;
        }
    }
}
