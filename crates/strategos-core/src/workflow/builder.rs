//! Workflow graph construction
//!
//! Maps a parsed command onto a task graph: scout pre-analysis first,
//! design before implementation, validation after it, tests last. The
//! graph is checked for unknown references and cycles before a workflow
//! is accepted.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::json;
use strategos_rpc::{AgentId, TaskKind};
use uuid::Uuid;

use crate::command::{lexicon, Command, EntityKind, ParseContext};
use crate::error::{Error, Result};
use crate::workflow::types::{TaskPriority, Workflow, WorkflowTask};

/// Knobs for graph construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowOptions {
    /// Skip the scout pre-analysis task. Ignored when the command itself
    /// asks for analysis.
    pub skip_scout: bool,
}

/// Build a validated workflow from a parsed command.
///
/// The graph always starts with a scout task unless the caller opted out.
/// Developer work gets a design task in front of it when the command needs
/// multiple agents, a validation task behind it, and a test task last.
/// Security-sensitive requests get a validation task even when no code is
/// written. Everything else becomes a single task for the suggested agent.
pub fn build_workflow(
    command: Command,
    context: &ParseContext,
    options: &WorkflowOptions,
) -> Result<Workflow> {
    let priority = TaskPriority::from(context.urgency);
    let mut tasks: Vec<WorkflowTask> = Vec::new();

    // An analysis request keeps its scout task even when the caller opts out.
    let skip_scout = options.skip_scout && command.suggested_agent != AgentId::Scout;
    let scout_id = if skip_scout {
        None
    } else {
        let task = WorkflowTask::new(
            AgentId::Scout,
            TaskKind::PreAnalysis,
            json!({
                "operation": command.intent,
                "description": command.raw,
                "files": context.files,
            }),
        )
        .with_priority(priority)
        .non_critical();
        let id = task.id;
        tasks.push(task);
        Some(id)
    };

    let developer_flow = command.suggested_agent == AgentId::Developer;
    let components = command.entity_values(EntityKind::Component);

    let architect_id = if command.intent == "design_architecture"
        || (developer_flow && command.requires_multi_agent)
    {
        let mut task = WorkflowTask::new(
            AgentId::Architect,
            TaskKind::Design,
            json!({
                "description": command.raw,
                "components": components,
            }),
        )
        .with_priority(priority);
        if let Some(dep) = scout_id {
            task = task.with_dependency(dep);
        }
        let id = task.id;
        tasks.push(task);
        Some(id)
    } else {
        None
    };

    let developer_id = if developer_flow {
        let mut task = WorkflowTask::new(
            AgentId::Developer,
            TaskKind::Implementation,
            json!({
                "description": command.raw,
                "components": components,
                "files": context.files,
            }),
        )
        .with_priority(priority);
        if let Some(dep) = architect_id.or(scout_id) {
            task = task.with_dependency(dep);
        }
        let id = task.id;
        tasks.push(task);
        Some(id)
    } else {
        None
    };

    let guardian_primary = command.suggested_agent == AgentId::Guardian;
    let security_sensitive = guardian_primary
        || command.intent == "security_review"
        || mentions_security(&command.raw);
    let guardian_id = if developer_id.is_some() || security_sensitive {
        let mut task = WorkflowTask::new(
            AgentId::Guardian,
            TaskKind::Validation,
            json!({
                "description": command.raw,
                "files": context.files,
            }),
        )
        .with_priority(priority);
        // Auxiliary validation degrades the workflow instead of failing it;
        // when guardian is the requested agent its task stays critical.
        if !guardian_primary {
            task = task.non_critical();
        }
        if let Some(dep) = developer_id.or(architect_id).or(scout_id) {
            task = task.with_dependency(dep);
        }
        let id = task.id;
        tasks.push(task);
        Some(id)
    } else {
        None
    };

    if let Some(dev) = developer_id {
        let task = WorkflowTask::new(
            AgentId::Qa,
            TaskKind::TestCreation,
            json!({
                "description": command.raw,
                "files": context.files,
            }),
        )
        .with_priority(priority)
        .with_dependency(guardian_id.unwrap_or(dev));
        tasks.push(task);
    }

    // Agents not covered above get a single primary task after scout.
    match command.suggested_agent {
        AgentId::Scout | AgentId::Developer | AgentId::Guardian => {}
        AgentId::Architect => {
            if architect_id.is_none() {
                let mut task = WorkflowTask::new(
                    AgentId::Architect,
                    TaskKind::Design,
                    json!({ "description": command.raw }),
                )
                .with_priority(priority);
                if let Some(dep) = scout_id {
                    task = task.with_dependency(dep);
                }
                tasks.push(task);
            }
        }
        AgentId::Qa => {
            if developer_id.is_none() {
                let mut task = WorkflowTask::new(
                    AgentId::Qa,
                    TaskKind::TestCreation,
                    json!({
                        "description": command.raw,
                        "files": context.files,
                    }),
                )
                .with_priority(priority);
                if let Some(dep) = scout_id {
                    task = task.with_dependency(dep);
                }
                tasks.push(task);
            }
        }
        AgentId::Pm | AgentId::Po => {
            let mut task = WorkflowTask::new(
                command.suggested_agent,
                TaskKind::Planning,
                json!({
                    "description": command.raw,
                    "intent": command.intent,
                }),
            )
            .with_priority(priority);
            if let Some(dep) = scout_id {
                task = task.with_dependency(dep);
            }
            tasks.push(task);
        }
    }

    let name = if command.is_recognized() {
        command.intent.replace('_', " ")
    } else {
        "ad-hoc request".to_string()
    };
    let description = command.raw.clone();
    Workflow::new(name, description, tasks, command, context.clone())
}

/// Whether the request touches security-sensitive territory.
fn mentions_security(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|token| lexicon::SECURITY_KEYWORDS.contains(&token))
}

/// Reject graphs the engine cannot execute: empty graphs, dependencies on
/// unknown tasks, and dependency cycles.
pub(crate) fn validate_graph(tasks: &[WorkflowTask]) -> Result<()> {
    if tasks.is_empty() {
        return Err(Error::Configuration("workflow has no tasks".to_string()));
    }
    let ids: HashSet<Uuid> = tasks.iter().map(|task| task.id).collect();
    for task in tasks {
        for dep in &task.depends_on {
            if !ids.contains(dep) {
                return Err(Error::Configuration(format!(
                    "task {} depends on unknown task {dep}",
                    task.id
                )));
            }
        }
    }

    // Kahn's algorithm: a topological order that does not cover every task
    // means the leftover tasks form a cycle.
    let mut in_degree: HashMap<Uuid, usize> = tasks
        .iter()
        .map(|task| (task.id, task.depends_on.len()))
        .collect();
    let mut dependents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for task in tasks {
        for dep in &task.depends_on {
            dependents.entry(*dep).or_default().push(task.id);
        }
    }
    let mut queue: VecDeque<Uuid> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut visited = 0usize;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }
    if visited == tasks.len() {
        Ok(())
    } else {
        Err(Error::Configuration(
            "workflow graph contains a dependency cycle".to_string(),
        ))
    }
}
