//! Status transitions, persisted through the task store.
//!
//! Each operation is one [`TaskStore::update`]: the check that a transition
//! is legal and the write of the new status happen under the same lock, so
//! a claim behaves like a compare-and-swap on the task's status.

use crate::core::collection::TaskCollection;
use crate::core::dag::DependencyGraph;
use crate::core::task::{StatusKind, Task, TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::orchestration::scheduler::Scheduler;
use crate::state::TaskStore;
use crate::{hlog, hlog_error, hlog_warn};

/// Applies status transitions to tasks in a store.
#[derive(Debug)]
pub struct LifecycleManager<'s, S: TaskStore> {
    store: &'s S,
}

impl<'s, S: TaskStore> LifecycleManager<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// `pending -> in_progress` for a specific task.
    ///
    /// # Errors
    /// - `AlreadyClaimed` if another agent got there first
    /// - `DependenciesUnsatisfied` if the task is pending but not eligible
    /// - `InvalidTransition` if the task is completed or failed
    /// - `TaskNotFound` for an unknown id
    pub fn claim(&self, id: &TaskId) -> Result<Task> {
        let result = self.store.update(|collection| claim_in(collection, id));
        log_outcome("claim", id, &result);
        result
    }

    /// Select the best eligible task for `agent` and claim it in one step.
    ///
    /// Returns `None` when nothing is eligible for the agent.
    pub fn claim_next(&self, agent: Option<&str>, default_priority: i64) -> Result<Option<Task>> {
        let claimed = self.store.update(|collection| {
            let next = Scheduler::new(&collection.tasks)
                .with_default_priority(default_priority)
                .next_for(agent)
                .map(|task| task.id.clone());
            next.map(|id| claim_in(collection, &id)).transpose()
        })?;

        match &claimed {
            Some(task) => hlog!("Task {} claimed by {:?} agent", task.id, agent),
            None => hlog!("No eligible task for {:?} agent", agent),
        }
        Ok(claimed)
    }

    /// `in_progress -> completed`, with optional implementation notes.
    pub fn complete(&self, id: &TaskId, notes: Option<&str>) -> Result<Task> {
        let result = self.store.update(|collection| {
            let task = collection.require_mut(id)?;
            task.complete(notes)?;
            Ok(task.clone())
        });
        log_outcome("complete", id, &result);
        result
    }

    /// `in_progress -> failed`, with a mandatory error message.
    pub fn fail(&self, id: &TaskId, error: &str) -> Result<Task> {
        let result = self.store.update(|collection| {
            let task = collection.require_mut(id)?;
            task.fail(error)?;
            Ok(task.clone())
        });
        log_outcome("fail", id, &result);
        result
    }
}

/// Claim `id` inside an open read-modify-write.
pub(crate) fn claim_in(collection: &mut TaskCollection, id: &TaskId) -> Result<Task> {
    let task = collection
        .get(id)
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;

    match &task.status {
        TaskStatus::Pending => {}
        TaskStatus::InProgress { .. } => return Err(Error::AlreadyClaimed { id: id.clone() }),
        TaskStatus::Completed { .. } | TaskStatus::Failed { .. } => {
            return Err(Error::InvalidTransition {
                id: id.clone(),
                from: task.kind().to_string(),
                to: StatusKind::InProgress.to_string(),
            })
        }
    }

    let completed = collection.completed_ids();
    let unsatisfied: Vec<TaskId> = task
        .dependencies
        .iter()
        .filter(|dep| !completed.contains(dep))
        .cloned()
        .collect();
    if !unsatisfied.is_empty() {
        return Err(Error::DependenciesUnsatisfied {
            id: id.clone(),
            unsatisfied,
        });
    }

    let task = collection.require_mut(id)?;
    task.start()?;
    Ok(task.clone())
}

fn log_outcome(op: &str, id: &TaskId, result: &Result<Task>) {
    match result {
        Ok(task) => hlog!("Task {} {}: now {}", id, op, task.kind()),
        Err(e) if e.is_recoverable() => hlog_warn!("Task {} {} rejected: {}", id, op, e),
        Err(e) => hlog_error!("Task {} {} failed: {}", id, op, e),
    }
}

/// Tasks that can never run because of the given task's failure.
///
/// Used to tell an agent what its failure report strands downstream.
pub fn stranded_by(collection: &TaskCollection, id: &TaskId) -> Vec<TaskId> {
    DependencyGraph::new(&collection.tasks)
        .blocked()
        .into_iter()
        .filter(|b| b.is_unsatisfiable() && b.task.dependencies.contains(id))
        .map(|b| b.task.id)
        .collect()
}
