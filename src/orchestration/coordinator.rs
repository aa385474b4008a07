//! Caller-facing facade over store, scheduler, lifecycle and progress.

use std::path::Path;

use serde_json::Value;

use crate::config::Config;
use crate::core::dag::{self, BlockedTask, DependencyGraph};
use crate::core::task::{StatusKind, Task, TaskId};
use crate::error::{Error, Result};
use crate::hlog_debug;
use crate::orchestration::lifecycle::{self, LifecycleManager};
use crate::orchestration::progress::{progress, ProgressReport};
use crate::orchestration::scheduler::Scheduler;
use crate::state::{JsonFileStore, TaskStore};

/// Error recorded by [`TaskCoordinator::update_status`] when a failure
/// arrives without notes.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Task failed";

/// Entry point for agents: what to do next, claim it, report the outcome.
///
/// Reads load a fresh snapshot every call and take no lock. Writes go
/// through the lifecycle manager, one locked read-modify-write each.
#[derive(Debug)]
pub struct TaskCoordinator<S: TaskStore = JsonFileStore> {
    store: S,
    config: Config,
}

impl TaskCoordinator<JsonFileStore> {
    /// Coordinator for the project at `root`, honouring `.claude/harness.toml`.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        Ok(Self::from_config(root, config))
    }

    pub fn from_config(root: &Path, config: Config) -> Self {
        let store = JsonFileStore::from_config(root, &config);
        hlog_debug!("TaskCoordinator using {}", store.path().display());
        Self { store, config }
    }
}

impl<S: TaskStore> TaskCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lifecycle(&self) -> LifecycleManager<'_, S> {
        LifecycleManager::new(&self.store)
    }

    fn load_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.store.load()?.tasks)
    }

    /// The task `agent` should pick up next, without claiming it.
    ///
    /// Two agents asking at once may get the same answer; use
    /// [`claim_task`](Self::claim_task) or [`claim_next`](Self::claim_next)
    /// to actually reserve work.
    pub fn get_next_task(&self, agent: Option<&str>) -> Result<Option<Task>> {
        let tasks = self.load_tasks()?;
        Ok(Scheduler::new(&tasks)
            .with_default_priority(self.config.default_priority)
            .next_for(agent)
            .cloned())
    }

    /// Every eligible task `agent` could take, most urgent first.
    pub fn eligible_tasks(&self, agent: Option<&str>) -> Result<Vec<Task>> {
        let tasks = self.load_tasks()?;
        Ok(Scheduler::new(&tasks)
            .with_default_priority(self.config.default_priority)
            .candidates(agent)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn claim_task(&self, id: &TaskId) -> Result<Task> {
        self.lifecycle().claim(id)
    }

    /// Select and claim in one step. `None` when nothing is eligible.
    pub fn claim_next(&self, agent: Option<&str>) -> Result<Option<Task>> {
        self.lifecycle()
            .claim_next(agent, self.config.default_priority)
    }

    pub fn complete_task(&self, id: &TaskId, notes: Option<&str>) -> Result<Task> {
        self.lifecycle().complete(id, notes)
    }

    pub fn fail_task(&self, id: &TaskId, error: &str) -> Result<Task> {
        self.lifecycle().fail(id, error)
    }

    /// Status update keyed by status name, for callers that speak in strings.
    ///
    /// `in_progress` claims, `completed` completes with `notes`, `failed`
    /// fails with `notes` as the error. `pending` is not a legal target.
    pub fn update_status(&self, id: &TaskId, status: &str, notes: Option<&str>) -> Result<Task> {
        match status.parse::<StatusKind>()? {
            StatusKind::InProgress => self.claim_task(id),
            StatusKind::Completed => self.complete_task(id, notes),
            StatusKind::Failed => {
                let error = notes
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(DEFAULT_FAILURE_MESSAGE);
                self.fail_task(id, error)
            }
            StatusKind::Pending => Err(Error::Validation(format!(
                "cannot move task {} back to pending",
                id
            ))),
        }
    }

    pub fn get_progress(&self) -> Result<ProgressReport> {
        let tasks = self.load_tasks()?;
        Ok(progress(&tasks, self.config.project_ready_threshold))
    }

    pub fn get_blocked_tasks(&self) -> Result<Vec<BlockedTask>> {
        Ok(dag::blocked(&self.load_tasks()?))
    }

    /// Pending tasks that directly depend on `id` and can no longer run,
    /// typically asked right after failing `id`.
    pub fn stranded_by(&self, id: &TaskId) -> Result<Vec<TaskId>> {
        Ok(lifecycle::stranded_by(&self.store.load()?, id))
    }

    pub fn can_run_in_parallel(&self) -> Result<bool> {
        Ok(Scheduler::new(&self.load_tasks()?).can_run_in_parallel())
    }

    /// Read-only lookup, e.g. for building an agent's prompt context.
    pub fn get_task(&self, id: &TaskId) -> Result<Task> {
        self.store
            .load()?
            .get(id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id.clone()))
    }

    /// The planner's `parallel_execution.groups`, passed through untouched.
    pub fn parallel_groups(&self) -> Result<Vec<Value>> {
        Ok(self.store.load()?.parallel_groups().to_vec())
    }

    /// Every task ordered after its dependencies.
    ///
    /// # Errors
    /// `Validation` when the dependencies contain a cycle.
    pub fn execution_order(&self) -> Result<Vec<TaskId>> {
        DependencyGraph::new(&self.load_tasks()?).execution_order()
    }
}
