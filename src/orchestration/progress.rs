//! Aggregate progress and the recommended next step.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::core::dag;
use crate::core::task::{StatusKind, Task};
use crate::orchestration::scheduler::Scheduler;

/// Default completion percentage at which a project counts as ready.
pub const DEFAULT_READY_THRESHOLD: f64 = 80.0;

/// Label for tasks without a `category`.
pub const UNCATEGORIZED: &str = "other";

/// Label for tasks without an `agent_assigned`.
pub const UNASSIGNED: &str = "unknown";

/// Completed vs total for one category or agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupProgress {
    pub completed: usize,
    pub total: usize,
}

impl GroupProgress {
    pub fn percentage(&self) -> f64 {
        percentage(self.completed, self.total)
    }
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    ProjectComplete,
    ResolveDependencies,
    CheckFailedTasks,
    ExecuteParallel,
    ExecuteSequential,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::ProjectComplete => "project_complete",
            RecommendedAction::ResolveDependencies => "resolve_dependencies",
            RecommendedAction::CheckFailedTasks => "check_failed_tasks",
            RecommendedAction::ExecuteParallel => "execute_parallel",
            RecommendedAction::ExecuteSequential => "execute_sequential",
        }
    }

    /// One-line hint for humans.
    pub fn describe(&self) -> &'static str {
        match self {
            RecommendedAction::ProjectComplete => "All tasks completed",
            RecommendedAction::ResolveDependencies => {
                "No task is eligible; blocked tasks need their dependencies resolved"
            }
            RecommendedAction::CheckFailedTasks => {
                "No task is eligible and none is blocked; check failed or in-progress tasks"
            }
            RecommendedAction::ExecuteParallel => "Eligible work spans several agents; dispatch in parallel",
            RecommendedAction::ExecuteSequential => "Run the next eligible task",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of where the project stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub pending: usize,
    pub percentage: f64,
    pub categories: BTreeMap<String, GroupProgress>,
    pub agents: BTreeMap<String, GroupProgress>,
    pub eligible: usize,
    pub blocked: usize,
    pub parallel_possible: bool,
    pub project_ready: bool,
    pub recommended_action: RecommendedAction,
}

/// Build a report over `tasks`.
///
/// `ready_threshold` is the percentage at or above which `project_ready` is
/// set.
pub fn progress(tasks: &[Task], ready_threshold: f64) -> ProgressReport {
    let total = tasks.len();
    let mut completed = 0;
    let mut in_progress = 0;
    let mut failed = 0;
    let mut categories: BTreeMap<String, GroupProgress> = BTreeMap::new();
    let mut agents: BTreeMap<String, GroupProgress> = BTreeMap::new();

    for task in tasks {
        let done = match task.kind() {
            StatusKind::Completed => {
                completed += 1;
                true
            }
            StatusKind::InProgress => {
                in_progress += 1;
                false
            }
            StatusKind::Failed => {
                failed += 1;
                false
            }
            StatusKind::Pending => false,
        };

        let category = task.category.as_deref().unwrap_or(UNCATEGORIZED);
        tally(categories.entry(category.to_string()).or_default(), done);
        let agent = task.agent_assigned.as_deref().unwrap_or(UNASSIGNED);
        tally(agents.entry(agent.to_string()).or_default(), done);
    }

    let scheduler = Scheduler::new(tasks);
    let eligible = scheduler.eligible().len();
    let blocked = dag::blocked(tasks).len();
    let parallel_possible = scheduler.can_run_in_parallel();
    let percentage = percentage(completed, total);

    let recommended_action = if eligible == 0 {
        if total > 0 && completed == total {
            RecommendedAction::ProjectComplete
        } else if blocked > 0 {
            RecommendedAction::ResolveDependencies
        } else {
            RecommendedAction::CheckFailedTasks
        }
    } else if parallel_possible {
        RecommendedAction::ExecuteParallel
    } else {
        RecommendedAction::ExecuteSequential
    };

    ProgressReport {
        total,
        completed,
        in_progress,
        failed,
        pending: total - completed - in_progress - failed,
        percentage,
        categories,
        agents,
        eligible,
        blocked,
        parallel_possible,
        project_ready: percentage >= ready_threshold,
        recommended_action,
    }
}

fn tally(group: &mut GroupProgress, done: bool) {
    group.total += 1;
    if done {
        group.completed += 1;
    }
}

/// `completed / total * 100` to one decimal, ties to even.
///
/// Only a fully completed set reports 100.0; rounding never gets there early.
fn percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    if completed >= total {
        return 100.0;
    }
    // Tenths of a percent, rounded on the exact ratio.
    let scaled = completed as u128 * 1000;
    let total = total as u128;
    let mut tenths = scaled / total;
    let twice_rest = 2 * (scaled % total);
    if twice_rest > total || (twice_rest == total && tenths % 2 == 1) {
        tenths += 1;
    }
    (tenths as f64 / 10.0).min(99.9)
}
