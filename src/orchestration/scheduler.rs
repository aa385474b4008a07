//! Task selection for agents.
//!
//! The Scheduler is a read-only view over the task list. It asks the
//! dependency resolver for the eligible set and picks the most urgent task
//! for a requesting agent. It never changes state; claiming goes through
//! the lifecycle manager.

use std::collections::BTreeMap;

use crate::config::DEFAULT_PRIORITY;
use crate::core::dag;
use crate::core::task::Task;
use crate::hlog_trace;

/// Group label used for eligible tasks with no `agent_assigned`.
pub const GENERAL_AGENT: &str = "general";

/// Selects the next task to work on.
///
/// # Example
///
/// ```
/// use harness::core::Task;
/// use harness::orchestration::Scheduler;
///
/// let tasks = vec![
///     Task::new("T1").with_priority(3),
///     Task::new("T2").with_priority(1),
/// ];
/// let next = Scheduler::new(&tasks).next_for(None).unwrap();
/// assert_eq!(next.id.as_str(), "T2");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Scheduler<'a> {
    tasks: &'a [Task],
    default_priority: i64,
}

impl<'a> Scheduler<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        Self {
            tasks,
            default_priority: DEFAULT_PRIORITY,
        }
    }

    /// Priority assumed for tasks that do not declare one.
    pub fn with_default_priority(mut self, priority: i64) -> Self {
        self.default_priority = priority;
        self
    }

    /// Eligible tasks in document order.
    pub fn eligible(&self) -> Vec<&'a Task> {
        dag::eligible(self.tasks)
    }

    /// Eligible tasks an agent may take, most urgent first.
    ///
    /// With an agent, tasks assigned to that agent and unassigned tasks
    /// qualify. Ordering is by priority, then complexity (simpler first);
    /// remaining ties keep document order.
    pub fn candidates(&self, agent: Option<&str>) -> Vec<&'a Task> {
        let mut candidates: Vec<&'a Task> = self
            .eligible()
            .into_iter()
            .filter(|task| agent.map_or(true, |a| task.matches_agent(a)))
            .collect();
        candidates.sort_by_key(|task| {
            (
                task.effective_priority(self.default_priority),
                task.complexity(),
            )
        });
        candidates
    }

    /// The single best task for `agent` (or for any agent), if one exists.
    pub fn next_for(&self, agent: Option<&str>) -> Option<&'a Task> {
        let next = self.candidates(agent).into_iter().next();
        hlog_trace!(
            "Scheduler::next_for agent={:?} -> {:?}",
            agent,
            next.map(|t| t.id.as_str())
        );
        next
    }

    /// Eligible tasks grouped by assigned agent; unassigned tasks fall under
    /// [`GENERAL_AGENT`].
    pub fn eligible_by_agent(&self) -> BTreeMap<String, Vec<&'a Task>> {
        let mut groups: BTreeMap<String, Vec<&'a Task>> = BTreeMap::new();
        for task in self.eligible() {
            let agent = task.agent_assigned.as_deref().unwrap_or(GENERAL_AGENT);
            groups.entry(agent.to_string()).or_default().push(task);
        }
        groups
    }

    /// True when eligible work spans at least two agent groups, so more than
    /// one agent can be dispatched this round. Advisory; nothing is reserved.
    pub fn can_run_in_parallel(&self) -> bool {
        self.eligible_by_agent()
            .values()
            .filter(|tasks| !tasks.is_empty())
            .count()
            >= 2
    }
}
