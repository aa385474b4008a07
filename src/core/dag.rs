//! Dependency resolution over the task collection.
//!
//! Eligibility is a plain scan: a task is eligible when it is pending and all
//! of its dependencies are completed. Everything that needs graph structure
//! (cycles, tasks that can never run, a safe execution order) goes through
//! [`DependencyGraph`], a petgraph `DiGraph` with an edge from each
//! dependency to the task that needs it.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};

/// Why a blocked task can never become eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Unsatisfiable {
    /// The task is part of a dependency cycle (a self-dependency included).
    Cycle { members: Vec<TaskId> },
    /// A dependency failed and failed tasks are terminal.
    FailedDependency { dependency: TaskId },
    /// A dependency is itself unsatisfiable.
    Upstream { dependency: TaskId },
}

impl std::fmt::Display for Unsatisfiable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unsatisfiable::Cycle { members } => {
                let ids: Vec<&str> = members.iter().map(TaskId::as_str).collect();
                write!(f, "dependency cycle: {}", ids.join(" -> "))
            }
            Unsatisfiable::FailedDependency { dependency } => {
                write!(f, "dependency {} failed", dependency)
            }
            Unsatisfiable::Upstream { dependency } => {
                write!(f, "dependency {} can never complete", dependency)
            }
        }
    }
}

/// A pending task that is not eligible, with the dependencies holding it back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockedTask {
    pub task: Task,
    /// Dependencies that are not completed, in declaration order.
    pub unsatisfied: Vec<TaskId>,
    /// Set when waiting will never help.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsatisfiable: Option<Unsatisfiable>,
}

impl BlockedTask {
    pub fn is_unsatisfiable(&self) -> bool {
        self.unsatisfiable.is_some()
    }
}

/// Pending tasks whose dependencies are all completed, in document order.
///
/// In-progress tasks are never returned: they are already claimed.
pub fn eligible(tasks: &[Task]) -> Vec<&Task> {
    let completed = completed_ids(tasks);
    tasks
        .iter()
        .filter(|task| task.is_pending() && unsatisfied(task, &completed).is_empty())
        .collect()
}

/// Every pending task that has at least one dependency not yet completed.
pub fn blocked(tasks: &[Task]) -> Vec<BlockedTask> {
    DependencyGraph::new(tasks).blocked()
}

fn completed_ids(tasks: &[Task]) -> HashSet<&TaskId> {
    tasks
        .iter()
        .filter(|t| t.is_completed())
        .map(|t| &t.id)
        .collect()
}

fn unsatisfied<'a>(task: &'a Task, completed: &HashSet<&TaskId>) -> Vec<&'a TaskId> {
    task.dependencies
        .iter()
        .filter(|dep| !completed.contains(dep))
        .collect()
}

/// Dependency graph borrowed from a task slice.
pub struct DependencyGraph<'a> {
    graph: DiGraph<&'a Task, ()>,
    index: HashMap<&'a TaskId, NodeIndex>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the graph. Dependencies on unknown ids are ignored; the
    /// collection validator rejects those before a graph is ever built.
    pub fn new(tasks: &'a [Task]) -> Self {
        let mut graph = DiGraph::with_capacity(tasks.len(), tasks.len());
        let mut index = HashMap::with_capacity(tasks.len());

        for task in tasks {
            index
                .entry(&task.id)
                .or_insert_with(|| graph.add_node(task));
        }

        for task in tasks {
            let to = index[&task.id];
            for dep in &task.dependencies {
                if let Some(&from) = index.get(dep) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        Self { graph, index }
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All dependency cycles, each listed in document order.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| self.is_cyclic(scc))
            .map(|scc| self.member_ids(&scc))
            .collect()
    }

    /// A safe execution order: every task after all of its dependencies.
    ///
    /// # Errors
    /// Returns `Validation` naming a task on a cycle if one exists.
    pub fn execution_order(&self) -> Result<Vec<TaskId>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            Error::Validation(format!(
                "dependency cycle detected at task {}",
                self.graph[cycle.node_id()].id
            ))
        })?;
        Ok(sorted.into_iter().map(|n| self.graph[n].id.clone()).collect())
    }

    /// Pending tasks that are not eligible, classified as waiting or
    /// unsatisfiable.
    pub fn blocked(&self) -> Vec<BlockedTask> {
        let completed: HashSet<&TaskId> = self
            .graph
            .node_weights()
            .filter(|t| t.is_completed())
            .map(|t| &t.id)
            .collect();

        // tarjan_scc yields components in reverse topological order, and edges
        // point from dependency to dependent, so reversing visits every
        // dependency's component before its dependents.
        let mut verdicts: HashMap<NodeIndex, Unsatisfiable> = HashMap::new();
        for scc in tarjan_scc(&self.graph).into_iter().rev() {
            let cyclic = self.is_cyclic(&scc);
            let members: HashSet<NodeIndex> = scc.iter().copied().collect();

            for &node in &scc {
                let task = self.graph[node];
                if !task.is_pending() {
                    continue;
                }
                if let Some(verdict) =
                    self.classify(task, &completed, cyclic, &members, &scc, &verdicts)
                {
                    verdicts.insert(node, verdict);
                }
            }
        }

        self.graph
            .node_indices()
            .filter_map(|node| {
                let task = self.graph[node];
                if !task.is_pending() {
                    return None;
                }
                let waiting = unsatisfied(task, &completed);
                if waiting.is_empty() {
                    return None;
                }
                Some(BlockedTask {
                    task: task.clone(),
                    unsatisfied: waiting.into_iter().cloned().collect(),
                    unsatisfiable: verdicts.get(&node).cloned(),
                })
            })
            .collect()
    }

    fn classify(
        &self,
        task: &Task,
        completed: &HashSet<&TaskId>,
        cyclic: bool,
        members: &HashSet<NodeIndex>,
        scc: &[NodeIndex],
        verdicts: &HashMap<NodeIndex, Unsatisfiable>,
    ) -> Option<Unsatisfiable> {
        for dep in unsatisfied(task, completed) {
            let Some(&dep_node) = self.index.get(dep) else {
                continue;
            };
            if self.graph[dep_node].is_failed() {
                return Some(Unsatisfiable::FailedDependency {
                    dependency: dep.clone(),
                });
            }
            if cyclic && members.contains(&dep_node) {
                return Some(Unsatisfiable::Cycle {
                    members: self.member_ids(scc),
                });
            }
            if verdicts.contains_key(&dep_node) {
                return Some(Unsatisfiable::Upstream {
                    dependency: dep.clone(),
                });
            }
        }
        None
    }

    fn is_cyclic(&self, scc: &[NodeIndex]) -> bool {
        match scc {
            [single] => self.graph.contains_edge(*single, *single),
            _ => true,
        }
    }

    fn member_ids(&self, scc: &[NodeIndex]) -> Vec<TaskId> {
        let mut nodes = scc.to_vec();
        nodes.sort();
        nodes.into_iter().map(|n| self.graph[n].id.clone()).collect()
    }
}

impl std::fmt::Debug for DependencyGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
