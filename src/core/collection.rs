//! The task collection: the whole `feature_list.json` document.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};

/// Precomputed parallel groupings written by the planning step.
///
/// Informational only; eligibility is always recomputed from dependencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelExecution {
    #[serde(default)]
    pub groups: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ordered tasks plus whatever else the planning step put in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCollection {
    #[serde(rename = "features")]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_execution: Option<ParallelExecution>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskCollection {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    /// Decode and validate a document.
    pub fn from_json(contents: &str) -> Result<Self> {
        let collection: Self = serde_json::from_str(contents)
            .map_err(|e| Error::MalformedData(e.to_string()))?;
        collection.validate()?;
        Ok(collection)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check id uniqueness and that every dependency refers to a known task.
    ///
    /// Cycles are allowed here; they surface in the blocked report instead.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&TaskId> = HashSet::with_capacity(self.tasks.len());
        for task in &self.tasks {
            if !seen.insert(&task.id) {
                return Err(Error::MalformedData(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }

        for task in &self.tasks {
            if let Some(missing) = task.dependencies.iter().find(|d| !seen.contains(d)) {
                return Err(Error::MalformedData(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.id, missing
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// Like [`get_mut`](Self::get_mut) but reports a missing id as an error.
    pub fn require_mut(&mut self, id: &TaskId) -> Result<&mut Task> {
        self.get_mut(id)
            .ok_or_else(|| Error::TaskNotFound(id.clone()))
    }

    /// Ids of every completed task, derived fresh from current statuses.
    pub fn completed_ids(&self) -> HashSet<&TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.is_completed())
            .map(|t| &t.id)
            .collect()
    }

    pub fn parallel_groups(&self) -> &[Value] {
        self.parallel_execution
            .as_ref()
            .map(|p| p.groups.as_slice())
            .unwrap_or(&[])
    }
}
