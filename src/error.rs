use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::task::TaskId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Task list not found at {}. Run the planning step first.", path.display())]
    NotFound { path: PathBuf },

    #[error("Malformed task list: {0}")]
    MalformedData(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: TaskId,
        from: String,
        to: String,
    },

    #[error("Task {id} was already claimed by another agent")]
    AlreadyClaimed { id: TaskId },

    #[error("Task {id} has unsatisfied dependencies: {}", join_ids(unsatisfied))]
    DependenciesUnsatisfied {
        id: TaskId,
        unsatisfied: Vec<TaskId>,
    },

    #[error("Timed out after {waited:?} waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No home directory")]
    NoHomeDir,
}

impl Error {
    /// Errors a calling agent can recover from by re-reading state or
    /// requesting another task.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidTransition { .. }
                | Error::AlreadyClaimed { .. }
                | Error::DependenciesUnsatisfied { .. }
                | Error::LockTimeout { .. }
        )
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
