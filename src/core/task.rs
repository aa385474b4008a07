//! Task data model.
//!
//! A task is one unit of work an agent can claim. In memory its status is a
//! tagged variant carrying the timestamps of the transitions it went through;
//! on disk it uses the flat layout of `feature_list.json` (`status`, `passes`,
//! `started_at`, ...). Fields the coordinator does not know about are carried
//! through untouched so other tools reading the same document keep working.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Identifier of a task, unique within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Estimated size of a task. Only used to break priority ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Complexity::Low),
            "medium" => Ok(Complexity::Medium),
            "high" => Ok(Complexity::High),
            other => Err(format!("unknown complexity '{}'", other)),
        }
    }
}

impl TryFrom<String> for Complexity {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Complexity> for String {
    fn from(c: Complexity) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four lifecycle states without their payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Pending => "pending",
            StatusKind::InProgress => "in_progress",
            StatusKind::Completed => "completed",
            StatusKind::Failed => "failed",
        }
    }
}

impl std::str::FromStr for StatusKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(StatusKind::Pending),
            "in_progress" => Ok(StatusKind::InProgress),
            "completed" => Ok(StatusKind::Completed),
            "failed" => Ok(StatusKind::Failed),
            other => Err(Error::Validation(format!("unknown status '{}'", other))),
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status in its lifecycle.
///
/// `Pending -> InProgress -> Completed | Failed`. Completed and Failed are
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress {
        started_at: DateTime<Utc>,
    },
    Completed {
        started_at: Option<DateTime<Utc>>,
        implemented_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    },
    Failed {
        started_at: Option<DateTime<Utc>>,
        failed_at: DateTime<Utc>,
        error: String,
    },
}

impl TaskStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            TaskStatus::Pending => StatusKind::Pending,
            TaskStatus::InProgress { .. } => StatusKind::InProgress,
            TaskStatus::Completed { .. } => StatusKind::Completed,
            TaskStatus::Failed { .. } => StatusKind::Failed,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TaskStatus::Pending => None,
            TaskStatus::InProgress { started_at } => Some(*started_at),
            TaskStatus::Completed { started_at, .. } | TaskStatus::Failed { started_at, .. } => {
                *started_at
            }
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Failed { error, .. } => write!(f, "failed: {}", error),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// A single task in the collection.
///
/// A task decoded from a document remembers the object it came from. When it
/// is written back, keys whose meaning did not change keep their original
/// text (timestamp precision, label case, explicit nulls, absent defaults);
/// only keys a transition touched are rewritten.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    /// Tasks that must be completed before this one is eligible.
    pub dependencies: Vec<TaskId>,
    pub status: TaskStatus,
    /// Agent class allowed to claim the task; `None` means any agent.
    pub agent_assigned: Option<String>,
    /// Lower is more urgent. `None` falls back to the configured default.
    pub priority: Option<i64>,
    pub estimated_complexity: Option<Complexity>,
    pub category: Option<String>,
    /// Fields owned by other tools, written back verbatim.
    pub extra: Map<String, Value>,
    origin: Option<Arc<Origin>>,
}

/// The JSON object a task was decoded from, and what that task encoded to
/// at decode time.
#[derive(Debug)]
struct Origin {
    source: Map<String, Value>,
    baseline: Map<String, Value>,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.dependencies == other.dependencies
            && self.status == other.status
            && self.agent_assigned == other.agent_assigned
            && self.priority == other.priority
            && self.estimated_complexity == other.estimated_complexity
            && self.category == other.category
            && self.extra == other.extra
    }
}

impl Task {
    /// Create a pending task with no dependencies.
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            agent_assigned: None,
            priority: None,
            estimated_complexity: None,
            category: None,
            extra: Map::new(),
            origin: None,
        }
    }

    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_agent(mut self, agent: &str) -> Self {
        self.agent_assigned = Some(agent.to_string());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.estimated_complexity = Some(complexity);
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn kind(&self) -> StatusKind {
        self.status.kind()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, TaskStatus::Pending)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.status, TaskStatus::InProgress { .. })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, TaskStatus::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, TaskStatus::Failed { .. })
    }

    /// Completed or failed.
    pub fn is_finished(&self) -> bool {
        self.is_completed() || self.is_failed()
    }

    pub fn effective_priority(&self, default: i64) -> i64 {
        self.priority.unwrap_or(default)
    }

    pub fn complexity(&self) -> Complexity {
        self.estimated_complexity.unwrap_or_default()
    }

    /// True if the task may be claimed by `agent`. Unassigned tasks match
    /// every agent.
    pub fn matches_agent(&self, agent: &str) -> bool {
        self.agent_assigned.as_deref().map_or(true, |a| a == agent)
    }

    /// Human-readable name, if the planning step provided one.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }

    /// Transition `pending -> in_progress`, recording `started_at`.
    pub fn start(&mut self) -> Result<()> {
        if !self.is_pending() {
            return Err(self.invalid_transition(StatusKind::InProgress));
        }
        self.status = TaskStatus::InProgress {
            started_at: Utc::now(),
        };
        Ok(())
    }

    /// Transition `in_progress -> completed`, recording `implemented_at`.
    pub fn complete(&mut self, notes: Option<&str>) -> Result<()> {
        let TaskStatus::InProgress { started_at } = self.status else {
            return Err(self.invalid_transition(StatusKind::Completed));
        };
        self.status = TaskStatus::Completed {
            started_at: Some(started_at),
            implemented_at: Some(Utc::now()),
            notes: notes.map(str::to_string),
        };
        Ok(())
    }

    /// Transition `in_progress -> failed`, recording `failed_at` and the error.
    pub fn fail(&mut self, error: &str) -> Result<()> {
        if error.trim().is_empty() {
            return Err(Error::Validation(format!(
                "failing task {} requires an error message",
                self.id
            )));
        }
        let TaskStatus::InProgress { started_at } = self.status else {
            return Err(self.invalid_transition(StatusKind::Failed));
        };
        self.status = TaskStatus::Failed {
            started_at: Some(started_at),
            failed_at: Utc::now(),
            error: error.to_string(),
        };
        Ok(())
    }

    fn invalid_transition(&self, to: StatusKind) -> Error {
        Error::InvalidTransition {
            id: self.id.clone(),
            from: self.kind().to_string(),
            to: to.to_string(),
        }
    }
}

// ========== Wire format ==========

/// Flat on-disk layout of a task.
#[derive(Serialize, Deserialize)]
struct RawTask {
    id: TaskId,
    #[serde(default)]
    dependencies: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent_assigned: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    estimated_complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default)]
    passes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    implemented_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    implementation_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn parse_timestamp(id: &TaskId, field: &str, raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    // Naive ISO-8601 as written by earlier tooling; treated as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| format!("task {}: invalid {} timestamp '{}'", id, field, raw))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl TryFrom<RawTask> for Task {
    type Error = String;

    fn try_from(raw: RawTask) -> std::result::Result<Self, Self::Error> {
        let RawTask {
            id,
            dependencies,
            agent_assigned,
            priority,
            estimated_complexity,
            category,
            passes,
            status,
            mut started_at,
            mut implemented_at,
            mut failed_at,
            mut implementation_notes,
            mut error_message,
            mut extra,
        } = raw;

        if id.as_str().trim().is_empty() {
            return Err("task with empty id".to_string());
        }

        let kind = if passes {
            StatusKind::Completed
        } else {
            match status.as_deref() {
                None => StatusKind::Pending,
                Some(s) => s
                    .parse::<StatusKind>()
                    .map_err(|_| format!("task {}: unknown status '{}'", id, s))?,
            }
        };

        let parse = |field: &str, value: Option<String>| {
            value
                .map(|v| parse_timestamp(&id, field, &v))
                .transpose()
        };

        let status = match kind {
            StatusKind::Pending => TaskStatus::Pending,
            StatusKind::InProgress => TaskStatus::InProgress {
                started_at: parse("started_at", started_at.take())?
                    .ok_or_else(|| format!("task {}: in_progress without started_at", id))?,
            },
            StatusKind::Completed => TaskStatus::Completed {
                started_at: parse("started_at", started_at.take())?,
                implemented_at: parse("implemented_at", implemented_at.take())?,
                notes: implementation_notes.take(),
            },
            StatusKind::Failed => TaskStatus::Failed {
                started_at: parse("started_at", started_at.take())?,
                failed_at: parse("failed_at", failed_at.take())?
                    .ok_or_else(|| format!("task {}: failed without failed_at", id))?,
                error: error_message
                    .take()
                    .ok_or_else(|| format!("task {}: failed without error_message", id))?,
            },
        };

        // Whatever the status variant did not consume is kept as-is.
        for (key, value) in [
            ("started_at", started_at),
            ("implemented_at", implemented_at),
            ("failed_at", failed_at),
            ("implementation_notes", implementation_notes),
            ("error_message", error_message),
        ] {
            if let Some(v) = value {
                extra.insert(key.to_string(), Value::String(v));
            }
        }
        Ok(Task {
            id,
            dependencies,
            status,
            agent_assigned,
            priority,
            estimated_complexity,
            category,
            extra,
            origin: None,
        })
    }
}

impl From<&Task> for RawTask {
    fn from(task: &Task) -> Self {
        let mut extra = task.extra.clone();
        let mut take = |key: &str| match extra.shift_remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                extra.insert(key.to_string(), other);
                None
            }
            None => None,
        };
        let mut raw_started = take("started_at");
        let mut raw_implemented = take("implemented_at");
        let mut raw_failed = take("failed_at");
        let mut raw_notes = take("implementation_notes");
        let mut raw_error = take("error_message");

        let kind = task.status.kind();
        match task.status.clone() {
            TaskStatus::Pending => {}
            TaskStatus::InProgress { started_at } => {
                raw_started = Some(format_timestamp(started_at));
            }
            TaskStatus::Completed {
                started_at,
                implemented_at,
                notes,
            } => {
                raw_started = started_at.map(format_timestamp).or(raw_started);
                raw_implemented = implemented_at.map(format_timestamp).or(raw_implemented);
                raw_notes = notes.or(raw_notes);
            }
            TaskStatus::Failed {
                started_at,
                failed_at,
                error,
            } => {
                raw_started = started_at.map(format_timestamp).or(raw_started);
                raw_failed = Some(format_timestamp(failed_at));
                raw_error = Some(error);
            }
        }

        RawTask {
            id: task.id.clone(),
            dependencies: task.dependencies.clone(),
            agent_assigned: task.agent_assigned.clone(),
            priority: task.priority,
            estimated_complexity: task.estimated_complexity,
            category: task.category.clone(),
            passes: kind == StatusKind::Completed,
            status: Some(kind.to_string()),
            started_at: raw_started,
            implemented_at: raw_implemented,
            failed_at: raw_failed,
            implementation_notes: raw_notes,
            error_message: raw_error,
            extra,
        }
    }
}

impl Task {
    /// Flat encoding of the task's current state, ignoring its origin.
    fn encode(&self) -> serde_json::Result<Map<String, Value>> {
        match serde_json::to_value(RawTask::from(self))? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "task {} encoded to a non-object: {}",
                self.id, other
            ))),
        }
    }

    /// The object written to the document.
    fn to_object(&self) -> serde_json::Result<Map<String, Value>> {
        let current = self.encode()?;
        let Some(origin) = &self.origin else {
            return Ok(current);
        };
        if origin.baseline == current {
            return Ok(origin.source.clone());
        }

        let mut merged = origin.source.clone();
        for key in origin.baseline.keys() {
            if !current.contains_key(key) {
                merged.shift_remove(key);
            }
        }
        for (key, value) in current {
            if origin.baseline.get(&key) != Some(&value) {
                merged.insert(key, value);
            }
        }
        Ok(merged)
    }
}

impl Serialize for Task {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_object()
            .map_err(<S::Error as serde::ser::Error>::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as _;

        let source = Map::<String, Value>::deserialize(deserializer)?;
        let raw: RawTask =
            serde_json::from_value(Value::Object(source.clone())).map_err(D::Error::custom)?;
        let mut task = Task::try_from(raw).map_err(D::Error::custom)?;
        let baseline = task.encode().map_err(D::Error::custom)?;
        task.origin = Some(Arc::new(Origin { source, baseline }));
        Ok(task)
    }
}
