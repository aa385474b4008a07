//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Creating a temporary project with a task document
//! - Predefined task documents

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;

use harness::config::Config;
use harness::orchestration::TaskCoordinator;
use harness::state::JsonFileStore;

/// A temporary project directory with `.claude/feature_list.json`.
pub struct TestProject {
    /// Held so the directory lives as long as the project.
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl TestProject {
    /// Create a project whose task document is `document`.
    pub fn with_document(document: Value) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        let project = Self { temp_dir, root };
        project.write_document(&document);
        project
    }

    /// Create a project with the given `features` array and nothing else.
    pub fn with_features(features: Value) -> Self {
        Self::with_document(json!({ "features": features }))
    }

    pub fn feature_list(&self) -> PathBuf {
        Config::default().feature_list_path(&self.root)
    }

    pub fn write_document(&self, document: &Value) {
        let path = self.feature_list();
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create .claude");
        fs::write(&path, serde_json::to_string_pretty(document).unwrap())
            .expect("Failed to write feature list");
    }

    pub fn read_document(&self) -> Value {
        let contents = fs::read_to_string(self.feature_list()).expect("Failed to read feature list");
        serde_json::from_str(&contents).expect("Feature list is not JSON")
    }

    /// Status string of task `id` as persisted on disk.
    pub fn persisted_status(&self, id: &str) -> String {
        let document = self.read_document();
        document["features"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["id"] == id)
            .map(|f| f["status"].as_str().unwrap_or("pending").to_string())
            .unwrap_or_else(|| panic!("Task {} not in document", id))
    }

    pub fn coordinator(&self) -> TaskCoordinator<JsonFileStore> {
        TaskCoordinator::open(&self.root).expect("Failed to open coordinator")
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

/// Two tasks, T2 depending on T1.
pub fn chain_features() -> Value {
    json!([
        { "id": "T1", "name": "Create user model", "dependencies": [] },
        { "id": "T2", "name": "Login endpoint", "dependencies": ["T1"] }
    ])
}

/// `count` independent, unassigned tasks `T1..=Tcount`.
pub fn independent_features(count: usize) -> Value {
    Value::Array(
        (1..=count)
            .map(|i| json!({ "id": format!("T{}", i), "priority": i }))
            .collect(),
    )
}

/// A frontend task and a backend task, both eligible.
pub fn split_features() -> Value {
    json!([
        { "id": "UI-1", "agent_assigned": "frontend", "category": "ui" },
        { "id": "API-1", "agent_assigned": "backend", "category": "api" }
    ])
}
