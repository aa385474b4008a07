use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{hlog_debug, Result};

/// Directory (relative to the project root) shared with the other harness tools.
pub const HARNESS_DIR: &str = ".claude";

pub const DEFAULT_FEATURE_LIST: &str = ".claude/feature_list.json";
pub const DEFAULT_PRIORITY: i64 = 5;

/// Per-project coordinator settings, read from `.claude/harness.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Task document, relative to the project root unless absolute.
    pub feature_list: PathBuf,
    /// Priority assumed for tasks that do not declare one.
    pub default_priority: i64,
    /// Completion percentage at which the project counts as ready.
    pub project_ready_threshold: f64,
    pub lock_timeout_ms: u64,
    pub lock_retry_delay_ms: u64,
    /// Copy the previous document to `<file>.bak` before every save.
    pub backup_on_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feature_list: PathBuf::from(DEFAULT_FEATURE_LIST),
            default_priority: DEFAULT_PRIORITY,
            project_ready_threshold: 80.0,
            lock_timeout_ms: 10_000,
            lock_retry_delay_ms: 20,
            backup_on_save: true,
        }
    }
}

impl Config {
    pub fn harness_dir(root: &Path) -> PathBuf {
        root.join(HARNESS_DIR)
    }

    pub fn config_path(root: &Path) -> PathBuf {
        Self::harness_dir(root).join("harness.toml")
    }

    pub fn feature_list_path(&self, root: &Path) -> PathBuf {
        if self.feature_list.is_absolute() {
            self.feature_list.clone()
        } else {
            root.join(&self.feature_list)
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_delay_ms)
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        hlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            hlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        hlog_debug!(
            "Config loaded: feature_list={}, default_priority={}, lock_timeout_ms={}",
            config.feature_list.display(),
            config.default_priority,
            config.lock_timeout_ms
        );
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let dir = Self::harness_dir(root);
        if !dir.exists() {
            hlog_debug!("Creating harness directory: {}", dir.display());
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path(root);
        fs::write(&path, toml::to_string_pretty(self)?)?;
        hlog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
