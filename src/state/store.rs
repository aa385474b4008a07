//! Durable storage for the task collection.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::config::Config;
use crate::core::collection::TaskCollection;
use crate::error::{Error, Result};
use crate::state::lock::{LockOptions, StoreLock};
use crate::{hlog_debug, hlog_error};

/// Whole-document storage for a task collection.
///
/// Every mutation is a full read-modify-write. [`update`](TaskStore::update)
/// is the only way the coordinator mutates state; it holds the store's
/// exclusive lock from load to save so concurrent writers serialise.
pub trait TaskStore {
    /// Read and validate the whole collection.
    fn load(&self) -> Result<TaskCollection>;

    /// Replace the whole collection. Readers never observe a partial write.
    ///
    /// Takes no lock. Anything that may run alongside other agents must
    /// mutate through [`update`](TaskStore::update) instead, or it can
    /// overwrite a claim made since its own load.
    fn save(&self, collection: &TaskCollection) -> Result<()>;

    /// Run `f` on the current collection under the store's exclusive lock
    /// and persist the result. Nothing is written if `f` fails or leaves the
    /// collection unchanged.
    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TaskCollection) -> Result<T>;
}

/// `feature_list.json` on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_options: LockOptions,
    backup: bool,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_options: LockOptions::default(),
            backup: true,
        }
    }

    /// Store for the project at `root`, located and tuned by `config`.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self {
            path: config.feature_list_path(root),
            lock_options: LockOptions::from_config(config),
            backup: config.backup_on_save,
        }
    }

    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "bak")
    }

    fn temp_path(&self) -> PathBuf {
        // Unique per writer so an interrupted save never collides with another.
        sibling(&self.path, &format!("{}.tmp", Uuid::new_v4()))
    }

    fn write_atomic(&self, contents: &str) -> Result<()> {
        let temp_path = self.temp_path();
        let result = (|| -> Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)?;
            Ok(())
        })();

        if let Err(e) = &result {
            hlog_error!("Save failed for {}: {}", self.path.display(), e);
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

/// `tasks.json` + `lock` -> `tasks.json.lock`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

impl TaskStore for JsonFileStore {
    fn load(&self) -> Result<TaskCollection> {
        hlog_debug!("JsonFileStore::load path={}", self.path.display());
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let collection = TaskCollection::from_json(&contents)?;
        hlog_debug!("Task list loaded: {} tasks", collection.len());
        Ok(collection)
    }

    fn save(&self, collection: &TaskCollection) -> Result<()> {
        collection.validate()?;
        let contents = collection.to_json_pretty()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                hlog_debug!("Creating task list directory: {}", parent.display());
                fs::create_dir_all(parent)?;
            }
        }

        if self.backup && self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }

        self.write_atomic(&contents)?;
        hlog_debug!("Task list saved: {} tasks", collection.len());
        Ok(())
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TaskCollection) -> Result<T>,
    {
        let _lock = StoreLock::acquire(&self.lock_path(), &self.lock_options)?;
        let mut collection = self.load()?;
        let before = collection.clone();

        let output = f(&mut collection)?;
        if collection != before {
            self.save(&collection)?;
        }
        Ok(output)
    }
}

/// In-process store, for embedding the coordinator without a file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collection: Mutex<Option<TaskCollection>>,
}

impl MemoryStore {
    pub fn new(collection: TaskCollection) -> Self {
        Self {
            collection: Mutex::new(Some(collection)),
        }
    }

    /// A store with no collection yet; `load` reports `NotFound`.
    pub fn empty() -> Self {
        Self::default()
    }

    fn not_found() -> Error {
        Error::NotFound {
            path: PathBuf::from("<memory>"),
        }
    }
}

impl TaskStore for MemoryStore {
    fn load(&self) -> Result<TaskCollection> {
        let guard = self.collection.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone().ok_or_else(Self::not_found)
    }

    fn save(&self, collection: &TaskCollection) -> Result<()> {
        collection.validate()?;
        let mut guard = self.collection.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(collection.clone());
        Ok(())
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TaskCollection) -> Result<T>,
    {
        let mut guard = self.collection.lock().unwrap_or_else(|e| e.into_inner());
        let mut collection = guard.clone().ok_or_else(Self::not_found)?;
        let output = f(&mut collection)?;
        collection.validate()?;
        *guard = Some(collection);
        Ok(output)
    }
}
