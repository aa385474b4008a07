//! Cross-process lock guarding read-modify-write cycles on the task list.
//!
//! The lock is an OS advisory lock (`flock` on Unix, `LockFileEx` on Windows)
//! on a sibling `<file>.lock`. The kernel drops it when the holding process
//! exits, crashed or not, so there is no stale-lock recovery. The lock file
//! itself is never deleted; unlinking a locked file would let a second
//! process lock a fresh inode under the same name.
//!
//! The file's contents name the current holder. They are informational only.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::{hlog_debug, hlog_trace, hlog_warn};

/// Longest pause between two acquisition attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Timing knobs for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl LockOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.lock_timeout(),
            retry_delay: config.lock_retry_delay(),
        }
    }
}

/// Who holds (or last held) the lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub owner: Uuid,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn new() -> Self {
        Self {
            owner: Uuid::new_v4(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    /// Last holder recorded in the lock file at `path`, if readable.
    pub fn read(path: &Path) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }
}

/// Held lock. Released when dropped.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    owner: Uuid,
    // Closing the handle releases the OS lock.
    _file: File,
}

impl StoreLock {
    /// Block until the lock at `path` is acquired or `options.timeout` passes.
    pub fn acquire(path: &Path, options: &LockOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let mut attempt: u32 = 0;

        while !file.try_lock_exclusive()? {
            let waited = start.elapsed();
            if waited >= options.timeout {
                hlog_warn!(
                    "Lock timeout: {} after {:?} (last holder {:?})",
                    path.display(),
                    waited,
                    LockInfo::read(path).map(|i| i.pid)
                );
                return Err(Error::LockTimeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }

            attempt += 1;
            let delay = (options.retry_delay * attempt).min(MAX_RETRY_DELAY);
            hlog_trace!("Lock busy: {} (attempt {}), sleeping {:?}", path.display(), attempt, delay);
            thread::sleep(delay.min(options.timeout.saturating_sub(waited)));
        }

        let info = LockInfo::new();
        let mut file = file;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serde_json::to_string(&info)?.as_bytes())?;

        hlog_debug!(
            "Lock acquired: {} after {} attempts",
            path.display(),
            attempt + 1
        );
        Ok(Self {
            path: path.to_path_buf(),
            owner: info.owner,
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        hlog_trace!("Lock released: {}", self.path.display());
    }
}
