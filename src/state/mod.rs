//! Task list persistence: the store trait, the JSON file store and its lock.

pub mod lock;
pub mod store;

pub use lock::{LockInfo, LockOptions, StoreLock};
pub use store::{JsonFileStore, MemoryStore, TaskStore};
