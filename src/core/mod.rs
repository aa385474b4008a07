//! Core domain models for task coordination.
//!
//! This module contains the task record, the collection document that holds
//! every task, and dependency resolution over that collection.

pub mod collection;
pub mod dag;
pub mod task;

pub use collection::{ParallelExecution, TaskCollection};
pub use dag::{blocked, eligible, BlockedTask, DependencyGraph, Unsatisfiable};
pub use task::{Complexity, StatusKind, Task, TaskId, TaskStatus};
