//! Coordination layer: task selection, status transitions, progress.
//!
//! [`TaskCoordinator`] is the entry point agents talk to. It composes the
//! read-only [`Scheduler`], the [`LifecycleManager`] that writes status
//! changes through a [`TaskStore`](crate::state::TaskStore), and the
//! progress aggregator.

mod coordinator;
mod lifecycle;
mod progress;
mod scheduler;

pub use coordinator::{TaskCoordinator, DEFAULT_FAILURE_MESSAGE};
pub use lifecycle::{stranded_by, LifecycleManager};
pub use progress::{
    progress, GroupProgress, ProgressReport, RecommendedAction, DEFAULT_READY_THRESHOLD,
    UNASSIGNED, UNCATEGORIZED,
};
pub use scheduler::{Scheduler, GENERAL_AGENT};
