//! Integration test suite for the task coordinator.
//!
//! These tests drive `TaskCoordinator` against a real
//! `.claude/feature_list.json` in a temporary project, the way agents do.
//!
//! # Test Categories
//!
//! - `lifecycle`: claim, complete and fail through the file store
//! - `concurrency`: several agents racing for the same document
//! - `blocked`: cycles and failed dependencies
//! - `progress`: progress reports and document round-trips

mod fixtures;

mod concurrency;
mod lifecycle;
mod progress;
