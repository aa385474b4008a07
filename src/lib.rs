//! Task coordination for AI coding agents.
//!
//! Agents share one task document (`.claude/feature_list.json`). This crate
//! decides which task is eligible next, hands it out with an atomic claim,
//! records completion or failure, and reports progress.

pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod state;

pub use error::{Error, Result};
