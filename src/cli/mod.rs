//! CLI-specific functionality for taskdeck
//!
//! This module contains all CLI-related code including argument parsing,
//! plan loading, and configuration discovery.

pub mod args;
pub mod config;
pub mod plan;

pub use args::{Args, ExecutionMode, RunConfig};
pub use config::{ConfigDiscovery, load_config};
pub use plan::{PlanError, PlannedTask, TaskPlan};
