//! # Taskdeck
//!
//! A background task scheduler for work that competes for exclusive devices
//! (disks, drives, network shares). Tasks are registered with a
//! [`TaskManager`], which decides on every change which of them may use their
//! devices, starts them on an execution pool, and puts lower-priority work on
//! hold until the devices are free again.
//!
//! ## Architecture Overview
//!
//! - **[`task`]**: Task model, registry, scheduling passes and the public API
//! - **[`executor`]**: Execution pools running task bodies and scheduling passes
//! - **[`node`]**: Bridge mirroring tasks onto a UI node tree
//! - **[`cli`]**: Command line front end simulating plans of tasks
//!
//! ## Features
//!
//! ### Scheduling
//! - **Device Exclusivity**: No two running tasks ever share a device
//! - **Priorities**: Higher priority work pauses and later resumes lower priority work
//! - **Coalesced Passes**: Bursts of changes trigger at most one extra scheduling pass
//!
//! ### Control
//! - **State Requests**: Start, pause, stop and cancel tasks with validated transitions
//! - **Bulk Switching**: Switch many tasks on or off, collecting per-task failures
//! - **Status Line**: Configurable summary of how many tasks are in each state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskdeck::{Devices, PoolExecutor, TaskManager, TaskManagerConfig, WorkOutcome, WorkTask};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let executor = PoolExecutor::tokio()?;
//!     let manager = TaskManager::new(TaskManagerConfig::default(), executor);
//!
//!     let task = WorkTask::builder("Copy photos")
//!         .devices(Devices::set(["disk1"]))
//!         .build(|_ctx| WorkOutcome::Done);
//!     manager.add_task(task)?;
//!
//!     println!("{}", manager.status_line().unwrap_or_default());
//!     Ok(())
//! }
//! ```

/// Task management and scheduling.
///
/// Provides the task model, the coordination lock guarding the registry,
/// the scheduling algorithm and the [`TaskManager`] API.
pub mod task;

/// Execution pools.
///
/// Runs task bodies and scheduling passes off the caller's thread.
pub mod executor;

/// Node tree bridge.
pub mod node;

/// Environment constants and path utilities.
pub mod env;

// CLI module for command-line interface
pub mod cli;

// Re-export main task types
pub use task::{
    Devices, DeviceId, Task, TaskCounts, TaskId, TaskManager, TaskManagerConfig,
    TaskManagerError, TaskObserver, TaskPriority, TaskSnapshot, TaskState, TaskStatus,
    TaskVisibility, WorkOutcome, WorkTask,
};

// Re-export execution types
pub use executor::{ExecutorError, JobKind, ManualPool, PoolExecutor, TokioPool};

// Re-export node bridge types
pub use node::{NodeBridge, PropertyValue};
