//! # Execution Pool
//!
//! Where scheduled work actually runs. The task manager never executes a task
//! or a scheduling pass on the caller's thread: both are handed to a
//! [`PoolExecutor`] as [`Job`]s.
//!
//! ## Core Components
//!
//! - **[`PoolExecutor`]**: Unified enum executor over the available pools
//! - **[`TokioPool`]**: Runs jobs on the tokio blocking thread pool
//! - **[`ManualPool`]**: Queues jobs until the owner drains them, for
//!   deterministic driving (tests, single-threaded hosts)
//!
//! ## Job Kinds
//!
//! Jobs are tagged with a [`JobKind`] so that pools can tell scheduling
//! passes from task runs. Pools never hold a job back: the task manager
//! only submits as many tasks as its worker limit allows, and a pass must
//! never queue behind a long-running task.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use taskdeck::executor::{JobKind, PoolExecutor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = PoolExecutor::tokio()?;
//!     executor.execute(JobKind::Task, Box::new(|| println!("running")));
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

/// Pool backed by the tokio blocking thread pool.
pub mod pool;

/// Manually drained job queue.
pub mod manual;

pub use manual::ManualPool;
pub use pool::TokioPool;

/// A unit of work handed to a pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// What a job does, for pools that treat them differently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Runs a task to completion (or to cancellation)
    Task,
    /// Runs one scheduling pass
    Refresh,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Task => f.write_str("task"),
            JobKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Errors while setting up a pool
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// No tokio runtime to spawn on
    #[error("No tokio runtime available: {0}")]
    RuntimeUnavailable(String),
}

/// Executor enum - abstracts where jobs run
#[derive(Clone)]
pub enum PoolExecutor {
    /// Run jobs on the tokio blocking pool
    Tokio(TokioPool),
    /// Queue jobs until drained by the owner
    Manual(Arc<ManualPool>),
}

impl PoolExecutor {
    /// Tokio-backed executor on the current runtime
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn tokio() -> Result<Self, ExecutorError> {
        Ok(Self::Tokio(TokioPool::current()?))
    }

    /// Manually drained executor, returned along with its queue
    pub fn manual() -> (Self, Arc<ManualPool>) {
        let pool = Arc::new(ManualPool::new());
        (Self::Manual(Arc::clone(&pool)), pool)
    }

    /// Hand a job to the pool; never runs it on the calling thread
    pub fn execute(&self, kind: JobKind, job: Job) {
        match self {
            Self::Tokio(pool) => pool.execute(kind, job),
            Self::Manual(pool) => pool.execute(kind, job),
        }
    }

    /// Get executor type name for logging
    pub fn executor_type(&self) -> &'static str {
        match self {
            Self::Tokio(_) => "tokio",
            Self::Manual(_) => "manual",
        }
    }
}

impl fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tokio(pool) => f.debug_tuple("Tokio").field(pool).finish(),
            Self::Manual(pool) => f.debug_tuple("Manual").field(pool).finish(),
        }
    }
}
