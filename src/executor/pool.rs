//! Tokio blocking-pool execution.
//!
//! Tasks block their worker while paused, so they run on
//! `spawn_blocking` threads rather than on async workers. How many tasks run
//! at once is decided by the scheduler, not here.

use super::{ExecutorError, Job, JobKind};
use tokio::runtime::Handle;
use tracing::debug;

/// Runs jobs on the tokio blocking thread pool
#[derive(Debug, Clone)]
pub struct TokioPool {
    handle: Handle,
}

impl TokioPool {
    /// Create a pool on the given runtime
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a pool on the runtime of the calling context
    pub fn current() -> Result<Self, ExecutorError> {
        let handle =
            Handle::try_current().map_err(|e| ExecutorError::RuntimeUnavailable(e.to_string()))?;
        Ok(Self::new(handle))
    }

    pub fn execute(&self, kind: JobKind, job: Job) {
        debug!("Spawning {} job", kind);
        self.handle.spawn_blocking(job);
    }
}
