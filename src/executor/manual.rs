use super::{Job, JobKind};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Jobs run by the owner on demand, in submission order
#[derive(Default)]
pub struct ManualPool {
    queue: Mutex<VecDeque<(JobKind, Job)>>,
}

impl ManualPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&self, kind: JobKind, job: Job) {
        self.queue().push_back((kind, job));
    }

    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    pub fn pending_of(&self, kind: JobKind) -> usize {
        self.queue().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Run the oldest job of the given kind, leaving the others queued
    pub fn run_next_of(&self, kind: JobKind) -> bool {
        let job = {
            let mut queue = self.queue();
            let Some(position) = queue.iter().position(|(k, _)| *k == kind) else {
                return false;
            };
            queue.remove(position).map(|(_, job)| job)
        };
        match job {
            Some(job) => {
                // Outside the queue lock: jobs may enqueue more jobs
                job();
                true
            }
            None => false,
        }
    }

    /// Run scheduling passes until none is left; returns how many ran
    pub fn run_refreshes(&self) -> usize {
        let mut count = 0;
        while self.run_next_of(JobKind::Refresh) {
            count += 1;
        }
        if count > 0 {
            debug!("Ran {} refresh job(s)", count);
        }
        count
    }

    /// Run every queued task job once, then settle the passes they triggered
    pub fn run_tasks(&self) -> usize {
        let mut count = 0;
        for _ in 0..self.pending_of(JobKind::Task) {
            if self.run_next_of(JobKind::Task) {
                count += 1;
            }
        }
        self.run_refreshes();
        count
    }

    /// Drop queued task jobs without running them; returns how many
    pub fn discard_tasks(&self) -> usize {
        let mut queue = self.queue();
        let before = queue.len();
        queue.retain(|(kind, _)| *kind != JobKind::Task);
        before - queue.len()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<(JobKind, Job)>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ManualPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualPool")
            .field("pending", &self.pending())
            .finish()
    }
}
