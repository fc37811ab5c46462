use crate::task::interface::Task;
use crate::task::scheduler::Candidate;
use crate::task::types::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Scheduler bookkeeping around a registered task
pub struct TaskRecord {
    task: Arc<dyn Task>,
    /// Handed to the execution pool and not yet known to have left `Waiting`
    in_pool: AtomicBool,
    /// Paused by the scheduler rather than by the user
    own_pause: AtomicBool,
    added_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            in_pool: AtomicBool::new(false),
            own_pause: AtomicBool::new(false),
            added_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    pub fn in_pool(&self) -> bool {
        self.in_pool.load(Ordering::Acquire)
    }

    pub fn set_in_pool(&self, in_pool: bool) {
        self.in_pool.store(in_pool, Ordering::Release);
    }

    pub fn own_pause(&self) -> bool {
        self.own_pause.load(Ordering::Acquire)
    }

    pub fn set_own_pause(&self, own_pause: bool) {
        self.own_pause.store(own_pause, Ordering::Release);
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// Visible status, telling on-hold apart from user pauses
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_state(self.task.state(), self.own_pause())
    }

    pub fn candidate(&self) -> Candidate {
        Candidate {
            id: self.id(),
            state: self.task.state(),
            priority: self.task.priority(),
            devices: self.task.devices(),
            in_pool: self.in_pool(),
            own_pause: self.own_pause(),
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id(),
            desc: self.task.desc(),
            status: self.status(),
            priority: self.task.priority(),
            devices: self.task.devices(),
            progress: self.task.progress(),
            status_text: self.task.status(),
            in_pool: self.in_pool(),
            added_at: self.added_at,
        }
    }
}

impl std::fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id())
            .field("in_pool", &self.in_pool())
            .field("own_pause", &self.own_pause())
            .field("added_at", &self.added_at)
            .finish()
    }
}

/// Registered tasks, in registration order
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<Arc<TaskRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; `false` if its task is already registered
    pub fn insert(&mut self, record: Arc<TaskRecord>) -> bool {
        if self.contains(record.id()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.records.iter().any(|r| r.id() == id)
    }

    pub fn get(&self, id: TaskId) -> Option<&Arc<TaskRecord>> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskRecord>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
