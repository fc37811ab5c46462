//! In-memory [`Task`] running a step function.
//!
//! The work is a closure called repeatedly, one step per call, until it
//! reports completion or failure. Pause and cancellation requests are honored
//! between steps: a paused task keeps its worker thread parked until it is
//! resumed or cancelled.

use crate::task::interface::{Task, TaskObserver};
use crate::task::types::*;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of one step of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// More steps to go
    Continue,
    Done,
    Failed(String),
}

type WorkFn = Box<dyn FnMut(&TaskContext<'_>) -> WorkOutcome + Send>;

/// Handle given to the work function to report on its progress
pub struct TaskContext<'a> {
    task: &'a WorkTask,
}

impl TaskContext<'_> {
    pub fn task_id(&self) -> TaskId {
        self.task.id
    }

    /// Report progress, clamped to `0.0..=1.0`
    pub fn set_progress(&self, progress: f64) {
        self.task
            .update(TaskField::Progress, |s| s.progress = Some(progress.clamp(0.0, 1.0)));
    }

    /// Signal activity without a known completion ratio
    pub fn pulse(&self) {
        self.task.update(TaskField::Pulse, |s| s.pulse += 1);
    }

    pub fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        self.task
            .update(TaskField::Status, |s| s.status = Some(status));
    }

    /// Whether cancellation was requested; long steps may bail out early
    pub fn is_cancelling(&self) -> bool {
        self.task.state() == TaskState::Cancelling
    }
}

struct WorkState {
    state: TaskState,
    priority: TaskPriority,
    devices: Devices,
    desc: String,
    status: Option<String>,
    progress: Option<f64>,
    pulse: u64,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Task whose work is a step closure
pub struct WorkTask {
    id: TaskId,
    visibility: TaskVisibility,
    inner: Mutex<WorkState>,
    changed: Condvar,
    work: Mutex<Option<WorkFn>>,
    observers: Mutex<Vec<Arc<dyn TaskObserver>>>,
}

/// Builder for [`WorkTask`]
pub struct WorkTaskBuilder {
    desc: String,
    priority: TaskPriority,
    devices: Devices,
    visibility: TaskVisibility,
    autostart: bool,
}

impl WorkTaskBuilder {
    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn devices(mut self, devices: Devices) -> Self {
        self.devices = devices;
        self
    }

    pub fn visibility(mut self, visibility: TaskVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Start in `Waiting` (default) rather than `Stopped`
    pub fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    pub fn build<F>(self, work: F) -> Arc<WorkTask>
    where
        F: FnMut(&TaskContext<'_>) -> WorkOutcome + Send + 'static,
    {
        let state = if self.autostart {
            TaskState::Waiting
        } else {
            TaskState::Stopped
        };
        Arc::new(WorkTask {
            id: Uuid::new_v4(),
            visibility: self.visibility,
            inner: Mutex::new(WorkState {
                state,
                priority: self.priority,
                devices: self.devices,
                desc: self.desc,
                status: None,
                progress: None,
                pulse: 0,
                error: None,
                started_at: None,
                finished_at: None,
            }),
            changed: Condvar::new(),
            work: Mutex::new(Some(Box::new(work))),
            observers: Mutex::new(Vec::new()),
        })
    }
}

impl WorkTask {
    pub fn builder(desc: impl Into<String>) -> WorkTaskBuilder {
        WorkTaskBuilder {
            desc: desc.into(),
            priority: TaskPriority::default(),
            devices: Devices::default(),
            visibility: TaskVisibility::default(),
            autostart: true,
        }
    }

    pub fn set_priority(&self, priority: TaskPriority) {
        self.update(TaskField::Priority, |s| s.priority = priority);
    }

    pub fn set_devices(&self, devices: Devices) {
        self.update(TaskField::Devices, |s| s.devices = devices);
    }

    pub fn set_desc(&self, desc: impl Into<String>) {
        let desc = desc.into();
        self.update(TaskField::Desc, |s| s.desc = desc);
    }

    /// Failure message, once failed
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.lock().finished_at
    }

    /// Block until the task reaches a terminal state or the timeout expires;
    /// returns the state at that point
    pub fn wait_finished(&self, timeout: Duration) -> TaskState {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        while !inner.state.is_terminal() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            inner = self
                .changed
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        inner.state
    }

    fn lock(&self) -> MutexGuard<'_, WorkState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, field: TaskField, apply: impl FnOnce(&mut WorkState)) {
        apply(&mut self.lock());
        self.notify(field);
    }

    /// Move from `from` to `to` if currently in one of `from`
    fn transition(&self, from: &[TaskState], to: TaskState) -> bool {
        {
            let mut inner = self.lock();
            if !from.contains(&inner.state) {
                return false;
            }
            set_state(&mut inner, to);
        }
        self.changed.notify_all();
        self.notify(TaskField::State);
        true
    }

    fn notify(&self, field: TaskField) {
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_change(self.id, field);
        }
    }

    /// Wait out pauses between steps; `false` once the task must stop
    fn checkpoint(&self) -> bool {
        loop {
            let mut inner = self.lock();
            match inner.state {
                TaskState::Running => return true,
                TaskState::Pausing => {
                    set_state(&mut inner, TaskState::Paused);
                    drop(inner);
                    self.changed.notify_all();
                    self.notify(TaskField::State);
                }
                TaskState::Paused => {
                    let _parked = self
                        .changed
                        .wait_while(inner, |s| s.state == TaskState::Paused)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                TaskState::Cancelling => {
                    set_state(&mut inner, TaskState::Cancelled);
                    drop(inner);
                    self.changed.notify_all();
                    self.notify(TaskField::State);
                    return false;
                }
                _ => return false,
            }
        }
    }

    fn finish(&self, outcome: WorkOutcome) {
        {
            let mut inner = self.lock();
            match outcome {
                WorkOutcome::Done => {
                    inner.progress = Some(1.0);
                    set_state(&mut inner, TaskState::Done);
                }
                WorkOutcome::Failed(message) => {
                    warn!("Task {} failed: {}", self.id, message);
                    inner.error = Some(message);
                    set_state(&mut inner, TaskState::Failed);
                }
                WorkOutcome::Continue => return,
            }
        }
        self.changed.notify_all();
        self.notify(TaskField::State);
    }
}

fn set_state(inner: &mut WorkState, state: TaskState) {
    inner.state = state;
    match state {
        TaskState::Running if inner.started_at.is_none() => inner.started_at = Some(Utc::now()),
        s if s.is_terminal() => inner.finished_at = Some(Utc::now()),
        _ => {}
    }
}

impl Task for WorkTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn visibility(&self) -> TaskVisibility {
        self.visibility
    }

    fn state(&self) -> TaskState {
        self.lock().state
    }

    fn priority(&self) -> TaskPriority {
        self.lock().priority
    }

    fn devices(&self) -> Devices {
        self.lock().devices.clone()
    }

    fn desc(&self) -> String {
        self.lock().desc.clone()
    }

    fn status(&self) -> Option<String> {
        self.lock().status.clone()
    }

    fn progress(&self) -> Option<f64> {
        self.lock().progress
    }

    fn pulse(&self) -> u64 {
        self.lock().pulse
    }

    fn run(&self) {
        if !self.transition(&[TaskState::Waiting], TaskState::Running) {
            debug!("Task {} not waiting, nothing to run", self.id);
            return;
        }
        let Some(mut work) = self
            .work
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            self.finish(WorkOutcome::Failed("work already consumed".to_string()));
            return;
        };

        let context = TaskContext { task: self };
        while self.checkpoint() {
            let outcome = work(&context);
            if outcome != WorkOutcome::Continue {
                self.finish(outcome);
                return;
            }
        }
        debug!("Task {} stopped before completion", self.id);
    }

    fn pause(&self) -> bool {
        self.transition(&[TaskState::Running], TaskState::Pausing)
    }

    fn resume(&self) -> bool {
        self.transition(&[TaskState::Paused, TaskState::Pausing], TaskState::Running)
    }

    fn cancel(&self) -> bool {
        // Nothing runs yet: finish right away
        if self.transition(&[TaskState::Stopped, TaskState::Waiting], TaskState::Cancelled) {
            return true;
        }
        self.transition(
            &[TaskState::Running, TaskState::Pausing, TaskState::Paused],
            TaskState::Cancelling,
        )
    }

    fn set_autostart(&self, autostart: bool) -> bool {
        if autostart {
            self.transition(&[TaskState::Stopped], TaskState::Waiting)
        } else {
            self.transition(&[TaskState::Waiting], TaskState::Stopped)
        }
    }

    fn subscribe(&self, observer: Arc<dyn TaskObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }
}

impl std::fmt::Debug for WorkTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("WorkTask")
            .field("id", &self.id)
            .field("desc", &inner.desc)
            .field("state", &inner.state)
            .field("priority", &inner.priority)
            .finish_non_exhaustive()
    }
}
