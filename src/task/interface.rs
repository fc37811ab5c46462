use crate::task::types::*;
use std::sync::Arc;

/// Receives change notifications from a task
pub trait TaskObserver: Send + Sync {
    fn on_change(&self, task: TaskId, field: TaskField);
}

/// A unit of work the task manager can schedule.
///
/// Implementations own their state machine. The manager only reads the
/// observable fields, asks for transitions through the control methods, and
/// runs [`Task::run`] on a worker of the execution pool when the task is
/// allowed to start. Control methods return `false` when the task's current
/// state does not allow the transition.
///
/// Observers must be notified without holding any internal lock of the task,
/// since they may call back into its getters.
pub trait Task: Send + Sync {
    fn id(&self) -> TaskId;

    fn visibility(&self) -> TaskVisibility {
        TaskVisibility::Public
    }

    fn state(&self) -> TaskState;

    fn priority(&self) -> TaskPriority;

    fn devices(&self) -> Devices;

    /// Human readable description
    fn desc(&self) -> String;

    /// Free-form status text reported by the running work
    fn status(&self) -> Option<String> {
        None
    }

    /// Completion ratio in `0.0..=1.0`, when the work can tell
    fn progress(&self) -> Option<f64> {
        None
    }

    /// Activity counter for work that cannot report progress
    fn pulse(&self) -> u64 {
        0
    }

    /// Execute the task on the calling thread. Returns immediately when the
    /// task is not waiting to run.
    fn run(&self);

    fn pause(&self) -> bool;

    fn resume(&self) -> bool;

    fn cancel(&self) -> bool;

    /// Toggle between stopped (`false`) and waiting (`true`)
    fn set_autostart(&self, autostart: bool) -> bool;

    fn subscribe(&self, observer: Arc<dyn TaskObserver>);
}
