use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for tasks
pub type TaskId = Uuid;

/// Opaque identifier of a resource a task uses exclusively (e.g. a disk)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of a task
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Not started, and will not start until asked to
    Stopped,
    /// Ready to run as soon as the scheduler allows it
    Waiting,
    Running,
    /// Pause requested, the task has not reached a pause point yet
    Pausing,
    Paused,
    /// Cancellation requested, the task has not acknowledged it yet
    Cancelling,
    Cancelled,
    Failed,
    Done,
}

impl TaskState {
    /// Terminal states accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Cancelled | TaskState::Failed | TaskState::Done)
    }

    /// Running, or on its way out of running
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskState::Running | TaskState::Pausing | TaskState::Cancelling
        )
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            TaskState::Stopped
                | TaskState::Waiting
                | TaskState::Running
                | TaskState::Pausing
                | TaskState::Paused
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Stopped => "stopped",
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Pausing => "pausing",
            TaskState::Paused => "paused",
            TaskState::Cancelling => "cancelling",
            TaskState::Cancelled => "cancelled",
            TaskState::Failed => "failed",
            TaskState::Done => "done",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Externally visible status: the task state, with scheduler-initiated
/// pauses reported as `OnHold` instead of `Paused`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Stopped,
    Waiting,
    Running,
    Pausing,
    Paused,
    OnHold,
    Cancelling,
    Cancelled,
    Failed,
    Done,
}

impl TaskStatus {
    pub fn from_state(state: TaskState, own_pause: bool) -> Self {
        match state {
            TaskState::Stopped => TaskStatus::Stopped,
            TaskState::Waiting => TaskStatus::Waiting,
            TaskState::Running => TaskStatus::Running,
            TaskState::Pausing => TaskStatus::Pausing,
            TaskState::Paused if own_pause => TaskStatus::OnHold,
            TaskState::Paused => TaskStatus::Paused,
            TaskState::Cancelling => TaskStatus::Cancelling,
            TaskState::Cancelled => TaskStatus::Cancelled,
            TaskState::Failed => TaskStatus::Failed,
            TaskState::Done => TaskStatus::Done,
        }
    }

    /// Stopped, paused or on hold: switching "on" applies
    pub fn is_off(&self) -> bool {
        matches!(
            self,
            TaskStatus::Stopped | TaskStatus::Paused | TaskStatus::OnHold
        )
    }

    /// Running, on hold or waiting: switching "off" applies
    pub fn is_on(&self) -> bool {
        matches!(
            self,
            TaskStatus::Running | TaskStatus::OnHold | TaskStatus::Waiting
        )
    }

    /// Targets a caller may ask for; the rest are reached by the task itself
    /// or by the scheduler
    pub fn is_requestable(&self) -> bool {
        matches!(
            self,
            TaskStatus::Running
                | TaskStatus::Paused
                | TaskStatus::Stopped
                | TaskStatus::Waiting
                | TaskStatus::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Stopped => "stopped",
            TaskStatus::Waiting => "waiting",
            TaskStatus::Running => "running",
            TaskStatus::Pausing => "pausing",
            TaskStatus::Paused => "paused",
            TaskStatus::OnHold => "on hold",
            TaskStatus::Cancelling => "cancelling",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Failed => "failed",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Task priority; higher priority wins device conflicts
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
}

impl TaskPriority {
    /// Get numeric value for comparisons
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
        };
        f.write_str(label)
    }
}

/// Whether a task is meant to be shown to (and controlled by) the user
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskVisibility {
    #[default]
    Public,
    Internal,
}

impl fmt::Display for TaskVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskVisibility::Public => f.write_str("public"),
            TaskVisibility::Internal => f.write_str("internal"),
        }
    }
}

/// The resources a task claims while it runs
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Devices {
    /// Memory-only work, never conflicts with anything
    #[default]
    None,
    /// May always run immediately, whatever else is running
    Any,
    /// Exclusive use of every listed device
    Set(BTreeSet<DeviceId>),
}

impl Devices {
    /// Build a device set; an empty list means memory-only work
    pub fn set<I, D>(devices: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DeviceId>,
    {
        let set: BTreeSet<DeviceId> = devices.into_iter().map(Into::into).collect();
        if set.is_empty() {
            Devices::None
        } else {
            Devices::Set(set)
        }
    }

    /// Whether two claims share at least one concrete device
    pub fn overlaps(&self, other: &Devices) -> bool {
        match (self, other) {
            (Devices::Set(a), Devices::Set(b)) => !a.is_disjoint(b),
            _ => false,
        }
    }
}

/// Observable fields of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskField {
    State,
    Priority,
    Devices,
    Progress,
    Pulse,
    Status,
    Desc,
}

impl TaskField {
    /// Changes that may alter which tasks should be running
    pub fn affects_scheduling(&self) -> bool {
        matches!(
            self,
            TaskField::State | TaskField::Priority | TaskField::Devices
        )
    }

    /// Changes mirrored onto the task's node
    pub fn is_node_property(&self) -> bool {
        matches!(
            self,
            TaskField::State
                | TaskField::Progress
                | TaskField::Pulse
                | TaskField::Status
                | TaskField::Desc
        )
    }
}

/// Point-in-time view of a registered task
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub desc: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub devices: Devices,
    pub progress: Option<f64>,
    pub status_text: Option<String>,
    pub in_pool: bool,
    pub added_at: chrono::DateTime<chrono::Utc>,
}

/// Number of tasks per state family, as shown on the status line
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    /// Stopped and waiting tasks
    pub waiting: usize,
    /// Running, pausing and cancelling tasks
    pub running: usize,
    /// Paused tasks, on hold included
    pub paused: usize,
    pub done: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn record(&mut self, state: TaskState) {
        self.total += 1;
        match state {
            TaskState::Stopped | TaskState::Waiting => self.waiting += 1,
            TaskState::Running | TaskState::Pausing | TaskState::Cancelling => self.running += 1,
            TaskState::Paused => self.paused += 1,
            TaskState::Done => self.done += 1,
            TaskState::Cancelled => self.cancelled += 1,
            TaskState::Failed => self.failed += 1,
        }
    }

    /// Tasks that still have work ahead of them
    pub fn active(&self) -> usize {
        self.waiting + self.paused + self.running
    }
}

impl FromIterator<TaskState> for TaskCounts {
    fn from_iter<I: IntoIterator<Item = TaskState>>(iter: I) -> Self {
        let mut counts = TaskCounts::default();
        for state in iter {
            counts.record(state);
        }
        counts
    }
}
