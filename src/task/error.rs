use crate::task::types::{TaskId, TaskStatus, TaskVisibility};

/// Errors returned by the task manager's public API
#[derive(Debug, thiserror::Error)]
pub enum TaskManagerError {
    /// Only public tasks can be registered
    #[error("Cannot add task {task}: visibility is {visibility}, only public tasks are managed")]
    InvalidTaskVisibility {
        task: TaskId,
        visibility: TaskVisibility,
    },

    #[error("Task {task} is already registered")]
    DuplicateTask { task: TaskId },

    /// Requested transition is incompatible with the current status
    #[error("Cannot change state of task {task} to '{requested}': incompatible current state '{current}'")]
    InvalidStateTransition {
        task: TaskId,
        current: TaskStatus,
        requested: TaskStatus,
    },

    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    /// Requested operation has no handler, e.g. asking for a state only the
    /// task or the scheduler can reach
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Bulk operation where some items failed
    #[error("{}", format_failures(.0))]
    AggregateFailure(Vec<TaskManagerError>),
}

fn format_failures(errors: &[TaskManagerError]) -> String {
    let mut message = format!("{} operation(s) failed:", errors.len());
    for error in errors {
        message.push_str("\n- ");
        message.push_str(&error.to_string());
    }
    message
}

impl TaskManagerError {
    /// Collapse a list of failures into one error, if there is any
    pub fn aggregate(errors: Vec<TaskManagerError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(TaskManagerError::AggregateFailure(errors))
        }
    }
}

pub type Result<T> = std::result::Result<T, TaskManagerError>;
