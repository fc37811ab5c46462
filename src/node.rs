//! Bridge between the task manager and the node tree shown by the UI.
//!
//! Each registered task is exposed as a child node of a "task manager" root
//! node. The manager pushes property updates as tasks change; the bridge
//! decides what to do with them (typically updating a materialized node, or
//! ignoring updates for nodes nobody looks at).

use crate::task::types::{TaskId, TaskSnapshot, TaskStatus};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// New value of a node property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    State(TaskStatus),
    Progress(Option<f64>),
    Pulse(u64),
    Status(Option<String>),
    Desc(String),
}

impl PropertyValue {
    /// Property name on the node
    pub fn name(&self) -> &'static str {
        match self {
            PropertyValue::State(_) => "state",
            PropertyValue::Progress(_) => "progress",
            PropertyValue::Pulse(_) => "pulse",
            PropertyValue::Status(_) => "status",
            PropertyValue::Desc(_) => "desc",
        }
    }
}

/// Receiver of task updates for the node tree
pub trait NodeBridge: Send + Sync {
    /// Whether the root node currently exists; no child events are sent
    /// otherwise
    fn is_root_materialized(&self) -> bool;

    /// A task was added under the root node
    fn new_child(&self, task: &TaskSnapshot) -> Result<()>;

    /// A property of the task's node changed
    fn set_property(&self, task: TaskId, value: PropertyValue) -> Result<()>;
}
