//! Simulation plans for the `run` command
//!
//! A plan is a TOML file listing simulated tasks:
//!
//! ```toml
//! [[task]]
//! desc = "Copy photos"
//! priority = "high"
//! devices = ["disk1"]
//! steps = 20
//! step_ms = 50
//! ```
//!
//! Each entry becomes a [`WorkTask`] that advances its progress one step at a
//! time, sleeping `step_ms` between steps.

use crate::task::{Devices, TaskPriority, WorkOutcome, WorkTask};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan file '{path}' not found")]
    NotFound { path: PathBuf },

    #[error("IO error reading '{path}': {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Plan parsing error in '{path}': {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Plan '{path}' has no tasks")]
    Empty { path: PathBuf },
}

/// One simulated task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub desc: String,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Devices used by the task; none means memory-only work
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    #[serde(default = "default_autostart")]
    pub autostart: bool,
    /// Fail with an error once this step is reached
    #[serde(default)]
    pub fail_at: Option<u32>,
}

fn default_steps() -> u32 {
    10
}

fn default_step_ms() -> u64 {
    100
}

fn default_autostart() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    #[serde(default, rename = "task")]
    pub tasks: Vec<PlannedTask>,
}

impl TaskPlan {
    /// Load a plan from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PlanError> {
        let path = path.as_ref().to_path_buf();
        debug!("Loading plan: {:?}", path);

        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PlanError::NotFound { path: path.clone() },
            _ => PlanError::IoError {
                path: path.clone(),
                source: e,
            },
        })?;
        Self::parse(&content, &path)
    }

    /// Parse plan content; `source_path` is only used in errors
    pub fn parse(content: &str, source_path: &Path) -> Result<Self, PlanError> {
        let plan: TaskPlan = toml::from_str(content).map_err(|e| PlanError::ParseError {
            path: source_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if plan.tasks.is_empty() {
            return Err(PlanError::Empty {
                path: source_path.to_path_buf(),
            });
        }
        if let Some(task) = plan.tasks.iter().find(|t| t.steps == 0) {
            return Err(PlanError::ParseError {
                path: source_path.to_path_buf(),
                reason: format!("task '{}' must have at least one step", task.desc),
            });
        }

        debug!("Parsed {} planned task(s)", plan.tasks.len());
        Ok(plan)
    }
}

impl PlannedTask {
    /// Build the simulated task
    pub fn to_work_task(&self) -> Arc<WorkTask> {
        let steps = self.steps;
        let step_delay = Duration::from_millis(self.step_ms);
        let fail_at = self.fail_at;
        let mut step = 0;

        WorkTask::builder(self.desc.clone())
            .priority(self.priority)
            .devices(Devices::set(self.devices.iter().map(String::as_str)))
            .autostart(self.autostart)
            .build(move |ctx| {
                if fail_at == Some(step) {
                    return WorkOutcome::Failed(format!("simulated failure at step {}", step));
                }
                thread::sleep(step_delay);
                step += 1;
                ctx.set_progress(f64::from(step) / f64::from(steps));
                ctx.set_status(format!("step {}/{}", step, steps));
                if step >= steps {
                    WorkOutcome::Done
                } else {
                    WorkOutcome::Continue
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskState};

    #[test]
    fn test_defaults_are_applied() {
        let plan = TaskPlan::parse(
            "[[task]]\ndesc = \"scan\"\n",
            Path::new("plan.toml"),
        )
        .unwrap();

        let task = &plan.tasks[0];
        assert_eq!(task.priority, TaskPriority::Normal);
        assert!(task.devices.is_empty());
        assert_eq!(task.steps, 10);
        assert_eq!(task.step_ms, 100);
        assert!(task.autostart);
        assert_eq!(task.fail_at, None);
    }

    #[test]
    fn test_empty_plan_is_rejected() {
        let err = TaskPlan::parse("", Path::new("plan.toml")).unwrap_err();
        assert!(matches!(err, PlanError::Empty { .. }));
    }

    #[test]
    fn test_zero_steps_is_rejected() {
        let err = TaskPlan::parse(
            "[[task]]\ndesc = \"scan\"\nsteps = 0\n",
            Path::new("plan.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one step"));
    }

    #[test]
    fn test_unknown_priority_is_rejected() {
        let err = TaskPlan::parse(
            "[[task]]\ndesc = \"scan\"\npriority = \"urgent\"\n",
            Path::new("plan.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::ParseError { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = TaskPlan::from_file("/nonexistent/plan.toml").unwrap_err();
        assert!(matches!(err, PlanError::NotFound { .. }));
    }

    #[test]
    fn test_work_task_reflects_plan() {
        let planned = PlannedTask {
            desc: "copy".to_string(),
            priority: TaskPriority::High,
            devices: vec!["disk1".to_string(), "disk2".to_string()],
            steps: 3,
            step_ms: 0,
            autostart: false,
            fail_at: None,
        };

        let task = planned.to_work_task();
        assert_eq!(task.desc(), "copy");
        assert_eq!(task.priority(), TaskPriority::High);
        assert_eq!(task.devices(), Devices::set(["disk1", "disk2"]));
        assert_eq!(task.state(), TaskState::Stopped);
    }

    #[test]
    fn test_simulated_failure() {
        let planned = PlannedTask {
            desc: "flaky".to_string(),
            priority: TaskPriority::Normal,
            devices: Vec::new(),
            steps: 5,
            step_ms: 0,
            autostart: true,
            fail_at: Some(2),
        };

        let task = planned.to_work_task();
        task.run();
        assert_eq!(task.state(), TaskState::Failed);
        assert!(task.error().unwrap().contains("step 2"));
    }
}
