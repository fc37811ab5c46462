use crate::executor::{JobKind, PoolExecutor};
use crate::node::{NodeBridge, PropertyValue};
use crate::task::config::TaskManagerConfig;
use crate::task::error::{Result, TaskManagerError};
use crate::task::interface::{Task, TaskObserver};
use crate::task::lock::{LockState, TaskLock};
use crate::task::record::{Registry, TaskRecord};
use crate::task::scheduler::{Candidate, SchedulePlan, limit_workers, plan_pass};
use crate::task::status::render_status_line;
use crate::task::types::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Central task management system.
///
/// Cheap to clone; clones share the same registry. Every mutation queues a
/// scheduling pass on the execution pool, and passes requested while one is
/// already pending are merged into it.
#[derive(Clone)]
pub struct TaskManager {
    shared: Arc<Shared>,
}

struct Shared {
    this: Weak<Shared>,
    registry: TaskLock<Registry>,
    executor: PoolExecutor,
    bridge: Option<Arc<dyn NodeBridge>>,
    config: TaskManagerConfig,
    passes: AtomicU64,
}

/// Forwards a task's change notifications to the manager
struct RecordObserver {
    record: Weak<TaskRecord>,
    shared: Weak<Shared>,
}

impl TaskObserver for RecordObserver {
    fn on_change(&self, task: TaskId, field: TaskField) {
        let (Some(record), Some(shared)) = (self.record.upgrade(), self.shared.upgrade()) else {
            return;
        };
        if field.is_node_property() {
            shared.push_property(&record, field);
        }
        if field.affects_scheduling() {
            debug!("Task {} changed {:?}, scheduling a pass", task, field);
            shared.schedule_refresh();
        }
    }
}

impl TaskManager {
    /// Create a new task manager
    pub fn new(config: TaskManagerConfig, executor: PoolExecutor) -> Self {
        Self::build(config, executor, None)
    }

    /// Create a task manager mirroring its tasks onto a node tree
    pub fn with_bridge(
        config: TaskManagerConfig,
        executor: PoolExecutor,
        bridge: Arc<dyn NodeBridge>,
    ) -> Self {
        Self::build(config, executor, Some(bridge))
    }

    fn build(
        config: TaskManagerConfig,
        executor: PoolExecutor,
        bridge: Option<Arc<dyn NodeBridge>>,
    ) -> Self {
        debug!(
            "Creating task manager on {} executor",
            executor.executor_type()
        );
        if let Err(e) = config.validate() {
            warn!("{}, running one task at a time", e);
        }
        let shared = Arc::new_cyclic(|this| Shared {
            this: this.clone(),
            registry: TaskLock::new(Registry::new()),
            executor,
            bridge,
            config,
            passes: AtomicU64::new(0),
        });
        Self { shared }
    }

    pub fn config(&self) -> &TaskManagerConfig {
        &self.shared.config
    }

    /// Register a task and schedule it.
    ///
    /// # Errors
    ///
    /// Fails if the task is not public or is already registered.
    pub fn add_task(&self, task: Arc<dyn Task>) -> Result<TaskId> {
        let task_id = task.id();
        let visibility = task.visibility();
        if visibility != TaskVisibility::Public {
            return Err(TaskManagerError::InvalidTaskVisibility {
                task: task_id,
                visibility,
            });
        }

        let record = Arc::new(TaskRecord::new(Arc::clone(&task)));
        {
            let mut registry = self.shared.registry.write();
            if !registry.insert(Arc::clone(&record)) {
                return Err(TaskManagerError::DuplicateTask { task: task_id });
            }
        }

        task.subscribe(Arc::new(RecordObserver {
            record: Arc::downgrade(&record),
            shared: Arc::downgrade(&self.shared),
        }));
        info!("Added task {}: {}", task_id, task.desc());
        self.shared.schedule_refresh();

        if let Some(bridge) = &self.shared.bridge {
            if bridge.is_root_materialized() {
                if let Err(e) = bridge.new_child(&record.snapshot()) {
                    error!("Node bridge error: {}", e);
                }
            }
        }

        Ok(task_id)
    }

    /// Ask for a task to move to another status.
    ///
    /// Supported targets are `Running`, `Paused`, `Stopped`, `Waiting` and
    /// `Cancelled`; what is allowed depends on the current status.
    ///
    /// # Errors
    ///
    /// `NotSupported` for any other target, `InvalidStateTransition` when the
    /// target cannot be reached from the current status.
    pub fn request_state(&self, task_id: TaskId, requested: TaskStatus) -> Result<()> {
        {
            let registry = self.shared.registry.read();
            let record = registry
                .get(task_id)
                .ok_or(TaskManagerError::TaskNotFound(task_id))?;
            self.shared.apply_request(record, requested)?;
        }
        self.shared.schedule_refresh();
        Ok(())
    }

    /// Switch several tasks on (`Running`) or off (`Paused`/`Stopped`).
    ///
    /// Tasks already in the requested condition are left untouched. Unless
    /// `fail_fast` is set, every task is tried and failures are reported
    /// together.
    pub fn switch_tasks(&self, task_ids: &[TaskId], switch_on: bool, fail_fast: bool) -> Result<()> {
        let mut errors = Vec::new();

        for &task_id in task_ids {
            let result = self.status_of(task_id).and_then(|status| {
                match switch_target(status, switch_on) {
                    Some(target) => self.request_state(task_id, target),
                    None => Ok(()),
                }
            });
            if let Err(e) = result {
                if fail_fast {
                    return Err(e);
                }
                errors.push(e);
            }
        }

        match TaskManagerError::aggregate(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Cancel a task
    pub fn cancel(&self, task_id: TaskId) -> Result<()> {
        self.request_state(task_id, TaskStatus::Cancelled)
    }

    /// Cancel every task that is not finished yet; returns how many were
    /// asked to cancel
    pub fn cancel_all(&self) -> usize {
        let cancelled = {
            let registry = self.shared.registry.read();
            registry
                .iter()
                .filter(|record| record.task().state().is_cancellable())
                .filter(|record| record.task().cancel())
                .count()
        };
        info!("Cancelled {} task(s)", cancelled);
        self.shared.schedule_refresh();
        cancelled
    }

    /// Get a task by ID
    pub fn task(&self, task_id: TaskId) -> Result<Arc<dyn Task>> {
        let registry = self.shared.registry.read();
        registry
            .get(task_id)
            .map(|record| Arc::clone(record.task()))
            .ok_or(TaskManagerError::TaskNotFound(task_id))
    }

    /// Visible status of a task
    pub fn status_of(&self, task_id: TaskId) -> Result<TaskStatus> {
        let registry = self.shared.registry.read();
        registry
            .get(task_id)
            .map(|record| record.status())
            .ok_or(TaskManagerError::TaskNotFound(task_id))
    }

    /// Snapshots of every task, in registration order
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        let registry = self.shared.registry.read();
        registry.iter().map(|record| record.snapshot()).collect()
    }

    pub fn counts(&self) -> TaskCounts {
        let registry = self.shared.registry.read();
        registry.iter().map(|record| record.task().state()).collect()
    }

    /// Status line rendered with the configured format; `None` hides it
    pub fn status_line(&self) -> Option<String> {
        render_status_line(&self.shared.config.status_format, &self.counts())
    }

    pub fn len(&self) -> usize {
        self.shared.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a scheduling pass on the calling thread. Returns `None` when
    /// another pass is already pending, in which case that one covers it.
    pub fn refresh(&self) -> Option<SchedulePlan> {
        self.shared.refresh()
    }

    /// Queue a scheduling pass on the execution pool
    pub fn schedule_refresh(&self) {
        self.shared.schedule_refresh();
    }

    /// Number of scheduling passes run so far
    pub fn passes(&self) -> u64 {
        self.shared.passes.load(Ordering::Acquire)
    }

    pub fn lock_state(&self) -> LockState {
        self.shared.registry.state()
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("executor", &self.shared.executor)
            .field("config", &self.shared.config)
            .field("passes", &self.passes())
            .finish_non_exhaustive()
    }
}

/// Where a bulk switch sends a task, if anywhere
fn switch_target(status: TaskStatus, switch_on: bool) -> Option<TaskStatus> {
    if switch_on {
        status.is_off().then_some(TaskStatus::Running)
    } else if status == TaskStatus::Waiting {
        Some(TaskStatus::Stopped)
    } else if status.is_on() {
        Some(TaskStatus::Paused)
    } else {
        None
    }
}

impl Shared {
    fn apply_request(&self, record: &TaskRecord, requested: TaskStatus) -> Result<()> {
        use TaskStatus::*;

        if !requested.is_requestable() {
            return Err(TaskManagerError::NotSupported(format!(
                "requesting state '{}'",
                requested
            )));
        }

        let current = record.status();
        let task = record.task();
        let done = match (current, requested) {
            (Running | OnHold | Waiting, Running)
            | (Waiting, Waiting)
            | (Stopped, Stopped)
            | (Paused, Paused)
            | (Cancelling, Cancelled) => true,
            (Running, Paused) => task.pause(),
            (Paused, Running) => {
                // Hand the task back to the scheduler, it resumes when its
                // devices are free
                self.set_own_pause(record, true);
                true
            }
            (OnHold | Pausing, Paused) => {
                // A hold in flight lands as a user pause
                self.set_own_pause(record, false);
                true
            }
            (Stopped, Running | Waiting) => task.set_autostart(true),
            (Waiting, Paused | Stopped) => task.set_autostart(false),
            (Running | Pausing | Paused | OnHold | Stopped | Waiting, Cancelled) => task.cancel(),
            _ => false,
        };

        if done {
            debug!(
                "Task {}: requested '{}' while '{}'",
                record.id(),
                requested,
                current
            );
            Ok(())
        } else {
            Err(TaskManagerError::InvalidStateTransition {
                task: record.id(),
                current,
                requested,
            })
        }
    }

    fn set_own_pause(&self, record: &TaskRecord, own_pause: bool) {
        if record.own_pause() != own_pause {
            record.set_own_pause(own_pause);
            self.push_property(record, TaskField::State);
        }
    }

    fn schedule_refresh(&self) {
        let this = self.this.clone();
        self.executor.execute(
            JobKind::Refresh,
            Box::new(move || {
                if let Some(shared) = this.upgrade() {
                    shared.refresh();
                }
            }),
        );
    }

    fn refresh(&self) -> Option<SchedulePlan> {
        let Some(registry) = self.registry.try_refresh() else {
            debug!("Scheduling pass already pending");
            return None;
        };

        let candidates: Vec<Candidate> = registry.iter().map(|record| record.candidate()).collect();
        let mut plan = plan_pass(&candidates);
        if let Some(max_workers) = self.config.max_workers {
            limit_workers(&mut plan, &candidates, max_workers.max(1));
        }
        if let Some(task_id) = plan.no_device {
            debug!("Memory-only work represented by task {}", task_id);
        }

        for &task_id in &plan.unpool {
            if let Some(record) = registry.get(task_id) {
                record.set_in_pool(false);
            }
        }

        for &task_id in &plan.hold {
            let Some(record) = registry.get(task_id) else {
                continue;
            };
            record.set_own_pause(true);
            if record.task().pause() {
                debug!("Put task {} on hold", task_id);
            } else {
                record.set_own_pause(false);
                warn!("Could not put task {} on hold", task_id);
            }
        }

        for &task_id in &plan.resume {
            let Some(record) = registry.get(task_id) else {
                continue;
            };
            if record.task().resume() {
                record.set_own_pause(false);
                debug!("Resumed task {}", task_id);
            } else {
                warn!("Could not resume task {}", task_id);
            }
        }

        for &task_id in &plan.submit {
            let Some(record) = registry.get(task_id) else {
                continue;
            };
            record.set_in_pool(true);
            let record = Arc::clone(record);
            debug!("Submitting task {} to the pool", task_id);
            self.executor.execute(
                JobKind::Task,
                Box::new(move || {
                    // Stopped and unpooled since submission
                    if record.in_pool() {
                        record.task().run();
                    } else {
                        debug!("Task {} left the pool before it started", record.id());
                    }
                }),
            );
        }

        let pass = self.passes.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(
            "Scheduling pass {} done: {} running slot(s), {} submitted, {} held, {} resumed",
            pass,
            plan.should_run.len(),
            plan.submit.len(),
            plan.hold.len(),
            plan.resume.len()
        );
        Some(plan)
    }

    fn push_property(&self, record: &TaskRecord, field: TaskField) {
        let Some(bridge) = &self.bridge else {
            return;
        };
        let task = record.task();
        let value = match field {
            TaskField::State => PropertyValue::State(record.status()),
            TaskField::Progress => PropertyValue::Progress(task.progress()),
            TaskField::Pulse => PropertyValue::Pulse(task.pulse()),
            TaskField::Status => PropertyValue::Status(task.status()),
            TaskField::Desc => PropertyValue::Desc(task.desc()),
            TaskField::Priority | TaskField::Devices => return,
        };
        if let Err(e) = bridge.set_property(record.id(), value) {
            error!("Node bridge error: {}", e);
        }
    }
}
