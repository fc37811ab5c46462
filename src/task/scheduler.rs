use crate::task::types::*;
use tracing::debug;

/// Scheduler-side view of one task, captured once per pass
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: TaskId,
    pub state: TaskState,
    pub priority: TaskPriority,
    pub devices: Devices,
    pub in_pool: bool,
    pub own_pause: bool,
}

impl Candidate {
    /// Paused by the scheduler, waiting to get its devices back
    pub fn is_on_hold(&self) -> bool {
        self.state == TaskState::Paused && self.own_pause
    }

    fn wants_to_run(&self) -> bool {
        self.state == TaskState::Waiting || self.state.is_active() || self.is_on_hold()
    }

    /// Running, winding down, or submitted and about to run
    fn may_use_devices(&self) -> bool {
        self.state.is_active() || (self.state == TaskState::Waiting && self.in_pool)
    }

    fn needs_submit(&self) -> bool {
        self.state == TaskState::Waiting && !self.in_pool
    }

    /// Whether this task takes precedence over `other` on a shared device:
    /// higher priority wins, and at equal priority running work stays put
    pub fn overrides(&self, other: &Candidate) -> bool {
        self.priority > other.priority
            || (self.priority == other.priority
                && self.state.is_active()
                && !other.state.is_active())
    }
}

/// Actions decided by one scheduling pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePlan {
    /// Hand to the execution pool
    pub submit: Vec<TaskId>,
    /// Pause and mark as on hold
    pub hold: Vec<TaskId>,
    /// Resume from on hold
    pub resume: Vec<TaskId>,
    /// No longer in the pool (stopped since submission)
    pub unpool: Vec<TaskId>,
    /// Device-bound tasks allowed to use their devices
    pub should_run: Vec<TaskId>,
    /// Tasks that lost their devices but may still use them: active ones
    /// that have not let go yet, and submitted ones that have not started
    pub releasing: Vec<TaskId>,
    /// First memory-only task seen
    pub no_device: Option<TaskId>,
}

impl SchedulePlan {
    /// Whether applying the plan changes anything
    pub fn is_idle(&self) -> bool {
        self.submit.is_empty()
            && self.hold.is_empty()
            && self.resume.is_empty()
            && self.unpool.is_empty()
    }
}

/// Decide which tasks may use their devices.
///
/// Candidates are visited in registration order and merged into a
/// should-run list: a task sharing a device with listed tasks replaces them
/// if it overrides all of them, and is left out otherwise. Earlier tasks win
/// ties. With chains of conflicts the outcome depends on registration order.
///
/// Running tasks left out are put on hold. Starting or resuming tasks only
/// happens on a pass where nothing had to be put on hold or is still
/// releasing its devices, so that a device is never used twice while the
/// previous owner winds down. A task already submitted to the pool counts as
/// releasing when it loses: its job may start it at any time, and the pass
/// after that puts it on hold.
pub fn plan_pass(candidates: &[Candidate]) -> SchedulePlan {
    let mut plan = SchedulePlan::default();
    let mut should_run: Vec<&Candidate> = Vec::new();
    let mut active: Vec<&Candidate> = Vec::new();

    for candidate in candidates {
        if candidate.state == TaskState::Stopped && candidate.in_pool {
            plan.unpool.push(candidate.id);
        }
        if !candidate.wants_to_run() {
            continue;
        }

        match &candidate.devices {
            Devices::None | Devices::Any => {
                if candidate.devices == Devices::None && plan.no_device.is_none() {
                    plan.no_device = Some(candidate.id);
                }
                if candidate.needs_submit() {
                    plan.submit.push(candidate.id);
                } else if candidate.is_on_hold() {
                    plan.resume.push(candidate.id);
                }
                continue;
            }
            Devices::Set(_) => {}
        }

        if candidate.may_use_devices() {
            active.push(candidate);
        }

        if let Some(blocker) = should_run
            .iter()
            .find(|other| other.devices.overlaps(&candidate.devices) && !candidate.overrides(other))
        {
            debug!(
                "Task {} blocked by task {} on shared devices",
                candidate.id, blocker.id
            );
            continue;
        }

        should_run.retain(|other| {
            let evicted = other.devices.overlaps(&candidate.devices);
            if evicted {
                debug!("Task {} overrides task {}", candidate.id, other.id);
            }
            !evicted
        });
        should_run.push(candidate);
    }

    for task in active {
        if should_run.iter().any(|other| other.id == task.id) {
            continue;
        }
        if task.state == TaskState::Running {
            plan.hold.push(task.id);
        } else {
            plan.releasing.push(task.id);
        }
    }

    if plan.hold.is_empty() && plan.releasing.is_empty() {
        for task in &should_run {
            if task.is_on_hold() {
                plan.resume.push(task.id);
            } else if task.needs_submit() {
                plan.submit.push(task.id);
            }
        }
    } else {
        debug!(
            "Deferring starts: {} task(s) to hold, {} releasing devices",
            plan.hold.len(),
            plan.releasing.len()
        );
    }

    plan.should_run = should_run.iter().map(|task| task.id).collect();
    plan
}

/// Trim starts and resumes to the worker slots left free.
///
/// A slot is taken by every task that runs or was submitted and has not
/// started yet. Paused tasks, on hold or not, leave their slot free, so a
/// preempting task can always start once the one it displaced is parked.
/// Resumes are served before new submissions.
pub fn limit_workers(plan: &mut SchedulePlan, candidates: &[Candidate], max_workers: usize) {
    let busy = candidates
        .iter()
        .filter(|candidate| candidate.may_use_devices())
        .count();
    let mut free = max_workers.saturating_sub(busy);
    let requested = plan.resume.len() + plan.submit.len();

    let mut take_slot = |_: &TaskId| {
        let granted = free > 0;
        free = free.saturating_sub(1);
        granted
    };
    plan.resume.retain(&mut take_slot);
    plan.submit.retain(&mut take_slot);

    let granted = plan.resume.len() + plan.submit.len();
    if granted < requested {
        debug!(
            "Worker limit {} reached: {} busy, {} start(s) postponed",
            max_workers,
            busy,
            requested - granted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn candidate(state: TaskState, priority: TaskPriority, devices: &[&str]) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            state,
            priority,
            devices: Devices::set(devices.iter().copied()),
            in_pool: false,
            own_pause: false,
        }
    }

    #[test]
    fn test_independent_devices_all_start() {
        let a = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk1"]);
        let b = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk2"]);
        let plan = plan_pass(&[a.clone(), b.clone()]);
        assert_eq!(plan.submit, vec![a.id, b.id]);
        assert!(plan.hold.is_empty());
    }

    #[test]
    fn test_earlier_task_wins_a_tie() {
        let a = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk1"]);
        let b = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk1"]);
        let plan = plan_pass(&[a.clone(), b.clone()]);
        assert_eq!(plan.submit, vec![a.id]);
        assert_eq!(plan.should_run, vec![a.id]);
    }

    #[test]
    fn test_running_task_is_not_preempted_at_equal_priority() {
        let waiting = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk1"]);
        let running = candidate(TaskState::Running, TaskPriority::Normal, &["disk1"]);
        let plan = plan_pass(&[waiting, running.clone()]);
        assert!(plan.submit.is_empty());
        assert!(plan.hold.is_empty());
        assert_eq!(plan.should_run, vec![running.id]);
    }

    #[test]
    fn test_higher_priority_puts_running_task_on_hold() {
        let running = candidate(TaskState::Running, TaskPriority::Low, &["disk1"]);
        let urgent = candidate(TaskState::Waiting, TaskPriority::High, &["disk1", "disk2"]);
        let plan = plan_pass(&[running.clone(), urgent.clone()]);
        assert_eq!(plan.hold, vec![running.id]);
        assert!(plan.submit.is_empty(), "starts wait for the next pass");
        assert_eq!(plan.should_run, vec![urgent.id]);
    }

    #[test]
    fn test_starts_wait_while_devices_are_released() {
        let pausing = candidate(TaskState::Pausing, TaskPriority::Low, &["disk1"]);
        let urgent = candidate(TaskState::Waiting, TaskPriority::High, &["disk1"]);
        let plan = plan_pass(&[pausing.clone(), urgent]);
        assert!(plan.hold.is_empty());
        assert_eq!(plan.releasing, vec![pausing.id]);
        assert!(plan.submit.is_empty());
    }

    #[test]
    fn test_on_hold_task_resumes_when_devices_free_up() {
        let mut held = candidate(TaskState::Paused, TaskPriority::Normal, &["disk1"]);
        held.own_pause = true;
        let done = candidate(TaskState::Done, TaskPriority::High, &["disk1"]);
        let plan = plan_pass(&[held.clone(), done]);
        assert_eq!(plan.resume, vec![held.id]);
    }

    #[test]
    fn test_user_paused_task_is_left_alone() {
        let paused = candidate(TaskState::Paused, TaskPriority::High, &["disk1"]);
        let waiting = candidate(TaskState::Waiting, TaskPriority::Low, &["disk1"]);
        let plan = plan_pass(&[paused, waiting.clone()]);
        assert!(plan.resume.is_empty());
        assert_eq!(plan.submit, vec![waiting.id]);
    }

    #[test]
    fn test_memory_only_and_wildcard_tasks_bypass_conflicts() {
        let busy = candidate(TaskState::Running, TaskPriority::High, &["disk1"]);
        let memory_a = candidate(TaskState::Waiting, TaskPriority::Low, &[]);
        let memory_b = candidate(TaskState::Waiting, TaskPriority::Low, &[]);
        let mut wildcard = candidate(TaskState::Waiting, TaskPriority::Low, &[]);
        wildcard.devices = Devices::Any;

        let plan = plan_pass(&[busy, memory_a.clone(), memory_b.clone(), wildcard.clone()]);
        assert_eq!(plan.submit, vec![memory_a.id, memory_b.id, wildcard.id]);
        assert_eq!(plan.no_device, Some(memory_a.id));
    }

    #[test]
    fn test_memory_only_tasks_start_even_when_others_are_held() {
        let running = candidate(TaskState::Running, TaskPriority::Low, &["disk1"]);
        let urgent = candidate(TaskState::Waiting, TaskPriority::High, &["disk1"]);
        let memory = candidate(TaskState::Waiting, TaskPriority::Low, &[]);
        let plan = plan_pass(&[running.clone(), urgent, memory.clone()]);
        assert_eq!(plan.hold, vec![running.id]);
        assert_eq!(plan.submit, vec![memory.id]);
    }

    #[test]
    fn test_already_pooled_task_is_not_resubmitted() {
        let mut waiting = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk1"]);
        waiting.in_pool = true;
        let plan = plan_pass(&[waiting.clone()]);
        assert!(plan.submit.is_empty());
        assert_eq!(plan.should_run, vec![waiting.id]);
        assert!(plan.is_idle());
    }

    #[test]
    fn test_submitted_loser_defers_the_winner() {
        let mut pooled = candidate(TaskState::Waiting, TaskPriority::Low, &["disk1"]);
        pooled.in_pool = true;
        let high = candidate(TaskState::Waiting, TaskPriority::High, &["disk1"]);
        let plan = plan_pass(&[pooled.clone(), high.clone()]);
        assert_eq!(plan.should_run, vec![high.id]);
        assert_eq!(plan.releasing, vec![pooled.id]);
        assert!(plan.submit.is_empty());
    }

    #[test]
    fn test_stopped_task_leaves_the_pool() {
        let mut stopped = candidate(TaskState::Stopped, TaskPriority::Normal, &["disk1"]);
        stopped.in_pool = true;
        let plan = plan_pass(&[stopped.clone()]);
        assert_eq!(plan.unpool, vec![stopped.id]);
        assert!(plan.should_run.is_empty());
    }

    #[test]
    fn test_task_overriding_only_some_conflicts_is_skipped() {
        let low = candidate(TaskState::Waiting, TaskPriority::Low, &["disk1"]);
        let high = candidate(TaskState::Waiting, TaskPriority::High, &["disk2"]);
        let normal = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk1", "disk2"]);
        let plan = plan_pass(&[low.clone(), high.clone(), normal]);
        assert_eq!(plan.should_run, vec![low.id, high.id]);
    }

    #[test]
    fn test_chain_conflicts_follow_registration_order() {
        // a-b share disk1, b-c share disk2; c is visited last and evicts b
        let a = candidate(TaskState::Waiting, TaskPriority::Low, &["disk1"]);
        let b = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk1", "disk2"]);
        let c = candidate(TaskState::Waiting, TaskPriority::High, &["disk2"]);
        let plan = plan_pass(&[a.clone(), b, c.clone()]);
        assert_eq!(plan.should_run, vec![c.id]);
        assert_eq!(plan.submit, vec![c.id]);

        // a is gone from the list once b evicted it, even though c freed disk1
        assert!(!plan.should_run.contains(&a.id));
    }

    #[test]
    fn test_pass_is_idempotent_once_converged() {
        let mut running = candidate(TaskState::Running, TaskPriority::High, &["disk1"]);
        running.in_pool = true;
        let mut held = candidate(TaskState::Paused, TaskPriority::Low, &["disk1"]);
        held.own_pause = true;
        let waiting = candidate(TaskState::Waiting, TaskPriority::Low, &["disk1"]);

        let candidates = [held, running, waiting];
        assert!(plan_pass(&candidates).is_idle());
        assert!(plan_pass(&candidates).is_idle());
    }

    #[test]
    fn test_worker_limit_postpones_extra_starts() {
        let mut running = candidate(TaskState::Running, TaskPriority::Normal, &["disk1"]);
        running.in_pool = true;
        let a = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk2"]);
        let b = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk3"]);
        let candidates = [running, a.clone(), b];

        let mut plan = plan_pass(&candidates);
        limit_workers(&mut plan, &candidates, 2);
        assert_eq!(plan.submit, vec![a.id]);
    }

    #[test]
    fn test_worker_limit_counts_pooled_tasks_not_yet_started() {
        let mut pooled = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk1"]);
        pooled.in_pool = true;
        let waiting = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk2"]);
        let candidates = [pooled, waiting];

        let mut plan = plan_pass(&candidates);
        limit_workers(&mut plan, &candidates, 1);
        assert!(plan.submit.is_empty());
    }

    #[test]
    fn test_parked_task_frees_its_worker_for_the_winner() {
        // The low priority task was displaced and is parked on hold
        let mut held = candidate(TaskState::Paused, TaskPriority::Low, &["disk1"]);
        held.own_pause = true;
        held.in_pool = true;
        let high = candidate(TaskState::Waiting, TaskPriority::High, &["disk1"]);
        let candidates = [held, high.clone()];

        let mut plan = plan_pass(&candidates);
        limit_workers(&mut plan, &candidates, 1);
        assert_eq!(plan.submit, vec![high.id]);
    }

    #[test]
    fn test_worker_limit_serves_resumes_first() {
        let mut held = candidate(TaskState::Paused, TaskPriority::Normal, &["disk1"]);
        held.own_pause = true;
        let waiting = candidate(TaskState::Waiting, TaskPriority::Normal, &["disk2"]);
        let candidates = [waiting, held.clone()];

        let mut plan = plan_pass(&candidates);
        assert_eq!(plan.resume.len() + plan.submit.len(), 2);
        limit_workers(&mut plan, &candidates, 1);
        assert_eq!(plan.resume, vec![held.id]);
        assert!(plan.submit.is_empty());
    }
}
