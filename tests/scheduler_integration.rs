use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use taskdeck::{
    DeviceId, Devices, PoolExecutor, Task, TaskId, TaskManager, TaskManagerConfig, TaskPriority,
    TaskState, TaskStatus, WorkOutcome, WorkTask,
};

const TIMEOUT: Duration = Duration::from_secs(20);

/// Records which task holds each device while it executes a step
#[derive(Default)]
struct DeviceMonitor {
    holders: Mutex<HashMap<DeviceId, TaskId>>,
    violations: AtomicUsize,
}

impl DeviceMonitor {
    fn enter(&self, task: TaskId, devices: &[DeviceId]) {
        let mut holders = self.holders.lock().unwrap();
        for device in devices {
            if let Some(other) = holders.insert(device.clone(), task) {
                if other != task {
                    self.violations.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    fn leave(&self, devices: &[DeviceId]) {
        let mut holders = self.holders.lock().unwrap();
        for device in devices {
            holders.remove(device);
        }
    }
}

fn monitored_task(
    monitor: &Arc<DeviceMonitor>,
    desc: &str,
    priority: TaskPriority,
    devices: &[&str],
    steps: u32,
) -> Arc<WorkTask> {
    let monitor = Arc::clone(monitor);
    let claimed: Vec<DeviceId> = devices.iter().map(|d| DeviceId::new(*d)).collect();
    let mut step = 0;
    WorkTask::builder(desc)
        .priority(priority)
        .devices(Devices::set(devices.iter().copied()))
        .build(move |ctx| {
            monitor.enter(ctx.task_id(), &claimed);
            thread::sleep(Duration::from_millis(3));
            monitor.leave(&claimed);
            step += 1;
            ctx.set_progress(f64::from(step) / f64::from(steps));
            if step >= steps {
                WorkOutcome::Done
            } else {
                WorkOutcome::Continue
            }
        })
}

fn endless_task(desc: &str, devices: &[&str]) -> Arc<WorkTask> {
    WorkTask::builder(desc)
        .devices(Devices::set(devices.iter().copied()))
        .build(|ctx| {
            thread::sleep(Duration::from_millis(2));
            ctx.pulse();
            WorkOutcome::Continue
        })
}

fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

fn create_manager(config: TaskManagerConfig) -> TaskManager {
    let executor = PoolExecutor::tokio().expect("tokio runtime available");
    TaskManager::new(config, executor)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_devices_are_never_shared() {
    let manager = create_manager(TaskManagerConfig::default());
    let monitor = Arc::new(DeviceMonitor::default());

    let tasks = vec![
        monitored_task(&monitor, "a", TaskPriority::Low, &["disk1"], 8),
        monitored_task(&monitor, "b", TaskPriority::Normal, &["disk1", "disk2"], 5),
        monitored_task(&monitor, "c", TaskPriority::High, &["disk2"], 5),
        monitored_task(&monitor, "d", TaskPriority::Normal, &["disk3"], 5),
        monitored_task(&monitor, "e", TaskPriority::High, &["disk1", "disk3"], 5),
        monitored_task(&monitor, "f", TaskPriority::Low, &[], 5),
    ];
    for task in &tasks {
        manager.add_task(task.clone()).unwrap();
    }

    for task in &tasks {
        assert_eq!(task.wait_finished(TIMEOUT), TaskState::Done, "{:?}", task);
    }
    assert_eq!(monitor.violations.load(Ordering::SeqCst), 0);

    let counts = manager.counts();
    assert_eq!(counts.done, tasks.len());
    assert_eq!(counts.active(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_high_priority_task_preempts_running_one() {
    let manager = create_manager(TaskManagerConfig::default());
    let monitor = Arc::new(DeviceMonitor::default());

    let low = monitored_task(&monitor, "low", TaskPriority::Low, &["disk1"], 60);
    manager.add_task(low.clone()).unwrap();
    wait_for("low priority task to start", || {
        low.state() == TaskState::Running
    });

    let high = monitored_task(&monitor, "high", TaskPriority::High, &["disk1"], 3);
    manager.add_task(high.clone()).unwrap();

    wait_for("low priority task to be put on hold", || {
        manager.status_of(low.id()).unwrap() == TaskStatus::OnHold || high.state().is_terminal()
    });

    assert_eq!(high.wait_finished(TIMEOUT), TaskState::Done);
    assert_eq!(low.wait_finished(TIMEOUT), TaskState::Done);
    assert!(high.finished_at().unwrap() < low.finished_at().unwrap());
    assert_eq!(monitor.violations.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_user_pause_is_respected() {
    let manager = create_manager(TaskManagerConfig::default());
    let task = endless_task("endless", &["disk1"]);
    let task_id = manager.add_task(task.clone()).unwrap();
    wait_for("task to start", || task.state() == TaskState::Running);

    manager.request_state(task_id, TaskStatus::Paused).unwrap();
    wait_for("task to pause", || task.state() == TaskState::Paused);

    // Extra passes never resume a task the user paused
    manager.schedule_refresh();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(manager.status_of(task_id).unwrap(), TaskStatus::Paused);

    manager.request_state(task_id, TaskStatus::Running).unwrap();
    wait_for("task to resume", || task.state() == TaskState::Running);

    manager.cancel(task_id).unwrap();
    assert_eq!(task.wait_finished(TIMEOUT), TaskState::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_all_stops_everything() {
    let manager = create_manager(TaskManagerConfig::default());
    let running = endless_task("running", &["disk1"]);
    let queued = endless_task("queued", &["disk1"]);
    let stopped = WorkTask::builder("stopped")
        .autostart(false)
        .build(|_| WorkOutcome::Done);
    for task in [&running, &queued, &stopped] {
        manager.add_task(Arc::clone(task) as Arc<dyn Task>).unwrap();
    }
    wait_for("first task to start", || running.state() == TaskState::Running);

    assert_eq!(manager.cancel_all(), 3);
    for task in [&running, &queued, &stopped] {
        assert_eq!(task.wait_finished(TIMEOUT), TaskState::Cancelled);
    }
    assert_eq!(manager.counts().cancelled, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_limit_caps_running_tasks() {
    let config = TaskManagerConfig {
        max_workers: Some(1),
        ..Default::default()
    };
    let manager = create_manager(config);
    let concurrent = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..3)
        .map(|i| {
            let concurrent = Arc::clone(&concurrent);
            let peak = Arc::clone(&peak);
            let mut steps = 0;
            WorkTask::builder(format!("memory-only {}", i)).build(move |_| {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(3));
                concurrent.fetch_sub(1, Ordering::SeqCst);
                steps += 1;
                if steps == 3 {
                    WorkOutcome::Done
                } else {
                    WorkOutcome::Continue
                }
            })
        })
        .collect();
    for task in &tasks {
        manager.add_task(task.clone()).unwrap();
    }

    for task in &tasks {
        assert_eq!(task.wait_finished(TIMEOUT), TaskState::Done);
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_limit_allows_preemption() {
    let config = TaskManagerConfig {
        max_workers: Some(1),
        ..Default::default()
    };
    let manager = create_manager(config);
    let monitor = Arc::new(DeviceMonitor::default());

    let low = monitored_task(&monitor, "low", TaskPriority::Low, &["disk1"], 40);
    manager.add_task(low.clone()).unwrap();
    wait_for("low priority task to start", || {
        low.state() == TaskState::Running
    });

    // The only worker slot is taken until the low task is parked on hold
    let high = monitored_task(&monitor, "high", TaskPriority::High, &["disk1"], 3);
    manager.add_task(high.clone()).unwrap();

    assert_eq!(high.wait_finished(Duration::from_secs(5)), TaskState::Done);
    assert_eq!(low.wait_finished(TIMEOUT), TaskState::Done);
    assert!(high.finished_at().unwrap() < low.finished_at().unwrap());
    assert_eq!(monitor.violations.load(Ordering::SeqCst), 0);
}
