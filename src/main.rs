use anyhow::{Context, Result};
use std::time::Duration;
use taskdeck::cli::{Args, ConfigDiscovery, ExecutionMode, RunConfig, TaskPlan, load_config};
use taskdeck::env::{DEFAULT_LOG_FILTER, LOG_ENV_VAR};
use taskdeck::{PoolExecutor, TaskManager, TaskSnapshot, TaskStatus};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for the status lines
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match mode {
        ExecutionMode::Run(config) => run_plan(config).await,
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::create_local_config()?;
            println!("Configuration written to {:?}", path);
            Ok(())
        }
    }
}

async fn run_plan(config: RunConfig) -> Result<()> {
    let manager_config = load_config(config.config_override.as_ref())?;
    let plan = TaskPlan::from_file(&config.plan)?;
    info!(
        "Running plan {:?} with {} task(s)",
        config.plan,
        plan.tasks.len()
    );

    let executor = PoolExecutor::tokio().context("Failed to create execution pool")?;
    let manager = TaskManager::new(manager_config, executor);

    for planned in &plan.tasks {
        let task_id = manager.add_task(planned.to_work_task())?;
        if config.verbose {
            println!(
                "Added {} '{}' (priority {}, devices {:?})",
                task_id, planned.desc, planned.priority, planned.devices
            );
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(config.interval_ms));
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = result {
                    error!("Failed to listen for interrupt: {}", e);
                }
                warn!("Interrupted, cancelling all tasks");
                interrupted = true;
                manager.cancel_all();
                continue;
            }
        }

        if let Some(line) = manager.status_line() {
            println!("{}", line);
        }

        let tasks = manager.tasks();
        if tasks.iter().all(is_settled) {
            report(&tasks, config.json)?;
            break;
        }
    }

    info!(
        "Plan finished after {} scheduling pass(es)",
        manager.passes()
    );
    Ok(())
}

/// Nothing left that can progress without user input
fn is_settled(task: &TaskSnapshot) -> bool {
    matches!(
        task.status,
        TaskStatus::Stopped
            | TaskStatus::Paused
            | TaskStatus::Cancelled
            | TaskStatus::Failed
            | TaskStatus::Done
    )
}

fn report(tasks: &[TaskSnapshot], json: bool) -> Result<()> {
    if json {
        let output =
            serde_json::to_string_pretty(tasks).context("Failed to serialize task snapshot")?;
        println!("{}", output);
        return Ok(());
    }

    for task in tasks {
        println!(
            "  {} [{}] {}{}",
            task.id,
            task.status,
            task.desc,
            task.status_text
                .as_deref()
                .map(|text| format!(" ({})", text))
                .unwrap_or_default()
        );
    }
    Ok(())
}
