//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `run`: Simulate a plan of tasks competing for devices
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default `./taskdeck.toml`

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default delay between two status lines
pub const DEFAULT_INTERVAL_MS: u64 = 500;

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    ShowConfig,
    InitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub plan: PathBuf,
    pub config_override: Option<PathBuf>,
    pub interval_ms: u64,
    pub json: bool,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "taskdeck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Schedules background tasks that compete for devices")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a plan of simulated tasks and report their progress
    Run {
        /// Path to the TOML plan
        plan: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Milliseconds between two status lines
        #[arg(long = "interval-ms", default_value_t = DEFAULT_INTERVAL_MS)]
        interval_ms: u64,
        /// Print the final task snapshot as JSON
        #[arg(long = "json")]
        json: bool,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Write the default configuration to ./taskdeck.toml
    InitConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                plan,
                config,
                interval_ms,
                json,
                verbose,
            }) => {
                if *interval_ms == 0 {
                    return Err("--interval-ms must be greater than zero".to_string());
                }
                Ok(ExecutionMode::Run(RunConfig {
                    plan: plan.clone(),
                    config_override: config.clone(),
                    interval_ms: *interval_ms,
                    json: *json,
                    verbose: *verbose,
                }))
            }
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'taskdeck --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}
