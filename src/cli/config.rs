//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./taskdeck.toml or ./.taskdeck/config.toml
//! 2. User config: ~/.taskdeck/config.toml
//! 3. System config: /etc/taskdeck/config.toml
//! 4. Built-in defaults

use crate::{env, task::TaskManagerConfig};
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<TaskManagerConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return TaskManagerConfig::from_toml_file(&config_path)
                .with_context(|| format!("Invalid configuration in {:?}", config_path));
        }

        info!("No configuration file found, using defaults");
        Ok(TaskManagerConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Configuration file candidates in priority order
    pub fn config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.extend(env::local_config_file_paths(&current_dir));
        }

        if let Some(home_dir) = Self::home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE));

        candidates
    }

    fn home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Write the default configuration to `./taskdeck.toml`
    pub fn create_local_config() -> Result<PathBuf> {
        let current_dir = std_env::current_dir().context("Could not determine current directory")?;
        let [config_path, _] = env::local_config_file_paths(&current_dir);

        if config_path.exists() {
            warn!("Configuration file already exists: {:?}", config_path);
        } else {
            TaskManagerConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::config_candidates().iter().enumerate() {
            let status = if candidate.is_file() {
                "EXISTS"
            } else if candidate.exists() {
                "NOT A FILE"
            } else {
                "NOT FOUND"
            };
            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}

/// Load an explicit configuration file, or fall back to discovery
pub fn load_config(path: Option<&PathBuf>) -> Result<TaskManagerConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration override from: {:?}", path);
            TaskManagerConfig::from_toml_file(path)
                .with_context(|| format!("Invalid configuration in {:?}", path))
        }
        None => ConfigDiscovery::discover_config(),
    }
}
