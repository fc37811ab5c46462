//! Environment constants and path utilities for taskdeck.
//!
//! This module centralizes the file and directory names used by the
//! configuration discovery, making them easier to maintain and modify.

use std::path::{Path, PathBuf};

/// Main application directory name (hidden directory like .git, .vscode)
pub const TASKDECK_DIR_NAME: &str = ".taskdeck";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name at the root of a working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "taskdeck.toml";

/// System-wide configuration file (Unix-like systems)
pub const SYSTEM_CONFIG_FILE: &str = "/etc/taskdeck/config.toml";

/// Environment variable holding the log filter
pub const LOG_ENV_VAR: &str = "TASKDECK_LOG";

/// Log filter used when [`LOG_ENV_VAR`] is not set
pub const DEFAULT_LOG_FILTER: &str = "taskdeck=info";

/// Build the .taskdeck directory path from a base directory
pub fn taskdeck_dir_path(base: &Path) -> PathBuf {
    base.join(TASKDECK_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    taskdeck_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file paths in the current directory, in lookup order
pub fn local_config_file_paths(current_dir: &Path) -> [PathBuf; 2] {
    [
        current_dir.join(LOCAL_CONFIG_FILE_NAME),
        taskdeck_dir_path(current_dir).join(CONFIG_FILE_NAME),
    ]
}
