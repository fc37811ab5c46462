use crate::task::status::DEFAULT_STATUS_FORMAT;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the task manager
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskManagerConfig {
    /// Status line format, see [`crate::task::status`]
    pub status_format: String,
    /// Cap on tasks running at once; paused tasks do not count. Unbounded
    /// if unset
    pub max_workers: Option<usize>,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            status_format: DEFAULT_STATUS_FORMAT.to_string(),
            max_workers: None,
        }
    }
}

impl TaskManagerConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == Some(0) {
            bail!("max_workers must be at least 1");
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}
