//! Processor configuration.
//!
//! Every component receives its directories from a [`StratusConfig`]
//! at construction time. Nothing is derived from the location of the
//! executable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};

/// File looked up in the root directory when no explicit config is given.
pub const CONFIG_FILE_NAME: &str = "stratus.yaml";

/// Locations and tunables for the queue processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StratusConfig {
    /// Directory holding the pending/processing/completed/failed partitions.
    pub queue_root: PathBuf,
    /// One sub-directory per template.
    pub templates_root: PathBuf,
    /// One sub-directory per provisioned instance.
    pub instances_root: PathBuf,
    /// Provisioning engine executable.
    pub terraform_binary: String,
    /// Deadline for a single engine stage, in seconds.
    pub stage_timeout_secs: u64,
    /// Tools whose absence aborts a sweep before any request is claimed.
    pub required_tools: Vec<String>,
    /// Tools whose absence is only reported.
    pub optional_tools: Vec<String>,
    /// Age threshold used by `cleanup` when none is given.
    pub default_cleanup_days: u64,
}

impl Default for StratusConfig {
    fn default() -> Self {
        Self::from_root("")
    }
}

impl StratusConfig {
    /// Conventional layout below a single base directory.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            queue_root: root.join("queue"),
            templates_root: root.join("terraform").join("templates"),
            instances_root: root.join("terraform").join("instances"),
            terraform_binary: "terraform".to_string(),
            stage_timeout_secs: 30 * 60,
            required_tools: vec!["terraform".to_string()],
            optional_tools: vec!["aws".to_string()],
            default_cleanup_days: 30,
        }
    }

    /// Load a YAML config file. Relative paths inside it are resolved
    /// against `root`.
    pub fn load(path: &Path, root: &Path) -> CoreResult<Self> {
        debug!("Loading configuration from {:?}", path);
        let content = fs::read_to_string(path)?;
        let config: StratusConfig = if content.trim().is_empty() {
            StratusConfig::from_root("")
        } else {
            serde_yaml::from_str(&content)?
        };
        let config = config.rebase(root);
        config.validate()?;
        Ok(config)
    }

    /// Use `explicit` if given, else `<root>/stratus.yaml` if present,
    /// else the conventional layout below `root`.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> CoreResult<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(CoreError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Self::load(path, root);
        }

        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            info!("Using configuration {:?}", candidate);
            return Self::load(&candidate, root);
        }

        let config = Self::from_root(root);
        config.validate()?;
        Ok(config)
    }

    fn rebase(mut self, root: &Path) -> Self {
        for dir in [&mut self.queue_root, &mut self.templates_root, &mut self.instances_root] {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        }
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.terraform_binary.trim().is_empty() {
            return Err(CoreError::InvalidConfig("terraform_binary must not be empty".to_string()));
        }
        if self.stage_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig("stage_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}
