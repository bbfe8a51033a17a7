//! Instance directory listing and age-based cleanup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::IacResult;
use crate::terraform::STATE_FILE;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// What the state file says about an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum InstanceState {
    /// State file read; number of resources it tracks.
    Resources(usize),
    /// State file absent or unreadable.
    NoState,
}

impl InstanceState {
    pub fn resource_count(&self) -> usize {
        match self {
            InstanceState::Resources(n) => *n,
            InstanceState::NoState => 0,
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Resources(n) => write!(f, "{} resource(s)", n),
            InstanceState::NoState => write!(f, "no state"),
        }
    }
}

/// One instance directory.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
    pub name: String,
    pub path: PathBuf,
    pub state: InstanceState,
    pub modified: Option<DateTime<Utc>>,
}

/// Outcome of a cleanup sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    /// Directories that were old enough but could not be deleted.
    pub skipped: Vec<(String, String)>,
}

/// Lists and prunes directories under the instances root.
#[derive(Debug, Clone)]
pub struct InstanceManager {
    instances_root: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_root: impl Into<PathBuf>) -> Self {
        Self {
            instances_root: instances_root.into(),
        }
    }

    pub fn instances_root(&self) -> &Path {
        &self.instances_root
    }

    fn instance_dirs(&self) -> Vec<PathBuf> {
        if !self.instances_root.exists() {
            debug!("Instances directory does not exist: {:?}", self.instances_root);
            return Vec::new();
        }

        let mut dirs: Vec<PathBuf> = WalkDir::new(&self.instances_root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .collect();
        dirs.sort();
        dirs
    }

    /// Every instance with a best-effort resource count. Never fails on
    /// individual instances.
    pub fn list(&self) -> IacResult<Vec<InstanceInfo>> {
        let instances = self
            .instance_dirs()
            .into_iter()
            .map(|path| {
                let name = dir_name(&path);
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Utc>::from);
                InstanceInfo {
                    name,
                    state: read_state(&path),
                    modified,
                    path,
                }
            })
            .collect();
        Ok(instances)
    }

    /// Remove every instance whose age is at least `max_age_days`.
    pub fn cleanup(&self, max_age_days: u64) -> IacResult<CleanupReport> {
        let threshold = Duration::from_secs(max_age_days.saturating_mul(SECONDS_PER_DAY));
        let now = SystemTime::now();
        let mut report = CleanupReport::default();

        info!("Removing instances older than {} day(s)", max_age_days);

        for path in self.instance_dirs() {
            let name = dir_name(&path);
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    warn!("Cannot read modification time of {}: {}", name, e);
                    report.skipped.push((name, e.to_string()));
                    continue;
                }
            };
            // A clock skewed into the future counts as age zero.
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age < threshold {
                continue;
            }

            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    info!("Removed instance {}", name);
                    report.removed.push(name);
                }
                Err(e) => {
                    warn!("Failed to remove instance {}: {}", name, e);
                    report.skipped.push((name, e.to_string()));
                }
            }
        }

        info!(
            "Cleanup finished: {} removed, {} skipped",
            report.removed.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_state(instance_dir: &Path) -> InstanceState {
    let path = instance_dir.join(STATE_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return InstanceState::NoState,
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(state) => InstanceState::Resources(
            state
                .get("resources")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0),
        ),
        Err(e) => {
            debug!("Unreadable state in {:?}: {}", instance_dir, e);
            InstanceState::NoState
        }
    }
}
