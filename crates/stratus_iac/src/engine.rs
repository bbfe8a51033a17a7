//! Provisioning engine abstraction.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stratus_core::Action;
use thiserror::Error;

/// One step of the provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Validate,
    Plan,
    Apply,
    Output,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Validate => "validate",
            Stage::Plan => "plan",
            Stage::Apply => "apply",
            Stage::Output => "output",
        }
    }

    /// Stages in execution order.
    pub fn sequence() -> [Stage; 5] {
        [Stage::Init, Stage::Validate, Stage::Plan, Stage::Apply, Stage::Output]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed provisioning stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Drives an external provisioning engine against one instance directory.
///
/// Stages run strictly in [`Stage::sequence`] order and the first failure
/// aborts the rest. Partially created resources are left to the engine.
/// For [`Action::Destroy`] the plan stage plans a teardown instead.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Provision the instance and return the engine's declared outputs
    /// (an object, possibly empty).
    async fn apply(&self, instance_dir: &Path, action: Action) -> Result<Value, StageError>;
}
