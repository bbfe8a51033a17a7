//! # stratus_iac
//!
//! Provisioning engine adapter and instance lifecycle management.
//!
//! This crate drives Terraform through the init, validate, plan, apply and
//! output-capture stages against one instance directory, and lists or
//! prunes instance directories independently of the requests that created
//! them.
//!
//! ## Features
//!
//! - [`ProvisioningEngine`] trait so the engine can be replaced in tests
//! - [`TerraformEngine`] running each stage through a `CommandRunner`
//! - Stage-tagged failures ([`StageError`])
//! - [`InstanceManager`] for listing and age-based cleanup
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use stratus_core::Action;
//! use stratus_iac::{ProvisioningEngine, TerraformEngine, TerraformRunner};
//! use stratus_runner::CliRunner;
//!
//! # async fn run() {
//! let runner = TerraformRunner::new(Arc::new(CliRunner::new())).with_timeout(1800);
//! let engine = TerraformEngine::new(runner);
//!
//! let instance = Path::new("terraform/instances/blog-dev-20240101120000");
//! match engine.apply(instance, Action::Create).await {
//!     Ok(outputs) => println!("outputs: {}", outputs),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod terraform;

pub use engine::{ProvisioningEngine, Stage, StageError};
pub use error::{IacError, IacResult};
pub use lifecycle::{CleanupReport, InstanceInfo, InstanceManager, InstanceState};
pub use terraform::{
    TerraformEngine, TerraformResult, TerraformRunner, OUTPUTS_FILE, PLAN_FILE, STATE_FILE,
};
