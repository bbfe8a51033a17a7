//! # stratus_queue
//!
//! Filesystem queue store and the provisioning queue processor.
//!
//! Requests live as `{id}.json` files in one of four partition directories
//! under the queue root. Ownership of a request is nothing more than the
//! partition holding its file:
//!
//! ```text
//! pending/ --claim (rename)--> processing/ --complete--> completed/ | failed/
//! ```
//!
//! The processor sweeps `pending/` once, and for every request it wins the
//! claim for: resolves the template, instantiates it, runs the provisioning
//! engine, and records the terminal outcome. Failures are isolated to the
//! request that caused them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use stratus_core::StratusConfig;
//! use stratus_iac::{TerraformEngine, TerraformRunner};
//! use stratus_queue::QueueProcessor;
//! use stratus_runner::CliRunner;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StratusConfig::from_root("/srv/stratus");
//! let engine = TerraformEngine::new(TerraformRunner::new(Arc::new(CliRunner::new())));
//! let processor = QueueProcessor::new(&config, Arc::new(engine));
//!
//! let report = processor.sweep().await?;
//! println!("{} completed, {} failed", report.completed, report.failed);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod processor;
pub mod recorder;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use processor::{QueueProcessor, SweepReport};
pub use recorder::OutcomeRecorder;
pub use store::{Claim, QueueStore};
