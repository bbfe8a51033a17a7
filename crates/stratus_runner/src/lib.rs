//! # stratus_runner
//!
//! External command execution for the Stratus provisioning queue.
//!
//! Every interaction with a command-line tool (the provisioning engine,
//! the cloud CLI) goes through the [`CommandRunner`] trait so callers can
//! swap the real process runner for a scripted one in tests.
//!
//! # Features
//!
//! - **Process Runner**: [`CliRunner`] spawns tools with a per-call deadline
//! - **Tool Detection**: [`ToolCheck`] separates required from optional tools
//! - **Mock Runner**: [`MockRunner`] answers calls from scripted responses
//!
//! # Example
//!
//! ```rust,no_run
//! use stratus_runner::{CliRunner, CommandRunner, CommandSpec, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = CliRunner::new();
//!
//!     let spec = CommandSpec::new("terraform")
//!         .arg("version")
//!         .workdir("/tmp");
//!
//!     let result = runner.run(&spec, &RunConfig::default().timeout(30)).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod mock;
pub mod runner;
pub mod tools;

pub use cli::CliRunner;
pub use config::{CommandSpec, RunConfig};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use runner::{CommandRunner, ExecutionResult};
pub use tools::{ToolCheck, ToolReport};
