//! CLI command definitions.
//!
//! Each subcommand maps to one operation on the queue or the instance
//! directories.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use stratus_core::StratusConfig;

pub mod cleanup;
pub mod list;
pub mod process;
pub mod status;
pub mod submit;

/// Stratus - provisioning queue processor
#[derive(Parser)]
#[command(name = "stratus")]
#[command(version, about = "Stratus - provisioning queue processor")]
#[command(long_about = r#"
Stratus turns queued infrastructure requests into Terraform instances.

COMMANDS:
  process        → Sweep the pending queue once and provision each request
  list           → List instance directories and their resource counts
  cleanup [DAYS] → Remove instances at least DAYS old (default 30)
  submit FILE    → Queue a request from a JSON file
  status ID      → Show where a request is and its outcome

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - One or more requests failed
  4 - Template error
  5 - Provisioning engine or tool error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args)]
pub struct GlobalArgs {
    /// Base directory holding queue/ and terraform/
    #[arg(long, global = true, env = "STRATUS_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Configuration file (defaults to <root>/stratus.yaml when present)
    #[arg(long, global = true, env = "STRATUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every pending request once
    Process(process::ProcessArgs),

    /// List provisioned instances
    List(list::ListArgs),

    /// Remove old instance directories
    Cleanup(cleanup::CleanupArgs),

    /// Queue a request from a JSON file
    Submit(submit::SubmitArgs),

    /// Show the state of a request
    Status(status::StatusArgs),
}

/// Failures the binary reports with a dedicated exit code.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0} request(s) failed")]
    RequestsFailed(usize),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Resolve the configuration for this invocation.
pub fn load_config(global: &GlobalArgs) -> Result<StratusConfig> {
    StratusConfig::discover(&global.root, global.config.as_deref())
        .with_context(|| format!("Failed to load configuration for root {:?}", global.root))
}
