//! Stratus CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: One or more requests failed
//! - 4: Template error
//! - 5: Provisioning engine or tool error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, CliError, Commands};
use stratus_core::CoreError;
use stratus_iac::IacError;
use stratus_runner::RunnerError;
use stratus_templates::TemplateError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const REQUESTS_FAILED: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const ENGINE_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.log_json);

    let config = match commands::load_config(&cli.global) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            return ExitCode::from(categorize_error(&e));
        }
    };

    let result = match cli.command {
        Commands::Process(args) => commands::process::execute(args, config).await,
        Commands::List(args) => commands::list::execute(args, config).await,
        Commands::Cleanup(args) => commands::cleanup::execute(args, config).await,
        Commands::Submit(args) => commands::submit::execute(args, config).await,
        Commands::Status(args) => commands::status::execute(args, config).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Logs go to stderr so command output on stdout stays parseable.
fn init_logging(verbose: bool, json: bool) {
    let default_filter = if verbose { "stratus=debug,warn" } else { "stratus=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (plain, structured) = if json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_target(false).with_writer(std::io::stderr)), None)
    };

    // Already initialized (e.g. under a test harness); keep going.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<CliError>() {
            return match err {
                CliError::RequestsFailed(_) => ExitCodes::REQUESTS_FAILED,
                CliError::InvalidInput(_) => ExitCodes::INVALID_ARGS,
            };
        }
        if cause.downcast_ref::<TemplateError>().is_some() {
            return ExitCodes::TEMPLATE_ERROR;
        }
        if cause.downcast_ref::<RunnerError>().is_some() || cause.downcast_ref::<IacError>().is_some() {
            return ExitCodes::ENGINE_ERROR;
        }
        if let Some(CoreError::InvalidConfig(_) | CoreError::InvalidRecord(_) | CoreError::Yaml(_)) =
            cause.downcast_ref::<CoreError>()
        {
            return ExitCodes::INVALID_ARGS;
        }
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("template") {
        ExitCodes::TEMPLATE_ERROR
    } else if msg.contains("terraform") || msg.contains("tool") {
        ExitCodes::ENGINE_ERROR
    } else if msg.contains("argument") || msg.contains("option") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
