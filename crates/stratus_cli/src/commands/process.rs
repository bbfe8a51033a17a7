//! Process command - Sweep the pending queue once.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stratus_core::StratusConfig;
use stratus_iac::{TerraformEngine, TerraformRunner};
use stratus_queue::{QueueProcessor, SweepReport};
use stratus_runner::{CliRunner, CommandRunner, ToolCheck};

use super::CliError;

#[derive(Args)]
pub struct ProcessArgs {
    /// Skip the required tool check
    #[arg(long)]
    skip_tool_check: bool,

    /// Print the sweep report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: ProcessArgs, config: StratusConfig) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(CliRunner::new());
    let report = sweep(&config, runner, !args.skip_tool_check).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let unfinished = report.failed + report.errors;
    if unfinished > 0 {
        return Err(CliError::RequestsFailed(unfinished).into());
    }
    Ok(())
}

/// Check tools, then run one sweep with the Terraform engine on `runner`.
pub async fn sweep(config: &StratusConfig, runner: Arc<dyn CommandRunner>, check_tools: bool) -> Result<SweepReport> {
    if check_tools {
        let tools = ToolCheck::new()
            .with_tools(&required_tools(config), &config.optional_tools)
            .run(runner.as_ref())
            .await
            .context("Failed to check required tools")?;
        tools.ensure_ready().context("Required tool check failed")?;
    }

    info!("Processing queue at {:?}", config.queue_root);

    let terraform = TerraformRunner::new(runner)
        .with_binary(&config.terraform_binary)
        .with_timeout(config.stage_timeout_secs);
    let processor = QueueProcessor::new(config, Arc::new(TerraformEngine::new(terraform)));

    processor.sweep().await.context("Queue sweep failed")
}

/// Required tools with the bare `terraform` entry replaced by the binary
/// the engine actually runs.
fn required_tools(config: &StratusConfig) -> Vec<String> {
    let mut required: Vec<String> = config
        .required_tools
        .iter()
        .filter(|tool| tool.as_str() != "terraform")
        .cloned()
        .collect();
    if !required.contains(&config.terraform_binary) {
        required.insert(0, config.terraform_binary.clone());
    }
    required
}

fn print_report(report: &SweepReport) {
    if report.scanned == 0 {
        println!("📭 No pending requests");
        return;
    }

    println!("📦 Processed {} request(s)", report.processed());
    println!("   ✅ Completed: {}", report.completed);
    println!("   ❌ Failed:    {}", report.failed);
    if report.skipped > 0 {
        println!("   ⏭️  Skipped:   {} (claimed elsewhere)", report.skipped);
    }
    if report.errors > 0 {
        println!("   ⚠️  Unrecorded: {}", report.errors);
    }
}
