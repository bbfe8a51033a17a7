//! Cleanup command - Remove old instance directories.

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use stratus_core::StratusConfig;
use stratus_iac::InstanceManager;

#[derive(Args)]
pub struct CleanupArgs {
    /// Minimum age in days (defaults to the configured value, 30)
    pub days: Option<u64>,
}

pub async fn execute(args: CleanupArgs, config: StratusConfig) -> Result<()> {
    let days = args.days.unwrap_or(config.default_cleanup_days);
    let manager = InstanceManager::new(&config.instances_root);
    let report = manager
        .cleanup(days)
        .with_context(|| format!("Failed to clean up instances older than {} day(s)", days))?;

    for name in &report.removed {
        println!("🗑️  Removed {}", name);
    }
    for (name, reason) in &report.skipped {
        warn!("Skipped {}: {}", name, reason);
    }
    println!(
        "Cleanup complete: {} removed, {} skipped",
        report.removed.len(),
        report.skipped.len()
    );

    Ok(())
}
