//! List command - Show instance directories.

use anyhow::{Context, Result};
use clap::Args;

use stratus_core::StratusConfig;
use stratus_iac::{InstanceManager, InstanceState};

#[derive(Args)]
pub struct ListArgs {
    /// Print instances as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: ListArgs, config: StratusConfig) -> Result<()> {
    let manager = InstanceManager::new(&config.instances_root);
    let instances = manager.list().context("Failed to list instances")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&instances)?);
        return Ok(());
    }

    if instances.is_empty() {
        println!("No instances under {:?}", manager.instances_root());
        return Ok(());
    }

    println!("{:<48} {:>10}  {}", "INSTANCE", "RESOURCES", "MODIFIED");
    for instance in &instances {
        let resources = match instance.state {
            InstanceState::Resources(n) => n.to_string(),
            InstanceState::NoState => instance.state.to_string(),
        };
        let modified = instance
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<48} {:>10}  {}", instance.name, resources, modified);
    }
    println!();
    println!("{} instance(s)", instances.len());

    Ok(())
}
