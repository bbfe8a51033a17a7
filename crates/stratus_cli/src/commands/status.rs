//! Status command - Show where a request is and its outcome.

use anyhow::{Context, Result};
use clap::Args;

use stratus_core::StratusConfig;
use stratus_queue::{QueueError, QueueStore};

#[derive(Args)]
pub struct StatusArgs {
    /// Request id
    pub id: String,

    /// Print the stored record as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StatusArgs, config: StratusConfig) -> Result<()> {
    let store = QueueStore::new(&config.queue_root);
    let (partition, record) = store
        .locate(&args.id)
        .with_context(|| format!("Failed to read request {}", args.id))?
        .ok_or_else(|| QueueError::NotFound(args.id.clone()))?;

    if args.json {
        println!("{}", record.to_json()?);
        return Ok(());
    }

    println!("Request:   {}", record.id);
    println!("Status:    {} ({})", record.status, partition);
    println!("Type:      {}", record.resource_type);
    println!("Action:    {}", record.action);
    if let Some(requester) = &record.requester {
        println!("Requester: {}", requester);
    }
    if let Some(instance) = &record.instance_name {
        println!("Instance:  {}", instance);
    }
    if let Some(updated) = record.updated_at {
        println!("Updated:   {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(error) = &record.error_message {
        println!("Error:     {}", error);
    }
    if let Some(outputs) = &record.terraform_output {
        println!("Outputs:");
        println!("{}", serde_json::to_string_pretty(outputs)?);
    }

    Ok(())
}
