//! Submit command - Queue a request from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use tracing::info;

use stratus_core::{RequestRecord, StratusConfig};
use stratus_queue::QueueStore;
use stratus_templates::TemplateCatalog;

use super::CliError;

#[derive(Args)]
pub struct SubmitArgs {
    /// Request file (JSON with resource_type and resource_config)
    pub file: PathBuf,

    /// Requester recorded on the request
    #[arg(long)]
    pub requester: Option<String>,
}

pub async fn execute(args: SubmitArgs, config: StratusConfig) -> Result<()> {
    let record = read_request(&args.file, args.requester.as_deref())?;

    TemplateCatalog::new(&config.templates_root)
        .resolve(&record.resource_type)
        .context("Request cannot be provisioned")?;

    let store = QueueStore::new(&config.queue_root);
    let path = store
        .enqueue(&record)
        .with_context(|| format!("Failed to queue request {}", record.id))?;

    info!("Queued {:?}", path);
    println!("{}", record.id);
    Ok(())
}

/// Parse a request file. A missing `id` is generated.
fn read_request(file: &Path, requester: Option<&str>) -> Result<RequestRecord> {
    let content = fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    let mut value: Value =
        serde_json::from_str(&content).with_context(|| format!("{:?} is not valid JSON", file))?;

    let object = value
        .as_object_mut()
        .ok_or_else(|| CliError::InvalidInput(format!("{:?} must contain a JSON object", file)))?;
    if !object.contains_key("id") {
        object.insert("id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
    }

    let mut record: RequestRecord = serde_json::from_value(value)
        .map_err(|e| CliError::InvalidInput(format!("{:?}: {}", file, e)))?;
    if let Some(requester) = requester {
        record.requester = Some(requester.to_string());
    }
    record.validate()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::{Partition, RequestStatus};

    fn write(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("request.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_request_generates_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{"resource_type": "web_app", "resource_config": {"app_name": "blog"}}"#,
        );

        let record = read_request(&path, Some("alice")).unwrap();
        assert!(!record.id.is_empty());
        assert_eq!(record.requester.as_deref(), Some("alice"));
        assert_eq!(record.status, RequestStatus::Pending);
    }

    #[test]
    fn test_read_request_rejects_non_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "[1, 2]");
        let err = read_request(&path, None).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_submit_queues_pending_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = StratusConfig::from_root(dir.path());
        let path = write(
            dir.path(),
            r#"{"id": "r1", "resource_type": "api_service", "resource_config": {"service_name": "orders"}}"#,
        );

        execute(SubmitArgs { file: path, requester: None }, config.clone())
            .await
            .unwrap();

        let store = QueueStore::new(&config.queue_root);
        assert_eq!(store.scan(Partition::Pending).unwrap(), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_submit_rejects_unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        let config = StratusConfig::from_root(dir.path());
        let path = write(dir.path(), r#"{"id": "r1", "resource_type": "database"}"#);

        let err = execute(SubmitArgs { file: path, requester: None }, config.clone())
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<stratus_templates::TemplateError>().is_some());
        assert!(QueueStore::new(&config.queue_root).scan(Partition::Pending).unwrap().is_empty());
    }
}
