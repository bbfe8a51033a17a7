//! Terminal outcome recording.

use serde_json::{Map, Value};
use stratus_core::RequestRecord;
use tracing::{error, info};

use crate::error::QueueResult;
use crate::store::QueueStore;

const FALLBACK_STAGE: &str = "process";
const FALLBACK_MESSAGE: &str = "unknown error";

/// Writes completed and failed records into the queue.
#[derive(Debug, Clone)]
pub struct OutcomeRecorder {
    store: QueueStore,
}

impl OutcomeRecorder {
    pub fn new(store: QueueStore) -> Self {
        Self { store }
    }

    /// Mark the request completed with the engine outputs.
    pub fn record_success(&self, mut record: RequestRecord, outputs: Value) -> QueueResult<RequestRecord> {
        let outputs = match outputs {
            Value::Object(_) => outputs,
            _ => Value::Object(Map::new()),
        };
        record.mark_completed(outputs);
        self.store.complete(&record)?;
        info!("Request {} completed", record.id);
        Ok(record)
    }

    /// Mark the request failed with a stage-tagged message.
    pub fn record_failure(&self, mut record: RequestRecord, stage: &str, message: &str) -> QueueResult<RequestRecord> {
        record.mark_failed(failure_message(stage, message));
        self.store.complete(&record)?;
        error!(
            "Request {} failed: {}",
            record.id,
            record.error_message.as_deref().unwrap_or_default()
        );
        Ok(record)
    }
}

/// `"<stage> failed: <message>"`, never with an empty stage or message.
pub fn failure_message(stage: &str, message: &str) -> String {
    let stage = match stage.trim() {
        "" => FALLBACK_STAGE,
        s => s,
    };
    let message = match message.trim() {
        "" => FALLBACK_MESSAGE,
        m => m,
    };
    format!("{} failed: {}", stage, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stratus_core::{Partition, RequestStatus};
    use tempfile::tempdir;

    fn claimed(store: &QueueStore, id: &str) -> RequestRecord {
        store
            .enqueue(&RequestRecord::new(id, "web_app", json!({"app_name": "blog"})))
            .unwrap();
        store.claim(id).unwrap();
        store.load(Partition::Processing, id).unwrap()
    }

    #[test]
    fn test_record_success() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        let recorder = OutcomeRecorder::new(store.clone());

        let record = claimed(&store, "r1");
        let done = recorder.record_success(record, json!({"url": {"value": "x"}})).unwrap();

        assert_eq!(done.status, RequestStatus::Completed);
        let stored = store.load(Partition::Completed, "r1").unwrap();
        assert_eq!(stored.terraform_output, Some(json!({"url": {"value": "x"}})));
        assert!(store.scan(Partition::Processing).unwrap().is_empty());
    }

    #[test]
    fn test_record_success_non_object_outputs_become_empty_object() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        let recorder = OutcomeRecorder::new(store.clone());

        let done = recorder.record_success(claimed(&store, "r1"), json!("oops")).unwrap();
        assert_eq!(done.terraform_output, Some(json!({})));
    }

    #[test]
    fn test_record_failure() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        let recorder = OutcomeRecorder::new(store.clone());

        recorder
            .record_failure(claimed(&store, "r1"), "plan", "Error: invalid value")
            .unwrap();

        let stored = store.load(Partition::Failed, "r1").unwrap();
        assert_eq!(stored.status, RequestStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("plan failed: Error: invalid value"));
        assert!(stored.terraform_output.is_none());
        assert!(store.scan(Partition::Processing).unwrap().is_empty());
    }

    #[test]
    fn test_failure_message_never_empty() {
        assert_eq!(failure_message("", ""), "process failed: unknown error");
        assert_eq!(failure_message(" apply ", "boom\n"), "apply failed: boom");
    }
}
