//! The provisioning queue processor.
//!
//! One sweep walks a snapshot of `pending/`. Each request is claimed,
//! instantiated, provisioned and recorded on its own; an error for one
//! request becomes that request's failed record and the sweep moves on.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use stratus_core::{Partition, RequestRecord, RequestStatus, StratusConfig};
use stratus_iac::{ProvisioningEngine, StageError};
use stratus_templates::{instance_base_name, InstanceDir, TemplateError, TemplateInstantiator};

use crate::error::QueueResult;
use crate::recorder::OutcomeRecorder;
use crate::store::{Claim, QueueStore};

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records present in `pending` when the sweep started.
    pub scanned: usize,
    pub completed: usize,
    pub failed: usize,
    /// Records another processor claimed first.
    pub skipped: usize,
    /// Records whose terminal outcome could not be written.
    pub errors: usize,
}

impl SweepReport {
    /// Records this sweep owned and finished.
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Why a claimed request did not provision.
struct Failure {
    stage: String,
    message: String,
    instance: Option<String>,
}

impl Failure {
    fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            instance: None,
        }
    }
}

impl From<TemplateError> for Failure {
    fn from(e: TemplateError) -> Self {
        let stage = match &e {
            TemplateError::UnsupportedResourceType(_) => "resolve",
            TemplateError::TemplateNotFound(_) => "template",
            _ => "instantiate",
        };
        Failure::new(stage, e.to_string())
    }
}

impl From<StageError> for Failure {
    fn from(e: StageError) -> Self {
        Failure::new(e.stage.as_str(), e.message)
    }
}

/// Sweeps the pending partition and provisions each request.
pub struct QueueProcessor {
    store: QueueStore,
    recorder: OutcomeRecorder,
    instantiator: TemplateInstantiator,
    engine: Arc<dyn ProvisioningEngine>,
}

impl QueueProcessor {
    pub fn new(config: &StratusConfig, engine: Arc<dyn ProvisioningEngine>) -> Self {
        let store = QueueStore::new(&config.queue_root);
        Self {
            recorder: OutcomeRecorder::new(store.clone()),
            store,
            instantiator: TemplateInstantiator::new(&config.templates_root, &config.instances_root),
            engine,
        }
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    /// Process everything that is pending right now, once.
    pub async fn sweep(&self) -> QueueResult<SweepReport> {
        self.store.ensure_layout()?;

        let ids = self.store.scan(Partition::Pending)?;
        let mut report = SweepReport {
            scanned: ids.len(),
            ..Default::default()
        };

        if ids.is_empty() {
            info!("No pending requests");
            return Ok(report);
        }
        info!("Processing {} pending request(s)", ids.len());

        for id in &ids {
            match self.process_one(id).await {
                Ok(Some(RequestStatus::Completed)) => report.completed += 1,
                Ok(Some(_)) => report.failed += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    error!("Request {} could not be recorded: {}", id, e);
                    report.errors += 1;
                }
            }
        }

        info!(
            "Sweep finished: {} completed, {} failed, {} skipped, {} errors",
            report.completed, report.failed, report.skipped, report.errors
        );
        Ok(report)
    }

    /// Claim and process one pending request.
    ///
    /// Returns the terminal status, or `None` if the claim was lost.
    pub async fn process_one(&self, id: &str) -> QueueResult<Option<RequestStatus>> {
        if let Claim::Lost = self.store.claim(id)? {
            info!("Request {} already claimed, skipping", id);
            return Ok(None);
        }

        let mut record = match self.read_claimed(id) {
            Ok(record) => record,
            Err((record, failure)) => {
                let record = self.recorder.record_failure(record, &failure.stage, &failure.message)?;
                return Ok(Some(record.status));
            }
        };
        record.status = RequestStatus::Processing;

        info!(
            "Provisioning request {} ({} {}) for {}",
            record.id,
            record.action,
            record.resource_type,
            record.requester.as_deref().unwrap_or("unknown requester")
        );

        let finished = match self.provision(&record).await {
            Ok((instance, outputs)) => {
                record.instance_name = Some(instance.name);
                self.recorder.record_success(record, outputs)?
            }
            Err(failure) => {
                if failure.instance.is_some() {
                    record.instance_name = failure.instance.clone();
                }
                self.recorder.record_failure(record, &failure.stage, &failure.message)?
            }
        };

        Ok(Some(finished.status))
    }

    /// Load the claimed record. A file that does not parse still gets a
    /// failed record so it leaves `processing`.
    fn read_claimed(&self, id: &str) -> Result<RequestRecord, (RequestRecord, Failure)> {
        let raw = match self.store.read_raw(Partition::Processing, id) {
            Ok(raw) => raw,
            Err(e) => return Err((stub_record(id, None), Failure::new("read", e.to_string()))),
        };

        match RequestRecord::from_json(&raw) {
            Ok(record) if record.id == id => Ok(record),
            Ok(record) => {
                warn!("Record file {} carries id {}; using file name", id, record.id);
                Ok(RequestRecord {
                    id: id.to_string(),
                    ..record
                })
            }
            Err(e) => Err((stub_record(id, Some(&raw)), Failure::new("parse", e.to_string()))),
        }
    }

    async fn provision(&self, record: &RequestRecord) -> Result<(InstanceDir, Value), Failure> {
        let template = self.instantiator.catalog().resolve(&record.resource_type)?;

        let base_name = instance_base_name(record.app_or_service_name(), record.environment(), Utc::now());
        let instance = self
            .instantiator
            .instantiate(template, &base_name, &record.resource_config)?;

        match self.engine.apply(&instance.path, record.action).await {
            Ok(outputs) => Ok((instance, outputs)),
            Err(e) => {
                let mut failure = Failure::from(e);
                failure.instance = Some(instance.name);
                Err(failure)
            }
        }
    }
}

/// Best-effort record for a file that could not be parsed: keeps whatever
/// top-level fields are readable.
fn stub_record(id: &str, raw: Option<&str>) -> RequestRecord {
    let parsed = raw.and_then(|r| serde_json::from_str::<Value>(r).ok());
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(String::from)
    };

    let mut record = RequestRecord::new(
        id,
        field("resource_type").unwrap_or_default(),
        serde_json::json!({}),
    );
    record.requester = field("requester");
    record
}
