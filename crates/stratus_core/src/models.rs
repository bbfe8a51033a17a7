//! Request records and the vocabulary shared by every queue component.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Name used for an instance when the config carries neither `app_name`
/// nor `service_name`.
pub const DEFAULT_INSTANCE_NAME: &str = "app";

/// Environment used when the config does not name one.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Variable file generated in every instance. Terraform loads
/// `terraform.tfvars.json` automatically and it keeps nested structure.
pub const TFVARS_FILE: &str = "terraform.tfvars.json";

/// Lifecycle status of a request. Always mirrors the partition holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Processing => "PROCESSING",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Failed => "FAILED",
        }
    }

    /// Partition a record with this status lives in.
    pub fn partition(&self) -> Partition {
        match self {
            RequestStatus::Pending => Partition::Pending,
            RequestStatus::Processing => Partition::Processing,
            RequestStatus::Completed => Partition::Completed,
            RequestStatus::Failed => Partition::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One of the four queue partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Partition {
    /// Directory name of the partition under the queue root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Partition::Pending => "pending",
            Partition::Processing => "processing",
            Partition::Completed => "completed",
            Partition::Failed => "failed",
        }
    }

    pub fn all() -> [Partition; 4] {
        [
            Partition::Pending,
            Partition::Processing,
            Partition::Completed,
            Partition::Failed,
        ]
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Resource types the processor knows how to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    WebApp,
    ApiService,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::WebApp => "web_app",
            ResourceType::ApiService => "api_service",
        }
    }

}

impl FromStr for ResourceType {
    type Err = CoreError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "web_app" => Ok(ResourceType::WebApp),
            "api_service" => Ok(ResourceType::ApiService),
            other => Err(CoreError::InvalidRecord(format!(
                "unsupported resource type '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a request asks the engine to do. `update` provisions exactly like
/// `create`; `destroy` plans a teardown and applies that plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Create,
    Update,
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }

    pub fn is_destroy(&self) -> bool {
        matches!(self, Action::Destroy)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// A provisioning request as stored in a queue partition.
///
/// `resource_type` is kept as the raw string from the producer so that an
/// unsupported type still round-trips into the failed partition unchanged.
/// Fields the processor does not know about are carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: String,
    pub resource_type: String,
    #[serde(default = "empty_object")]
    pub resource_config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestRecord {
    /// Create a pending record.
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>, resource_config: Value) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            resource_config,
            requester: None,
            action: Action::Create,
            status: RequestStatus::Pending,
            terraform_output: None,
            error_message: None,
            instance_name: None,
            updated_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Parse a record from its JSON file contents.
    pub fn from_json(content: &str) -> CoreResult<Self> {
        let record: RequestRecord = serde_json::from_str(content)?;
        record.validate()?;
        Ok(record)
    }

    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the invariants a record must satisfy to be queued.
    pub fn validate(&self) -> CoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidRecord("id must not be empty".to_string()));
        }
        if self.id.contains(['/', '\\']) || self.id.starts_with('.') {
            return Err(CoreError::InvalidRecord(format!(
                "id '{}' is not usable as a file name",
                self.id
            )));
        }
        Ok(())
    }

    /// Typed resource type, if supported.
    pub fn resource_kind(&self) -> Option<ResourceType> {
        self.resource_type.parse().ok()
    }

    fn config_str(&self, key: &str) -> Option<&str> {
        self.resource_config
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `app_name`, else `service_name`, else the default instance name.
    pub fn app_or_service_name(&self) -> &str {
        self.config_str("app_name")
            .or_else(|| self.config_str("service_name"))
            .unwrap_or(DEFAULT_INSTANCE_NAME)
    }

    pub fn environment(&self) -> &str {
        self.config_str("environment").unwrap_or(DEFAULT_ENVIRONMENT)
    }

    /// Turn this record into a completed terminal record.
    pub fn mark_completed(&mut self, outputs: Value) {
        let outputs = if outputs.is_object() { outputs } else { empty_object() };
        self.status = RequestStatus::Completed;
        self.terraform_output = Some(outputs);
        self.error_message = None;
        self.updated_at = Some(Utc::now());
    }

    /// Turn this record into a failed terminal record.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = RequestStatus::Failed;
        self.error_message = Some(message.into());
        self.terraform_output = None;
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_preserves_unknown_fields() {
        let raw = r#"{
            "id": "r1",
            "resource_type": "web_app",
            "resource_config": {"app_name": "blog", "environment": "dev"},
            "requester": "alice",
            "status": "PENDING",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;

        let record = RequestRecord::from_json(raw).unwrap();
        assert_eq!(record.extra.get("created_at"), Some(&json!("2024-01-01T00:00:00Z")));

        let written: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(written["created_at"], "2024-01-01T00:00:00Z");
        assert_eq!(written["requester"], "alice");
        assert!(written.get("error_message").is_none());
    }

    #[test]
    fn test_record_defaults() {
        let record = RequestRecord::from_json(r#"{"id": "r2", "resource_type": "api_service"}"#).unwrap();
        assert_eq!(record.status, RequestStatus::Pending);
        assert_eq!(record.resource_config, json!({}));
        assert_eq!(record.resource_kind(), Some(ResourceType::ApiService));
        assert_eq!(record.action, Action::Create);
    }

    #[test]
    fn test_action_round_trips_lowercase() {
        let record =
            RequestRecord::from_json(r#"{"id": "r3", "resource_type": "web_app", "action": "destroy"}"#).unwrap();
        assert!(record.action.is_destroy());

        let written: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(written["action"], "destroy");
        assert!(RequestRecord::from_json(r#"{"id": "r4", "resource_type": "web_app", "action": "nuke"}"#).is_err());
    }

    #[test]
    fn test_record_rejects_path_like_ids() {
        assert!(RequestRecord::from_json(r#"{"id": "../r1", "resource_type": "web_app"}"#).is_err());
        assert!(RequestRecord::from_json(r#"{"id": " ", "resource_type": "web_app"}"#).is_err());
    }

    #[test]
    fn test_instance_name_fallbacks() {
        let app = RequestRecord::new("a", "web_app", json!({"app_name": "blog", "environment": "prod"}));
        assert_eq!(app.app_or_service_name(), "blog");
        assert_eq!(app.environment(), "prod");

        let svc = RequestRecord::new("b", "api_service", json!({"service_name": "orders"}));
        assert_eq!(svc.app_or_service_name(), "orders");
        assert_eq!(svc.environment(), DEFAULT_ENVIRONMENT);

        let bare = RequestRecord::new("c", "web_app", json!({"app_name": ""}));
        assert_eq!(bare.app_or_service_name(), DEFAULT_INSTANCE_NAME);
    }

    #[test]
    fn test_mark_completed_forces_object_outputs() {
        let mut record = RequestRecord::new("r1", "web_app", json!({}));
        record.mark_completed(Value::Null);
        assert_eq!(record.status, RequestStatus::Completed);
        assert_eq!(record.terraform_output, Some(json!({})));
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&RequestStatus::Failed).unwrap(), "\"FAILED\"");
        assert_eq!(RequestStatus::Completed.partition(), Partition::Completed);
        assert!(RequestStatus::Failed.is_terminal());
        assert!(!RequestStatus::Processing.is_terminal());
    }

    #[test]
    fn test_resource_type_parsing() {
        assert_eq!("WEB_APP".parse::<ResourceType>().unwrap(), ResourceType::WebApp);
        assert!(matches!(
            "unknown_type".parse::<ResourceType>(),
            Err(CoreError::InvalidRecord(_))
        ));
    }
}
