//! # stratus_core
//!
//! Shared building blocks for the Stratus provisioning queue.
//!
//! This crate defines the request record that travels through the queue
//! partitions, the supported resource types, and the configuration that
//! tells every component where the queue, templates and instances live.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stratus_core::{RequestRecord, StratusConfig};
//! use serde_json::json;
//!
//! let config = StratusConfig::from_root("/srv/stratus");
//! let record = RequestRecord::new("r1", "web_app", json!({"app_name": "blog"}))
//!     .with_requester("alice");
//!
//! assert_eq!(config.queue_root, std::path::PathBuf::from("/srv/stratus/queue"));
//! assert_eq!(record.app_or_service_name(), "blog");
//! ```

pub mod config;
pub mod error;
pub mod models;

pub use config::{StratusConfig, CONFIG_FILE_NAME};
pub use error::{CoreError, CoreResult};
pub use models::{Action, Partition, RequestRecord, RequestStatus, ResourceType, TFVARS_FILE};
