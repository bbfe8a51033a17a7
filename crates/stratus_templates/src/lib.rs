//! # stratus_templates
//!
//! Template resolution and instance materialization.
//!
//! A template is an immutable directory of Terraform sources under the
//! templates root. Instantiating it produces a uniquely named working
//! directory under the instances root holding a copy of those sources and
//! a `terraform.tfvars.json` generated from the request's configuration.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stratus_templates::{TemplateCatalog, TemplateInstantiator, instance_base_name};
//! use serde_json::json;
//!
//! let catalog = TemplateCatalog::new("terraform/templates");
//! let template = catalog.resolve("web_app").unwrap();
//!
//! let instantiator = TemplateInstantiator::new("terraform/templates", "terraform/instances");
//! let config = json!({"app_name": "blog", "environment": "dev"});
//! let name = instance_base_name("blog", "dev", chrono::Utc::now());
//! let instance = instantiator.instantiate(template, &name, &config).unwrap();
//! println!("{}", instance.path.display());
//! ```

pub mod catalog;
pub mod error;
pub mod instantiator;
pub mod naming;

pub use catalog::TemplateCatalog;
pub use error::{TemplateError, TemplateResult};
pub use instantiator::{InstanceDir, TemplateInstantiator};
pub use stratus_core::TFVARS_FILE;
pub use naming::{instance_base_name, sanitize_component};
