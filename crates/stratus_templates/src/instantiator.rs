//! Template instantiation into per-request working directories.
//!
//! The instantiator handles:
//! - Exclusive creation of a uniquely named instance directory
//! - Copying template files into it
//! - Writing the request configuration as Terraform variables

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use stratus_core::TFVARS_FILE;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::catalog::TemplateCatalog;
use crate::error::{TemplateError, TemplateResult};

/// Upper bound on collision suffixes tried for one base name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// A materialized instance directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDir {
    /// Final directory name (base name plus any collision suffix).
    pub name: String,
    /// Absolute or root-relative path of the directory.
    pub path: PathBuf,
}

/// Copies templates into fresh instance directories.
#[derive(Debug, Clone)]
pub struct TemplateInstantiator {
    catalog: TemplateCatalog,
    instances_root: PathBuf,
}

impl TemplateInstantiator {
    pub fn new(templates_root: impl Into<PathBuf>, instances_root: impl Into<PathBuf>) -> Self {
        Self {
            catalog: TemplateCatalog::new(templates_root),
            instances_root: instances_root.into(),
        }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn instances_root(&self) -> &Path {
        &self.instances_root
    }

    /// Materialize `template_name` as a new instance named after
    /// `instance_name`, with `resource_config` written to [`TFVARS_FILE`].
    pub fn instantiate(
        &self,
        template_name: &str,
        instance_name: &str,
        resource_config: &Value,
    ) -> TemplateResult<InstanceDir> {
        let template_dir = self.catalog.template_dir(template_name)?;
        let tfvars = render_tfvars(resource_config)?;

        let instance = self.create_unique_dir(instance_name)?;
        info!(
            "Instantiating template '{}' as {:?}",
            template_name, instance.path
        );

        let populate = copy_template(&template_dir, &instance.path)
            .and_then(|copied| {
                fs::write(instance.path.join(TFVARS_FILE), &tfvars)?;
                Ok(copied)
            });

        match populate {
            Ok(copied) => {
                debug!("Copied {} file(s) into {}", copied, instance.name);
                Ok(instance)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&instance.path) {
                    warn!("Failed to remove partial instance {:?}: {}", instance.path, cleanup);
                }
                Err(TemplateError::InstantiationError(format!(
                    "populating {}: {}",
                    instance.name, e
                )))
            }
        }
    }

    /// Create `base`, or `base-2`, `base-3`, ... if taken. `create_dir` is
    /// exclusive, so concurrent processors never share a directory.
    fn create_unique_dir(&self, base: &str) -> TemplateResult<InstanceDir> {
        fs::create_dir_all(&self.instances_root).map_err(|e| {
            TemplateError::InstantiationError(format!(
                "creating instances root {}: {}",
                self.instances_root.display(),
                e
            ))
        })?;

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let name = if attempt == 1 {
                base.to_string()
            } else {
                format!("{}-{}", base, attempt)
            };
            let path = self.instances_root.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => return Ok(InstanceDir { name, path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Instance name {} taken, trying next suffix", name);
                }
                Err(e) => {
                    return Err(TemplateError::InstantiationError(format!(
                        "creating {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(TemplateError::InstantiationError(format!(
            "no free instance name for {} after {} attempts",
            base, MAX_NAME_ATTEMPTS
        )))
    }
}

/// Serialize the request configuration as Terraform JSON variables.
fn render_tfvars(resource_config: &Value) -> TemplateResult<String> {
    match resource_config {
        Value::Object(_) => Ok(serde_json::to_string_pretty(resource_config)?),
        Value::Null => Ok("{}".to_string()),
        other => Err(TemplateError::InstantiationError(format!(
            "resource_config must be a JSON object, got {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Engine-local artifacts that must never leak from a template into an
/// instance.
fn is_engine_artifact(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name == ".terraform" || name == "tfplan" || name.contains(".tfstate")
}

fn copy_template(template_dir: &Path, target: &Path) -> std::io::Result<usize> {
    let mut copied = 0;

    let walker = WalkDir::new(template_dir)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_engine_artifact(e));

    for entry in walker {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(template_dir)
            .map_err(std::io::Error::other)?;
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
            copied += 1;
        }
    }

    Ok(copied)
}
