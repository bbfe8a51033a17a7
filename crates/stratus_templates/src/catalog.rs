//! Resource type to template resolution.

use std::path::{Path, PathBuf};

use stratus_core::ResourceType;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{TemplateError, TemplateResult};

/// Template directory used for a resource type.
pub fn template_for(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::WebApp => "web-app",
        ResourceType::ApiService => "api-service",
    }
}

/// Catalog of templates under a templates root.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates_root: PathBuf,
}

impl TemplateCatalog {
    pub fn new(templates_root: impl Into<PathBuf>) -> Self {
        Self {
            templates_root: templates_root.into(),
        }
    }

    pub fn templates_root(&self) -> &Path {
        &self.templates_root
    }

    /// Map a raw `resource_type` to its template name. Touches nothing on
    /// disk.
    pub fn resolve(&self, resource_type: &str) -> TemplateResult<&'static str> {
        resource_type
            .parse::<ResourceType>()
            .map(template_for)
            .map_err(|_| TemplateError::UnsupportedResourceType(resource_type.to_string()))
    }

    /// Directory of a template, failing if it does not exist.
    pub fn template_dir(&self, template_name: &str) -> TemplateResult<PathBuf> {
        let dir = self.templates_root.join(template_name);
        if !dir.is_dir() {
            let available = self.available();
            return Err(TemplateError::TemplateNotFound(format!(
                "{} (looked in {}; available: {})",
                template_name,
                self.templates_root.display(),
                if available.is_empty() { "none".to_string() } else { available.join(", ") }
            )));
        }
        Ok(dir)
    }

    /// Names of the template directories currently present.
    pub fn available(&self) -> Vec<String> {
        if !self.templates_root.exists() {
            warn!("Templates directory does not exist: {:?}", self.templates_root);
            return Vec::new();
        }

        let mut names: Vec<String> = WalkDir::new(&self.templates_root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .collect();
        names.sort();
        debug!("Found {} template(s)", names.len());
        names
    }
}
