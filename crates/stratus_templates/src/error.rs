//! Error types for templates.

use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while resolving or instantiating a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Instantiation failed: {0}")]
    InstantiationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
