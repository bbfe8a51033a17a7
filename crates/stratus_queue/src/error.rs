//! Error types for the queue.

use thiserror::Error;

/// Result type alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors raised by the queue store and processor.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Request not found: {0}")]
    NotFound(String),

    #[error("Request already queued: {0}")]
    Duplicate(String),

    #[error("Invalid transition for {id}: {message}")]
    InvalidTransition { id: String, message: String },

    #[error("Invalid record: {0}")]
    Core(#[from] stratus_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
