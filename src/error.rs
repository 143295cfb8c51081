use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Course {0} is not part of the loaded plan")]
    UnknownCourse(String),

    #[error("No plan loaded")]
    NoPlanLoaded,

    #[error("Status update failed for course {code}: {reason}")]
    StatusUpdateFailed { code: String, reason: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Plan {doc_id} is no longer the loaded snapshot")]
    StaleSnapshot { doc_id: String },

    #[error("Document service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlanError {
    /// Collapse a failed status mutation into `StatusUpdateFailed`.
    /// Timeouts keep their own kind.
    pub fn into_status_failure(self, code: &str) -> Self {
        match self {
            PlanError::Timeout(_) | PlanError::StatusUpdateFailed { .. } => self,
            other => PlanError::StatusUpdateFailed {
                code: code.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
