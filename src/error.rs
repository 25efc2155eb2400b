//! Error type shared by the library.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StabilityError {
    /// Invalid or missing run configuration; nothing was computed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every fallback for a strict source failed.
    #[error("source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The final report write failed.
    #[error("failed to persist report to {destination}: {reason}")]
    Persistence { destination: String, reason: String },

    #[error("report computation exceeded {0:?}")]
    Timeout(std::time::Duration),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StabilityError>;

impl StabilityError {
    pub fn store(reason: impl std::fmt::Display) -> Self {
        StabilityError::Store(reason.to_string())
    }
}
