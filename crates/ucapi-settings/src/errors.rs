//! Errors from loading settings and the driver description.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Parsed, but out of range or inconsistent.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
    /// The driver description parsed but is unusable.
    #[error("invalid driver description {}: {reason}", path.display())]
    InvalidMetadata { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;
