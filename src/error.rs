use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum JournalError {
    /// Malformed trade-log input: missing required column, unreadable file.
    #[error("Invalid trade log: {0}")]
    FormatError(String),

    /// Backup documents or user input that fail shape checks.
    #[error("Invalid data: {0}")]
    ValidationError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] ApiError),

    #[error("Storage quota exceeded: {0}")]
    StorageQuotaError(String),

    #[error("Local cache error: {0}")]
    CacheError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<rusqlite::Error> for JournalError {
    fn from(err: rusqlite::Error) -> Self {
        JournalError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        JournalError::ValidationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JournalError>;
