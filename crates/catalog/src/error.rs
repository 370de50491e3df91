//! Error types for the catalog crate.

use thiserror::Error;

/// Errors that can occur while loading or searching the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A search or listing produced zero scenes.
    #[error("no hits: {0}")]
    EmptyInput(String),

    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid catalog record at line {line}: {message}")]
    InvalidRecord { line: u64, message: String },

    #[error("invalid search argument: {0}")]
    InvalidArgument(String),

    #[error("invalid scene file name: {0}")]
    InvalidFileName(String),

    #[error("S3 listing failed: {0}")]
    S3(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    /// Create an EmptyInput error.
    pub fn no_hits(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    /// Create an InvalidRecord error.
    pub fn invalid_record(line: u64, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            line,
            message: message.into(),
        }
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
