//! Error types for compositing.

use thiserror::Error;

/// Errors that can occur while reading, accumulating or writing composites.
#[derive(Error, Debug)]
pub enum CompositeError {
    /// Nothing to accumulate.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A scene's companion raster could not be located, fetched or decoded.
    #[error("source unavailable: {href}: {reason}")]
    SourceUnavailable { href: String, reason: String },

    /// Two arrays being combined have different shapes.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// The same scene id was passed more than once.
    #[error("duplicate scene id {0}")]
    DuplicateScene(String),

    /// A dated scene has no retained per-scene arrays.
    #[error("no retained arrays for scene {0}")]
    MissingSceneArrays(String),

    /// Raster bytes could not be decoded as a georeferenced GeoTIFF.
    #[error("decode error: {0}")]
    Decode(String),

    /// Raster could not be encoded or written.
    #[error("write error: {0}")]
    Write(String),

    /// Bounds that cannot be mapped to a pixel window.
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// Accumulation was cancelled before completion.
    #[error("accumulation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompositeError {
    /// Create a SourceUnavailable error.
    pub fn source_unavailable(href: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            href: href.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a Decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an InvalidBounds error.
    pub fn invalid_bounds(msg: impl Into<String>) -> Self {
        Self::InvalidBounds(msg.into())
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Check shapes before an element-wise operation.
    pub fn check_shape(expected: (usize, usize), found: (usize, usize)) -> Result<()> {
        if expected != found {
            return Err(Self::ShapeMismatch { expected, found });
        }
        Ok(())
    }

    /// True for errors a [`SourceFailurePolicy::Skip`](crate::SourceFailurePolicy)
    /// may pass over.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

/// Result type for compositing operations.
pub type Result<T> = std::result::Result<T, CompositeError>;
