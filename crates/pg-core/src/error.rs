//! Error types
//!
//! None of these reach the classification caller: extraction errors degrade to
//! default feature values, configuration errors are clamped, and persistence
//! errors are logged by the engine.

/// A failed read from a DOM-like element.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Element is detached from the document")]
    Detached,
    #[error("Style property '{0}' is unavailable")]
    StyleUnavailable(String),
    #[error("Bounding rect is unavailable")]
    GeometryUnavailable,
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    #[error("Malformed element: {0}")]
    Malformed(String),
}

/// A failed read or write against the pattern store backend.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage operation timed out after {0}ms")]
    Timeout(u64),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// An invalid configuration value. Always recovered by clamping.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Option '{field}' = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Option '{field}' is not a finite number")]
    NotFinite { field: &'static str },
    #[error("Invalid configuration document: {0}")]
    Parse(String),
}
