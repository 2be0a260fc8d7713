//! Error types for CDB

use thiserror::Error;

/// Result type alias for CDB operations
pub type Result<T> = std::result::Result<T, CdbError>;

/// Main error type for CDB
#[derive(Error, Debug)]
pub enum CdbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
