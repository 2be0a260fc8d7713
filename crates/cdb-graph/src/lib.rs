//! CDB Graph Layer
//!
//! Transport-agnostic statement execution against a graph engine.
//!
//! One contract, three interchangeable backends:
//!
//! - **Embedded**: a process-local store (SQLite), one cached handle per
//!   canonical file-system path
//! - **Session**: a session/transaction protocol driven through sqlx
//! - **HTTP**: a transactional HTTP/JSON endpoint whose chunked response
//!   body is parsed incrementally, never buffered whole
//!
//! All backends expose [`transport::GraphTransport::execute`], which runs a
//! sequence of [`Statement`]s as a single transaction and returns a lazy,
//! single-pass [`TransportResponse`].

pub mod response;
pub mod statement;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use response::TransportResponse;
pub use statement::{QueryResult, ResponseError, Row, RowMeta, Statement};
pub use transport::{ConnectionConfig, GraphTransport, TransportFactory};

use thiserror::Error;

/// Result type alias for graph-layer operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Error types for statement execution and response handling
#[derive(Error, Debug)]
pub enum GraphError {
    /// Endpoint unreachable, authentication failed or malformed URI.
    /// Fatal for the import entry using this connection only.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed response body or unexpected wire content
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A single-pass response was iterated again after exhaustion or close
    #[error("Response already consumed")]
    ResponseConsumed,

    /// `single()` was called on a response with no results
    #[error("Expected exactly one result, got none")]
    NoResult,

    /// `single()` was called on a response with more than one result
    #[error("Expected exactly one result, got several")]
    MultipleResults,

    /// Statement preparation or parameter binding failed
    #[error("Statement error: {0}")]
    Statement(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session protocol error: {0}")]
    Session(#[from] sqlx::Error),

    #[error("Embedded store error: {0}")]
    Embedded(#[from] rusqlite::Error),
}
