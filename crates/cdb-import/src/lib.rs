//! Import pipeline for the concept database.
//!
//! Turns heterogeneous source material into facet-grouped concept batches
//! and writes them through a [`cdb_graph::GraphTransport`] as idempotent
//! mutation statements. Source-format readers plug in as [`ConceptCreator`]
//! providers; storage backends plug in as [`BatchInserter`] providers, both
//! resolved through the [`ProviderRegistry`].

pub mod batch;
pub mod config;
pub mod creators;
pub mod dialect;
pub mod inserter;
pub mod mappings;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod versioning;

pub use batch::{BatchStream, ConceptBatch, ConceptStream};
pub use config::{ImportConfig, ImportEntry, SourceConfig};
pub use creators::JsonFileCreator;
pub use dialect::{dialect_for, CypherDialect, SqlDialect, StatementDialect};
pub use inserter::{GraphServerInserter, InsertOutcome, InsertionCoordinator, RelationalInserter};
pub use mappings::filter_mappings;
pub use pipeline::CreationPipeline;
pub use registry::{BatchInserter, ConceptCreator, ProviderRegistry};
pub use runner::{EntryReport, ImportRunner, RunReport};
pub use versioning::{VersionGuard, VersionOutcome};

use thiserror::Error;

/// Errors produced while resolving, producing, or inserting imports.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No provider registered for '{0}'")]
    ProviderNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insertion error: {0}")]
    Insertion(String),

    #[error("Versioning error: {0}")]
    Versioning(String),

    #[error("Graph error: {0}")]
    Graph(#[from] cdb_graph::GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for import operations.
pub type ImportResult<T> = std::result::Result<T, ImportError>;
