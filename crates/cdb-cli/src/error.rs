//! CLI error type

use thiserror::Error;

/// Errors surfaced to the CLI user
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Import(#[from] cdb_import::ImportError),

    #[error("{0}")]
    Graph(#[from] cdb_graph::GraphError),

    /// The run finished but some entries failed
    #[error("import finished with {0} error(s), see the log for details")]
    RunFailed(usize),
}

pub type Result<T> = std::result::Result<T, CliError>;
