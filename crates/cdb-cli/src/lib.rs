//! CDB CLI Library
//!
//! Command-line interface for the concept database importer. One
//! invocation runs one configured import; `--show-version` reads the
//! version stamp recorded in the configured store instead.

pub mod commands;
pub mod error;

pub use error::{CliError, Result};

use clap::Parser;
use std::path::PathBuf;

/// CDB - Concept Database Importer
#[derive(Parser, Debug)]
#[command(name = "cdb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(env = "CDB_IMPORT_CONFIG")]
    pub config: PathBuf,

    /// Print the version stamp recorded in the configured store and exit
    #[arg(long)]
    pub show_version: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
