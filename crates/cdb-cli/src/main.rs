//! CDB CLI - Main entry point

use cdb_cli::Cli;
use cdb_common::logging::{init_logging, LogConfig, LogLevel};
use clap::error::ErrorKind;
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Load .env for connection settings, ignore a missing file
    dotenvy::dotenv().ok();

    // Wrong argument count prints usage and exits 1 rather than clap's
    // default parse-error code
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return;
        }
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    let log_config = if cli.verbose {
        LogConfig::builder().level(LogLevel::Debug).build()
    } else {
        LogConfig::builder().level(LogLevel::Info).build()
    };

    // Environment variables take precedence over the verbose flag
    let log_config = if std::env::var_os("LOG_LEVEL").is_some() {
        LogConfig::from_env().unwrap_or(log_config)
    } else {
        log_config
    };
    let _ = init_logging(&log_config);

    let result = if cli.show_version {
        cdb_cli::commands::version::run(&cli.config).await
    } else {
        cdb_cli::commands::import::run(&cli.config).await
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
