//! `cdb import` command

use std::path::Path;
use std::sync::Arc;

use cdb_import::{ImportConfig, ImportRunner, ProviderRegistry, VersionOutcome};
use tracing::info;

use crate::Result;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = ImportConfig::from_file(config_path)?;
    info!(config = %config_path.display(), entries = config.imports.len(), "Starting import run");

    let runner = ImportRunner::new(Arc::new(ProviderRegistry::with_defaults()));
    let report = runner.run(&config).await?;

    for entry in &report.entries {
        println!(
            "{}: {} batch(es) inserted, {} skipped, {} concept(s), {} error(s)",
            entry.creator,
            entry.batches_inserted,
            entry.batches_skipped,
            entry.concepts_inserted,
            entry.errors.len()
        );
    }
    match &report.version {
        Some(VersionOutcome::Set { value }) => println!("version: recorded {}", value),
        Some(VersionOutcome::AlreadySet { existing }) => {
            println!("version: already recorded as {}", existing)
        }
        None => {}
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(crate::CliError::RunFailed(report.error_count()))
    }
}
