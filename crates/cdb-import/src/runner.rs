//! Import run orchestration.
//!
//! Processes a configuration end to end: connect, run every entry, then
//! record the version stamp. One failing batch or entry is logged and
//! counted but never stops the run; the report carries every failure so a
//! run over many sources completes as much as it can.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info};

use crate::config::ImportConfig;
use crate::dialect::dialect_for;
use crate::inserter::InsertOutcome;
use crate::pipeline::CreationPipeline;
use crate::registry::ProviderRegistry;
use crate::versioning::{VersionGuard, VersionOutcome};
use crate::ImportResult;
use cdb_graph::TransportFactory;

/// Outcome of one import entry
#[derive(Debug, Default)]
pub struct EntryReport {
    pub creator: String,
    pub batches_inserted: usize,
    pub batches_skipped: usize,
    pub concepts_inserted: usize,
    pub errors: Vec<String>,
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    pub entries: Vec<EntryReport>,
    pub version: Option<VersionOutcome>,
    pub version_error: Option<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.version_error.is_none() && self.entries.iter().all(|e| e.errors.is_empty())
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().map(|e| e.errors.len()).sum::<usize>()
            + usize::from(self.version_error.is_some())
    }
}

/// Drives a configured import run.
pub struct ImportRunner {
    registry: Arc<ProviderRegistry>,
    factory: TransportFactory,
}

impl ImportRunner {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            factory: TransportFactory::new(),
        }
    }

    pub async fn run(&self, config: &ImportConfig) -> ImportResult<RunReport> {
        config.validate()?;

        info!(connection = %config.connection, entries = config.imports.len(), "Step 1/3: Connecting");
        let transport = self.factory.connect(&config.connection).await?;
        let inserter = self.registry.find_inserter(&config.connection)?;
        let pipeline = CreationPipeline::new(Arc::clone(&self.registry));

        info!("Step 2/3: Processing import entries");
        let mut report = RunReport::default();
        for entry in &config.imports {
            let mut entry_report = EntryReport {
                creator: entry.creator.clone(),
                ..Default::default()
            };

            match pipeline.produce(entry).await {
                Err(e) => {
                    error!(creator = %entry.creator, error = %e, "Entry failed before production");
                    entry_report.errors.push(e.to_string());
                }
                Ok(mut batches) => {
                    while let Some(item) = batches.next().await {
                        let batch = match item {
                            Ok(batch) => batch,
                            Err(e) => {
                                error!(creator = %entry.creator, error = %e, "Batch production failed");
                                entry_report.errors.push(e.to_string());
                                continue;
                            }
                        };

                        let facet = batch.facet.to_string();
                        match inserter.insert(transport.as_ref(), batch).await {
                            Ok(InsertOutcome::Inserted { concepts }) => {
                                info!(facet = %facet, concepts, "Inserted facet batch");
                                entry_report.batches_inserted += 1;
                                entry_report.concepts_inserted += concepts;
                            }
                            Ok(InsertOutcome::SkippedExisting) => {
                                info!(facet = %facet, "Facet already imported, skipping");
                                entry_report.batches_skipped += 1;
                            }
                            Err(e) => {
                                error!(facet = %facet, creator = %entry.creator, error = %e, "Batch insertion failed");
                                entry_report.errors.push(format!("{}: {}", facet, e));
                            }
                        }
                    }
                }
            }

            report.entries.push(entry_report);
        }

        info!("Step 3/3: Recording version");
        if let Some(version) = &config.version {
            let guard = VersionGuard::new(dialect_for(&config.connection));
            match guard.set_version(transport.as_ref(), version).await {
                Ok(outcome) => report.version = Some(outcome),
                Err(e) => {
                    error!(version = %version, error = %e, "Version recording failed");
                    report.version_error = Some(e.to_string());
                }
            }
        }

        if let Err(e) = transport.close().await {
            error!(error = %e, "Transport close failed");
        }

        info!(
            inserted = report.entries.iter().map(|e| e.batches_inserted).sum::<usize>(),
            skipped = report.entries.iter().map(|e| e.batches_skipped).sum::<usize>(),
            errors = report.error_count(),
            "Import run finished"
        );
        Ok(report)
    }
}
