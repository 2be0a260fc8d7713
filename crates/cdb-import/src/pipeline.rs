//! Batch production pipeline.
//!
//! Resolves the creator for an import entry, validates the entry before
//! anything is read, and produces the lazy batch stream. A directory
//! source fans out to one production task per file; their batches are
//! merged through a small bounded channel, so at most a couple of batches
//! exist in memory no matter how many files the directory holds. Batches
//! from different files may interleave; concepts within a batch never do.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::batch::BatchStream;
use crate::config::{ImportEntry, SourceConfig};
use crate::registry::{ConceptCreator, ProviderRegistry};
use crate::{ImportError, ImportResult};

/// Batches buffered across all production tasks of one directory source
const MERGE_BUFFER: usize = 2;

/// Resolves creators and produces batch streams for import entries.
pub struct CreationPipeline {
    registry: Arc<ProviderRegistry>,
}

impl CreationPipeline {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Produces the batch stream for one import entry.
    ///
    /// Resolution and validation failures surface here, before any source
    /// is opened. Per-file production failures inside a directory source
    /// surface later, as error items in the stream.
    pub async fn produce(&self, entry: &ImportEntry) -> ImportResult<BatchStream> {
        let creator = self.registry.find_creator(&entry.creator)?;
        validate_source(creator.as_ref(), &entry.source)?;

        let batches = match &entry.source.path {
            Some(path) if path.is_dir() => self.produce_directory(creator, &entry.source, path)?,
            _ => creator.produce(&entry.source).await?,
        };

        // Mapping policy is applied here, not in creators: raw records
        // become validated mappings or fail the batch.
        Ok(batches
            .map(|item| {
                item.and_then(|mut batch| {
                    let records = std::mem::take(&mut batch.mapping_records);
                    batch.mappings = crate::mappings::filter_mappings(records)?;
                    Ok(batch)
                })
            })
            .boxed())
    }

    fn produce_directory(
        &self,
        creator: Arc<dyn ConceptCreator>,
        source: &SourceConfig,
        dir: &Path,
    ) -> ImportResult<BatchStream> {
        let files = directory_files(dir, &source.allowed_acronyms)?;
        info!(dir = %dir.display(), files = files.len(), "Fanning out directory source");

        let (tx, rx) = mpsc::channel(MERGE_BUFFER);
        for file in files {
            let creator = Arc::clone(&creator);
            let tx = tx.clone();
            let file_source = source.for_file(file.clone());
            tokio::spawn(async move {
                match creator.produce(&file_source).await {
                    Ok(mut batches) => {
                        while let Some(item) = batches.next().await {
                            if tx.send(item).await.is_err() {
                                // Consumer went away; stop producing.
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        error!(file = %file.display(), error = %e, "Source file failed to produce");
                        let _ = tx.send(Err(e)).await;
                    }
                }
            });
        }
        drop(tx);

        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Checks required option keys and path existence before production.
fn validate_source(creator: &dyn ConceptCreator, source: &SourceConfig) -> ImportResult<()> {
    for key in creator.required_keys() {
        if !source.options.contains_key(*key) {
            return Err(ImportError::Config(format!(
                "creator '{}' requires option '{}'",
                creator.name(),
                key
            )));
        }
    }
    if let Some(path) = &source.path {
        if !path.exists() {
            return Err(ImportError::Config(format!(
                "source path does not exist: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Lists the files of a directory source, applying the acronym allow-list
/// to file stems and sorting by name for deterministic spawn order.
fn directory_files(dir: &Path, allowed_acronyms: &[String]) -> ImportResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if !stem_allowed(&path, allowed_acronyms) {
            debug!(file = %path.display(), "Skipping file outside the acronym allow-list");
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn stem_allowed(path: &Path, allowed_acronyms: &[String]) -> bool {
    if allowed_acronyms.is_empty() {
        return true;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    allowed_acronyms.iter().any(|a| a.eq_ignore_ascii_case(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderRegistry;
    use std::io::Write;

    fn write_document(dir: &Path, name: &str, custom_id: &str) {
        let body = format!(
            r#"{{"facet": {{"name": "{custom_id}", "group": "g", "short_name": "s", "custom_id": "{custom_id}"}}, "concepts": []}}"#
        );
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    fn entry(path: PathBuf, allowed: &[&str]) -> ImportEntry {
        ImportEntry {
            creator: "json".to_string(),
            source: SourceConfig {
                path: Some(path),
                allowed_acronyms: allowed.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_directory_source_yields_all_files() {
        let dir = tempfile::tempdir().unwrap();
        write_document(dir.path(), "mesh.json", "facet.mesh");
        write_document(dir.path(), "ncbi.json", "facet.ncbi");

        let pipeline = CreationPipeline::new(Arc::new(ProviderRegistry::with_defaults()));
        let mut batches = pipeline
            .produce(&entry(dir.path().to_path_buf(), &[]))
            .await
            .unwrap();

        let mut ids = Vec::new();
        while let Some(batch) = batches.next().await {
            ids.push(batch.unwrap().facet.custom_id);
        }
        ids.sort();
        assert_eq!(ids, vec!["facet.mesh", "facet.ncbi"]);
    }

    #[tokio::test]
    async fn test_acronym_allow_list_filters_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        write_document(dir.path(), "MESH.json", "facet.mesh");
        write_document(dir.path(), "go.json", "facet.go");

        let pipeline = CreationPipeline::new(Arc::new(ProviderRegistry::with_defaults()));
        let mut batches = pipeline
            .produce(&entry(dir.path().to_path_buf(), &["mesh"]))
            .await
            .unwrap();

        let batch = batches.next().await.unwrap().unwrap();
        assert_eq!(batch.facet.custom_id, "facet.mesh");
        assert!(batches.next().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_file_surfaces_as_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        write_document(dir.path(), "good.json", "facet.good");
        std::fs::write(dir.path().join("bad.json"), b"not json").unwrap();

        let pipeline = CreationPipeline::new(Arc::new(ProviderRegistry::with_defaults()));
        let mut batches = pipeline
            .produce(&entry(dir.path().to_path_buf(), &[]))
            .await
            .unwrap();

        let mut ok = 0;
        let mut failed = 0;
        while let Some(item) = batches.next().await {
            match item {
                Ok(_) => ok += 1,
                Err(_) => failed += 1,
            }
        }
        assert_eq!((ok, failed), (1, 1));
    }

    #[tokio::test]
    async fn test_mapping_policy_is_applied_to_produced_batches() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{
            "facet": {"name": "GO", "group": "bio", "short_name": "GO", "custom_id": "facet.go"},
            "concepts": [],
            "mappings": [
                {"classes": ["a", "b"], "mapping_type": "SAME_URI"},
                {"classes": ["a", "b"], "mapping_type": "EXACT", "process": "pending"},
                {"classes": ["a", "c"], "mapping_type": "EXACT"}
            ]
        }"#;
        let path = dir.path().join("go.json");
        std::fs::write(&path, body).unwrap();

        let pipeline = CreationPipeline::new(Arc::new(ProviderRegistry::with_defaults()));
        let mut batches = pipeline.produce(&entry(path, &[])).await.unwrap();

        let batch = batches.next().await.unwrap().unwrap();
        assert!(batch.mapping_records.is_empty());
        assert_eq!(batch.mappings.len(), 1);
        assert_eq!(batch.mappings[0].to, "c");
    }

    #[tokio::test]
    async fn test_malformed_mapping_fails_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{
            "facet": {"name": "GO", "group": "bio", "short_name": "GO", "custom_id": "facet.go"},
            "concepts": [],
            "mappings": [{"classes": ["a", "b", "c"], "mapping_type": "EXACT"}]
        }"#;
        let path = dir.path().join("go.json");
        std::fs::write(&path, body).unwrap();

        let pipeline = CreationPipeline::new(Arc::new(ProviderRegistry::with_defaults()));
        let mut batches = pipeline.produce(&entry(path, &[])).await.unwrap();

        assert!(matches!(
            batches.next().await,
            Some(Err(ImportError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_unknown_creator_fails_before_production() {
        let pipeline = CreationPipeline::new(Arc::new(ProviderRegistry::with_defaults()));
        let result = pipeline
            .produce(&ImportEntry {
                creator: "nope".to_string(),
                source: SourceConfig::default(),
            })
            .await;
        assert!(matches!(result, Err(ImportError::ProviderNotFound(_))));
    }
}
