//! Built-in concept creators.
//!
//! Specialized source-format readers live in their own crates and plug in
//! through the registry; the JSON document creator here covers bootstrap
//! and test fixtures and doubles as the reference implementation of the
//! [`ConceptCreator`](crate::registry::ConceptCreator) contract.

use async_trait::async_trait;
use cdb_common::types::{Concept, Facet, MappingRecord};
use serde::Deserialize;
use tracing::debug;

use crate::batch::{single_batch, BatchStream, ConceptBatch};
use crate::config::SourceConfig;
use crate::registry::ConceptCreator;
use crate::{ImportError, ImportResult};

/// On-disk shape read by [`JsonFileCreator`]: one facet with its concepts
/// and raw mapping records
#[derive(Debug, Deserialize)]
struct FacetDocument {
    facet: Facet,
    #[serde(default)]
    concepts: Vec<Concept>,
    #[serde(default)]
    mappings: Vec<MappingRecord>,
}

/// Reads facet documents from JSON files.
///
/// A file holds one facet and its concepts; a directory source fans out
/// to one batch per file.
#[derive(Default)]
pub struct JsonFileCreator;

impl JsonFileCreator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConceptCreator for JsonFileCreator {
    fn name(&self) -> &str {
        "cdb.creators.json-file"
    }

    fn aliases(&self) -> &[&str] {
        &["json"]
    }

    async fn produce(&self, source: &SourceConfig) -> ImportResult<BatchStream> {
        let path = source.path.as_ref().ok_or_else(|| {
            ImportError::Config("json-file creator requires a source path".to_string())
        })?;

        let bytes = tokio::fs::read(path).await?;
        let document: FacetDocument = serde_json::from_slice(&bytes).map_err(|e| {
            ImportError::Validation(format!("{}: {}", path.display(), e))
        })?;

        let mut facet = document.facet;
        if let Some(group) = &source.facet_group {
            facet.group = group.clone();
        }
        debug!(facet = %facet, concepts = document.concepts.len(), file = %path.display(), "Read facet document");

        Ok(single_batch(
            ConceptBatch::from_concepts(facet, document.concepts)
                .with_mapping_records(document.mappings),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;

    fn write_fixture(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_reads_facet_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "mesh.json",
            r#"{
                "facet": {"name": "Diseases", "group": "medical", "short_name": "DIS", "custom_id": "facet.dis"},
                "concepts": [
                    {"pref_name": "Asthma", "coordinates": {"original_id": "D001249", "source": "MESH"}}
                ]
            }"#,
        );

        let source = SourceConfig {
            path: Some(path),
            facet_group: Some("override".to_string()),
            ..Default::default()
        };
        let mut batches = JsonFileCreator::new().produce(&source).await.unwrap();

        let batch = batches.next().await.unwrap().unwrap();
        assert_eq!(batch.facet.group, "override");
        assert!(batches.next().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_document_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "bad.json", "{\"facet\": 42}");

        let source = SourceConfig {
            path: Some(path),
            ..Default::default()
        };
        let result = JsonFileCreator::new().produce(&source).await;
        assert!(matches!(result, Err(ImportError::Validation(_))));
    }
}
