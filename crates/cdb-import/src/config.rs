//! Import run configuration.
//!
//! One configuration file describes one run: the connection to write to,
//! the list of import entries, and an optional version stamp recorded once
//! at the end of a successful run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cdb_graph::transport::ConnectionConfig;
use serde::{Deserialize, Serialize};

use crate::{ImportError, ImportResult};

/// Top-level configuration for one import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Where the mutations go
    pub connection: ConnectionConfig,

    /// Version stamp to record after all entries ran
    #[serde(default)]
    pub version: Option<String>,

    /// Entries processed in order
    #[serde(default)]
    pub imports: Vec<ImportEntry>,
}

/// One source to import: which creator resolves it and what it reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEntry {
    /// Creator provider name or alias
    pub creator: String,

    #[serde(default)]
    pub source: SourceConfig,
}

/// Source material handed to a creator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// File or directory to read. A directory fans out to one production
    /// task per contained file.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// When non-empty, only directory files whose stem matches one of
    /// these names (case-insensitive) are read
    #[serde(default)]
    pub allowed_acronyms: Vec<String>,

    /// Overrides the facet group the creator would otherwise assign
    #[serde(default)]
    pub facet_group: Option<String>,

    /// Creator-specific options, validated against the creator's
    /// required keys before any production starts
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl SourceConfig {
    /// The same source narrowed to a single file inside its directory
    pub fn for_file(&self, file: PathBuf) -> Self {
        Self {
            path: Some(file),
            ..self.clone()
        }
    }
}

impl ImportConfig {
    /// Loads and deserializes a configuration file (YAML, TOML or JSON,
    /// chosen by extension).
    pub fn from_file(path: &Path) -> ImportResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| ImportError::Config(format!("{}: {}", path.display(), e)))?;

        settings
            .try_deserialize()
            .map_err(|e| ImportError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Fail-fast structural validation, before any source is opened.
    pub fn validate(&self) -> ImportResult<()> {
        self.connection
            .validate()
            .map_err(|e| ImportError::Config(e.to_string()))?;

        for entry in &self.imports {
            if entry.creator.trim().is_empty() {
                return Err(ImportError::Config(
                    "import entry has an empty creator name".to_string(),
                ));
            }
            if let Some(path) = &entry.source.path {
                if !path.exists() {
                    return Err(ImportError::Config(format!(
                        "source path does not exist: {}",
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_deserializes() {
        let config: ImportConfig = serde_json::from_str(
            r#"{
                "connection": {"type": "embedded", "path": "/tmp/store.db"},
                "imports": [{"creator": "json"}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.imports.len(), 1);
        assert_eq!(config.version, None);
        assert!(config.imports[0].source.path.is_none());
    }

    #[test]
    fn test_missing_source_path_fails_validation() {
        let config = ImportConfig {
            connection: ConnectionConfig::Embedded {
                path: "/tmp/store.db".into(),
            },
            version: None,
            imports: vec![ImportEntry {
                creator: "json".to_string(),
                source: SourceConfig {
                    path: Some("/definitely/not/here.json".into()),
                    ..Default::default()
                },
            }],
        };

        assert!(matches!(config.validate(), Err(ImportError::Config(_))));
    }

    #[test]
    fn test_empty_creator_name_fails_validation() {
        let config = ImportConfig {
            connection: ConnectionConfig::Embedded {
                path: "/tmp/store.db".into(),
            },
            version: None,
            imports: vec![ImportEntry {
                creator: "  ".to_string(),
                source: SourceConfig::default(),
            }],
        };

        assert!(matches!(config.validate(), Err(ImportError::Config(_))));
    }
}
