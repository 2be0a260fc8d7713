//! Run versioning.
//!
//! A version stamp is recorded once per store. The probe and the
//! conditional create travel in the same transaction, so two concurrent
//! runs cannot both record a version: the loser's create is a no-op and
//! its probe tells it so.

use std::sync::Arc;

use cdb_graph::transport::GraphTransport;
use tracing::{info, warn};

use crate::dialect::StatementDialect;
use crate::{ImportError, ImportResult};

/// Result of attempting to record a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOutcome {
    /// No version was recorded before; this value is now stored
    Set { value: String },
    /// A version was already recorded; the store is unchanged
    AlreadySet { existing: String },
}

/// Records and reads the per-store version stamp.
pub struct VersionGuard {
    dialect: Arc<dyn StatementDialect>,
}

impl VersionGuard {
    pub fn new(dialect: Arc<dyn StatementDialect>) -> Self {
        Self { dialect }
    }

    /// Records `value` unless a version is already stored.
    pub async fn set_version(
        &self,
        transport: &dyn GraphTransport,
        value: &str,
    ) -> ImportResult<VersionOutcome> {
        let mut statements = self.dialect.schema_statements();
        let probe_index = statements.len();
        statements.push(self.dialect.version_probe());
        statements.push(self.dialect.version_create(value));

        let mut response = transport
            .execute(&statements)
            .await
            .map_err(|e| ImportError::Versioning(e.to_string()))?;
        let results = response
            .collect_results()
            .await
            .map_err(|e| ImportError::Versioning(e.to_string()))?;
        if !response.errors().is_empty() {
            let joined = response
                .errors()
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ImportError::Versioning(joined));
        }

        let existing = results
            .get(probe_index)
            .and_then(|r| r.first_value())
            .and_then(|v| v.as_str())
            .map(str::to_string);

        match existing {
            Some(existing) => {
                if existing != value {
                    warn!(existing = %existing, requested = %value, "Version already recorded with a different value");
                }
                Ok(VersionOutcome::AlreadySet { existing })
            }
            None => {
                info!(version = %value, "Recorded import version");
                Ok(VersionOutcome::Set {
                    value: value.to_string(),
                })
            }
        }
    }

    /// Reads the stored version, `None` when no version was recorded.
    pub async fn get_version(
        &self,
        transport: &dyn GraphTransport,
    ) -> ImportResult<Option<String>> {
        let mut statements = self.dialect.schema_statements();
        let probe_index = statements.len();
        statements.push(self.dialect.version_probe());

        let mut response = transport
            .execute(&statements)
            .await
            .map_err(|e| ImportError::Versioning(e.to_string()))?;
        let results = response
            .collect_results()
            .await
            .map_err(|e| ImportError::Versioning(e.to_string()))?;
        if !response.errors().is_empty() {
            let joined = response
                .errors()
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ImportError::Versioning(joined));
        }

        Ok(results
            .get(probe_index)
            .and_then(|r| r.first_value())
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }
}
