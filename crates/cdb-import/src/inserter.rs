//! Batch insertion with facet-level idempotency.
//!
//! A batch becomes one transport execution: replayable schema statements,
//! a facet probe, then conditional inserts for the facet, its concepts and
//! their parent edges. The probe result decides the outcome after the
//! fact; because every insert is conditional, a probe that lost a race
//! against a concurrent import still commits harmlessly as a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use cdb_graph::transport::{ConnectionConfig, GraphTransport};
use cdb_graph::TransportResponse;
use futures::TryStreamExt;
use tracing::debug;

use crate::batch::ConceptBatch;
use crate::dialect::{CypherDialect, SqlDialect, StatementDialect, CONCEPT_CHUNK_SIZE};
use crate::registry::BatchInserter;
use crate::{ImportError, ImportResult};

/// What happened to a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The facet was new; all concepts were written
    Inserted { concepts: usize },
    /// A facet with this custom id already exists. An identical replay
    /// writes nothing; a batch that differs from the original may still
    /// land individual rows through the conditional inserts, since they
    /// travel in the same transaction as the probe.
    SkippedExisting,
}

/// Dialect-driven insertion shared by the inserter providers.
pub struct InsertionCoordinator {
    dialect: Arc<dyn StatementDialect>,
    chunk_size: usize,
}

impl InsertionCoordinator {
    pub fn new(dialect: Arc<dyn StatementDialect>) -> Self {
        Self {
            dialect,
            chunk_size: CONCEPT_CHUNK_SIZE,
        }
    }

    /// Inserts one facet batch as a single transaction.
    ///
    /// Draining the concept stream happens before execution because the
    /// statement sequence must be complete when handed to the transport;
    /// memory stays bounded per batch, not per run.
    pub async fn insert(
        &self,
        transport: &dyn GraphTransport,
        batch: ConceptBatch,
    ) -> ImportResult<InsertOutcome> {
        let ConceptBatch {
            facet,
            concepts,
            mappings,
            ..
        } = batch;

        let mut statements = self.dialect.schema_statements();
        let probe_index = statements.len();
        statements.push(self.dialect.facet_probe(&facet.custom_id));
        statements.push(self.dialect.facet_insert(&facet));

        let mut concept_count = 0usize;
        let mut chunks = concepts.try_chunks(self.chunk_size);
        while let Some(chunk) = chunks.try_next().await.map_err(|e| e.1)? {
            concept_count += chunk.len();
            statements.extend(self.dialect.concept_chunk(&facet, &chunk));
        }
        for chunk in mappings.chunks(self.chunk_size) {
            statements.extend(self.dialect.mapping_chunk(chunk));
        }

        let response = transport
            .execute(&statements)
            .await
            .map_err(|e| ImportError::Insertion(format!("{}: {}", facet, e)))?;
        let results = drain_checked(response, &facet.to_string()).await?;

        let existing = results
            .get(probe_index)
            .and_then(|r| r.first_i64())
            .unwrap_or(0);
        if existing > 0 {
            debug!(facet = %facet, "Facet already present, batch not written");
            Ok(InsertOutcome::SkippedExisting)
        } else {
            Ok(InsertOutcome::Inserted {
                concepts: concept_count,
            })
        }
    }
}

/// Drains a response fully and turns protocol errors into insertion
/// errors. The transaction only committed if the error list is empty.
async fn drain_checked(
    mut response: TransportResponse,
    subject: &str,
) -> ImportResult<Vec<cdb_graph::QueryResult>> {
    let results = response
        .collect_results()
        .await
        .map_err(|e| ImportError::Insertion(format!("{}: {}", subject, e)))?;

    let errors = response.errors();
    if !errors.is_empty() {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ImportError::Insertion(format!("{}: {}", subject, joined)));
    }

    response.close();
    Ok(results)
}

// ============================================================================
// Providers
// ============================================================================

/// Inserter for the transactional HTTP graph server.
pub struct GraphServerInserter {
    coordinator: InsertionCoordinator,
}

impl GraphServerInserter {
    pub fn new() -> Self {
        Self {
            coordinator: InsertionCoordinator::new(Arc::new(CypherDialect)),
        }
    }
}

impl Default for GraphServerInserter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchInserter for GraphServerInserter {
    fn name(&self) -> &str {
        "cdb.inserters.graph-server"
    }

    fn accepts(&self, connection: &ConnectionConfig) -> bool {
        matches!(connection, ConnectionConfig::Http { .. })
    }

    async fn insert(
        &self,
        transport: &dyn GraphTransport,
        batch: ConceptBatch,
    ) -> ImportResult<InsertOutcome> {
        self.coordinator.insert(transport, batch).await
    }
}

/// Inserter for the embedded store and the session protocol.
pub struct RelationalInserter {
    coordinator: InsertionCoordinator,
}

impl RelationalInserter {
    pub fn new() -> Self {
        Self {
            coordinator: InsertionCoordinator::new(Arc::new(SqlDialect)),
        }
    }
}

impl Default for RelationalInserter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchInserter for RelationalInserter {
    fn name(&self) -> &str {
        "cdb.inserters.relational"
    }

    fn accepts(&self, connection: &ConnectionConfig) -> bool {
        matches!(
            connection,
            ConnectionConfig::Embedded { .. } | ConnectionConfig::Session { .. }
        )
    }

    async fn insert(
        &self,
        transport: &dyn GraphTransport,
        batch: ConceptBatch,
    ) -> ImportResult<InsertOutcome> {
        self.coordinator.insert(transport, batch).await
    }
}
