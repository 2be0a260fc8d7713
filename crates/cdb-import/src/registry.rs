//! Provider registry for concept creators and batch inserters.
//!
//! Creators are matched by name (or alias) from the import configuration;
//! inserters are matched against the connection configuration. Lookup walks
//! providers in registration order and takes the first match, so resolution
//! is deterministic for a given registration sequence.

use std::sync::Arc;

use async_trait::async_trait;
use cdb_graph::transport::{ConnectionConfig, GraphTransport};
use tracing::debug;

use crate::batch::{BatchStream, ConceptBatch};
use crate::config::SourceConfig;
use crate::inserter::InsertOutcome;
use crate::{ImportError, ImportResult};

/// Produces facet batches from a configured source.
#[async_trait]
pub trait ConceptCreator: Send + Sync {
    /// Canonical provider name, e.g. `cdb.creators.json-file`.
    fn name(&self) -> &str;

    /// Shorthand names this creator also answers to.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Option keys that must be present in the source configuration.
    fn required_keys(&self) -> &[&str] {
        &[]
    }

    /// Whether `name` from an import entry selects this creator.
    fn accepts_name(&self, name: &str) -> bool {
        self.name() == name || self.aliases().iter().any(|a| *a == name)
    }

    /// Lazily produces the batches described by `source`.
    async fn produce(&self, source: &SourceConfig) -> ImportResult<BatchStream>;
}

/// Writes a facet batch through a transport as idempotent mutations.
#[async_trait]
pub trait BatchInserter: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this inserter handles the given connection kind.
    fn accepts(&self, connection: &ConnectionConfig) -> bool;

    /// Inserts one batch, returning whether it was written or skipped.
    async fn insert(
        &self,
        transport: &dyn GraphTransport,
        batch: ConceptBatch,
    ) -> ImportResult<InsertOutcome>;
}

/// Registry of creator and inserter providers.
#[derive(Default)]
pub struct ProviderRegistry {
    creators: Vec<Arc<dyn ConceptCreator>>,
    inserters: Vec<Arc<dyn BatchInserter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_creator(Arc::new(crate::creators::JsonFileCreator::new()));
        registry.register_inserter(Arc::new(crate::inserter::GraphServerInserter::new()));
        registry.register_inserter(Arc::new(crate::inserter::RelationalInserter::new()));
        registry
    }

    pub fn register_creator(&mut self, creator: Arc<dyn ConceptCreator>) {
        debug!(provider = creator.name(), "Registering concept creator");
        self.creators.push(creator);
    }

    pub fn register_inserter(&mut self, inserter: Arc<dyn BatchInserter>) {
        debug!(provider = inserter.name(), "Registering batch inserter");
        self.inserters.push(inserter);
    }

    /// Resolves a creator by name or alias, first registered wins.
    pub fn find_creator(&self, name: &str) -> ImportResult<Arc<dyn ConceptCreator>> {
        self.creators
            .iter()
            .find(|c| c.accepts_name(name))
            .cloned()
            .ok_or_else(|| ImportError::ProviderNotFound(name.to_string()))
    }

    /// Resolves the inserter handling the given connection kind.
    pub fn find_inserter(
        &self,
        connection: &ConnectionConfig,
    ) -> ImportResult<Arc<dyn BatchInserter>> {
        self.inserters
            .iter()
            .find(|i| i.accepts(connection))
            .cloned()
            .ok_or_else(|| ImportError::ProviderNotFound(connection.to_string()))
    }

    pub fn creator_names(&self) -> Vec<&str> {
        self.creators.iter().map(|c| c.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::single_batch;
    use cdb_common::types::Facet;

    struct StubCreator {
        name: &'static str,
        aliases: &'static [&'static str],
    }

    #[async_trait]
    impl ConceptCreator for StubCreator {
        fn name(&self) -> &str {
            self.name
        }

        fn aliases(&self) -> &[&str] {
            self.aliases
        }

        async fn produce(&self, _source: &SourceConfig) -> ImportResult<BatchStream> {
            Ok(single_batch(ConceptBatch::from_concepts(
                Facet::new(self.name, "g", "s", self.name),
                Vec::new(),
            )))
        }
    }

    #[test]
    fn test_find_creator_by_name_and_alias() {
        let mut registry = ProviderRegistry::new();
        registry.register_creator(Arc::new(StubCreator {
            name: "cdb.creators.mesh",
            aliases: &["mesh"],
        }));

        assert_eq!(
            registry.find_creator("cdb.creators.mesh").unwrap().name(),
            "cdb.creators.mesh"
        );
        assert_eq!(registry.find_creator("mesh").unwrap().name(), "cdb.creators.mesh");
        assert!(matches!(
            registry.find_creator("missing"),
            Err(ImportError::ProviderNotFound(_))
        ));
    }

    #[test]
    fn test_first_registered_creator_wins() {
        let mut registry = ProviderRegistry::new();
        registry.register_creator(Arc::new(StubCreator {
            name: "first",
            aliases: &["shared"],
        }));
        registry.register_creator(Arc::new(StubCreator {
            name: "second",
            aliases: &["shared"],
        }));

        // Same lookup always resolves to the same provider.
        for _ in 0..3 {
            assert_eq!(registry.find_creator("shared").unwrap().name(), "first");
        }
    }

    #[test]
    fn test_find_inserter_matches_connection_kind() {
        let registry = ProviderRegistry::with_defaults();

        let embedded = ConnectionConfig::Embedded {
            path: "/tmp/store.db".into(),
        };
        let http = ConnectionConfig::Http {
            base_url: "http://localhost:7474/db/data/transaction/commit".to_string(),
            user: None,
            password: None,
            timeout_secs: 300,
        };

        assert_eq!(
            registry.find_inserter(&embedded).unwrap().name(),
            "cdb.inserters.relational"
        );
        assert_eq!(
            registry.find_inserter(&http).unwrap().name(),
            "cdb.inserters.graph-server"
        );
    }
}
