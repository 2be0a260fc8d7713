//! End-to-end import tests over the embedded store.

use std::sync::Arc;

use async_trait::async_trait;
use cdb_common::types::{Concept, ConceptCoordinates, Facet};
use cdb_graph::transport::{ConnectionConfig, GraphTransport};
use cdb_graph::{
    GraphResult, QueryResult, ResponseError, Row, Statement, TransportFactory, TransportResponse,
};
use cdb_import::{
    dialect_for, ConceptBatch, ImportConfig, ImportEntry, ImportRunner, InsertOutcome,
    ProviderRegistry, RelationalInserter, SourceConfig, VersionGuard, VersionOutcome,
};
use cdb_import::registry::BatchInserter;
use serde_json::json;
use tokio::sync::Mutex;

fn sample_batch(custom_id: &str) -> ConceptBatch {
    let facet = Facet::new("Diseases", "medical", "DIS", custom_id);
    let root = Concept::new("Diseases", ConceptCoordinates::new("D000", "MESH"));
    let child = Concept::new("Asthma", ConceptCoordinates::new("D001249", "MESH"))
        .with_synonyms(vec!["Bronchial Asthma".to_string()])
        .with_parents(vec![ConceptCoordinates::new("D000", "MESH")]);
    ConceptBatch::from_concepts(facet, vec![root, child])
}

async fn count(transport: &dyn GraphTransport, sql: &str) -> i64 {
    let response = transport.execute(&[Statement::new(sql)]).await.unwrap();
    response.single().await.unwrap().first_i64().unwrap()
}

#[tokio::test]
async fn test_replayed_batch_is_skipped_and_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig::Embedded {
        path: dir.path().join("store.db"),
    };
    let factory = TransportFactory::new();
    let transport = factory.connect(&config).await.unwrap();
    let inserter = RelationalInserter::new();

    let first = inserter
        .insert(transport.as_ref(), sample_batch("facet.dis"))
        .await
        .unwrap();
    assert_eq!(first, InsertOutcome::Inserted { concepts: 2 });

    let second = inserter
        .insert(transport.as_ref(), sample_batch("facet.dis"))
        .await
        .unwrap();
    assert_eq!(second, InsertOutcome::SkippedExisting);

    assert_eq!(count(transport.as_ref(), "SELECT COUNT(*) FROM cdb_facet").await, 1);
    assert_eq!(count(transport.as_ref(), "SELECT COUNT(*) FROM cdb_concept").await, 2);
    assert_eq!(
        count(transport.as_ref(), "SELECT COUNT(*) FROM cdb_concept_edge").await,
        1
    );
}

#[tokio::test]
async fn test_distinct_facets_both_insert() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig::Embedded {
        path: dir.path().join("store.db"),
    };
    let factory = TransportFactory::new();
    let transport = factory.connect(&config).await.unwrap();
    let inserter = RelationalInserter::new();

    inserter
        .insert(transport.as_ref(), sample_batch("facet.a"))
        .await
        .unwrap();
    inserter
        .insert(transport.as_ref(), sample_batch("facet.b"))
        .await
        .unwrap();

    assert_eq!(count(transport.as_ref(), "SELECT COUNT(*) FROM cdb_facet").await, 2);
}

#[tokio::test]
async fn test_version_recorded_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig::Embedded {
        path: dir.path().join("store.db"),
    };
    let factory = TransportFactory::new();
    let transport = factory.connect(&config).await.unwrap();
    let guard = VersionGuard::new(dialect_for(&config));

    assert_eq!(guard.get_version(transport.as_ref()).await.unwrap(), None);

    let first = guard.set_version(transport.as_ref(), "2026.1").await.unwrap();
    assert_eq!(
        first,
        VersionOutcome::Set {
            value: "2026.1".to_string()
        }
    );

    let second = guard.set_version(transport.as_ref(), "2026.2").await.unwrap();
    assert_eq!(
        second,
        VersionOutcome::AlreadySet {
            existing: "2026.1".to_string()
        }
    );

    assert_eq!(
        guard.get_version(transport.as_ref()).await.unwrap(),
        Some("2026.1".to_string())
    );
}

#[tokio::test]
async fn test_runner_processes_config_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let sources = dir.path().join("sources");
    std::fs::create_dir(&sources).unwrap();
    std::fs::write(
        sources.join("mesh.json"),
        serde_json::to_vec(&json!({
            "facet": {"name": "Diseases", "group": "medical", "short_name": "DIS", "custom_id": "facet.dis"},
            "concepts": [
                {"pref_name": "Asthma", "coordinates": {"original_id": "D001249", "source": "MESH"}}
            ],
            "mappings": [
                {"classes": ["D001249", "HP:0002099"], "mapping_type": "EXACT"},
                {"classes": ["D001249", "D001249"], "mapping_type": "SAME_URI"}
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    let connection = ConnectionConfig::Embedded {
        path: dir.path().join("store.db"),
    };
    let config = ImportConfig {
        connection: connection.clone(),
        version: Some("2026.1".to_string()),
        imports: vec![ImportEntry {
            creator: "json".to_string(),
            source: SourceConfig {
                path: Some(sources.clone()),
                ..Default::default()
            },
        }],
    };

    let runner = ImportRunner::new(Arc::new(ProviderRegistry::with_defaults()));

    let report = runner.run(&config).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.entries[0].batches_inserted, 1);
    assert_eq!(report.entries[0].concepts_inserted, 1);

    {
        let factory = TransportFactory::new();
        let transport = factory.connect(&connection).await.unwrap();
        // The SAME_URI record was filtered, the EXACT one imported
        assert_eq!(
            count(transport.as_ref(), "SELECT COUNT(*) FROM cdb_mapping").await,
            1
        );
    }
    assert_eq!(
        report.version,
        Some(VersionOutcome::Set {
            value: "2026.1".to_string()
        })
    );

    // Replaying the exact same run skips everything and records nothing new
    let replay = runner.run(&config).await.unwrap();
    assert!(replay.is_success());
    assert_eq!(replay.entries[0].batches_inserted, 0);
    assert_eq!(replay.entries[0].batches_skipped, 1);
    assert_eq!(
        replay.version,
        Some(VersionOutcome::AlreadySet {
            existing: "2026.1".to_string()
        })
    );
}

#[tokio::test]
async fn test_runner_isolates_failing_entries() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("good.json"),
        serde_json::to_vec(&json!({
            "facet": {"name": "GO", "group": "bio", "short_name": "GO", "custom_id": "facet.go"},
            "concepts": []
        }))
        .unwrap(),
    )
    .unwrap();

    let config = ImportConfig {
        connection: ConnectionConfig::Embedded {
            path: dir.path().join("store.db"),
        },
        version: None,
        imports: vec![
            ImportEntry {
                creator: "no-such-creator".to_string(),
                source: SourceConfig::default(),
            },
            ImportEntry {
                creator: "json".to_string(),
                source: SourceConfig {
                    path: Some(dir.path().join("good.json")),
                    ..Default::default()
                },
            },
        ],
    };

    let runner = ImportRunner::new(Arc::new(ProviderRegistry::with_defaults()));
    let report = runner.run(&config).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.entries[0].errors.len(), 1);
    assert!(report.entries[0].errors[0].contains("no-such-creator"));
    assert_eq!(report.entries[1].batches_inserted, 1);
}

// ============================================================================
// Probe semantics against a scripted transport
// ============================================================================

/// Transport that records executions and replays scripted results.
struct ScriptedTransport {
    calls: Mutex<Vec<Vec<Statement>>>,
    results: Mutex<Vec<Vec<QueryResult>>>,
}

impl ScriptedTransport {
    fn new(results: Vec<Vec<QueryResult>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(results),
        }
    }
}

#[async_trait]
impl GraphTransport for ScriptedTransport {
    async fn execute(&self, statements: &[Statement]) -> GraphResult<TransportResponse> {
        self.calls.lock().await.push(statements.to_vec());
        let results = self.results.lock().await.remove(0);
        Ok(TransportResponse::buffered(results, Vec::new()))
    }

    async fn close(&self) -> GraphResult<()> {
        Ok(())
    }
}

fn count_result(n: i64) -> QueryResult {
    QueryResult::new(vec!["existing".to_string()], vec![Row::new(vec![json!(n)])])
}

fn empty_result() -> QueryResult {
    QueryResult::new(vec!["x".to_string()], vec![])
}

#[tokio::test]
async fn test_positive_probe_means_skip_in_a_single_execution() {
    // Schema (5) + probe + facet insert + one concept chunk
    let mut results = vec![empty_result(); 5];
    results.push(count_result(1));
    results.push(empty_result());
    results.push(empty_result());
    let transport = ScriptedTransport::new(vec![results]);

    let outcome = RelationalInserter::new()
        .insert(&transport, sample_batch("facet.dis"))
        .await
        .unwrap();

    assert_eq!(outcome, InsertOutcome::SkippedExisting);
    // Probe and conditional inserts traveled in one execution
    let calls = transport.calls.lock().await;
    assert_eq!(calls.len(), 1);
    let texts: Vec<&str> = calls[0].iter().map(|s| s.text()).collect();
    assert!(texts.iter().any(|t| t.contains("SELECT COUNT(*)")));
    assert!(texts.iter().any(|t| t.contains("INSERT INTO cdb_concept ")));
}

/// Transport whose responses carry a protocol error and no results, as an
/// engine reports a rejected statement after rolling the transaction back.
struct RejectingTransport;

#[async_trait]
impl GraphTransport for RejectingTransport {
    async fn execute(&self, _statements: &[Statement]) -> GraphResult<TransportResponse> {
        Ok(TransportResponse::buffered(
            Vec::new(),
            vec![ResponseError {
                code: "Statement.SyntaxError".to_string(),
                message: "Invalid input".to_string(),
            }],
        ))
    }

    async fn close(&self) -> GraphResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_version_read_surfaces_protocol_errors() {
    let config = ConnectionConfig::Embedded {
        path: std::path::PathBuf::from("unused.db"),
    };
    let guard = VersionGuard::new(dialect_for(&config));

    let err = guard
        .get_version(&RejectingTransport)
        .await
        .expect_err("a rejected probe must not read as an absent version");
    assert!(err.to_string().contains("Statement.SyntaxError"));
}
