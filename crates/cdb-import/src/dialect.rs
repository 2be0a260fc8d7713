//! Statement dialects for the two storage families.
//!
//! The importer speaks one statement vocabulary (schema, facet probe and
//! insert, concept chunks, mappings, version guard) and a dialect renders
//! it for a concrete backend. [`CypherDialect`] targets the transactional
//! HTTP graph server, [`SqlDialect`] targets the embedded store and the
//! session protocol. All inserts are conditional so that a replayed batch
//! or a lost race is a no-op.

use std::sync::Arc;

use cdb_common::types::{Concept, Facet, ImportMapping};
use cdb_graph::transport::ConnectionConfig;
use cdb_graph::Statement;
use serde_json::{json, Value};

/// Concepts per generated insert statement.
///
/// Bounded by the embedded store's host-parameter limit: at seven
/// parameters per concept row this stays well under 999.
pub const CONCEPT_CHUNK_SIZE: usize = 100;

/// Identifier of the singleton version record
const VERSION_KEY: &str = "cdb.version";

/// Renders the importer's statement vocabulary for one backend family.
pub trait StatementDialect: Send + Sync {
    /// Statements that bring the schema into existence, safe to replay
    fn schema_statements(&self) -> Vec<Statement>;

    /// Counts existing facets with the given custom id
    fn facet_probe(&self, custom_id: &str) -> Statement;

    /// Inserts the facet unless the probe's subject already exists
    fn facet_insert(&self, facet: &Facet) -> Statement;

    /// Inserts a chunk of concepts and their parent edges
    fn concept_chunk(&self, facet: &Facet, concepts: &[Concept]) -> Vec<Statement>;

    /// Inserts a chunk of cross-source mappings
    fn mapping_chunk(&self, mappings: &[ImportMapping]) -> Vec<Statement>;

    /// Reads the stored version value, empty result when unset
    fn version_probe(&self) -> Statement;

    /// Creates the version record unless one already exists
    fn version_create(&self, value: &str) -> Statement;
}

/// The dialect matching a connection kind.
pub fn dialect_for(connection: &ConnectionConfig) -> Arc<dyn StatementDialect> {
    match connection {
        ConnectionConfig::Http { .. } => Arc::new(CypherDialect),
        ConnectionConfig::Embedded { .. } | ConnectionConfig::Session { .. } => {
            Arc::new(SqlDialect)
        }
    }
}

// ============================================================================
// Cypher
// ============================================================================

/// Dialect for the transactional HTTP graph server.
pub struct CypherDialect;

impl StatementDialect for CypherDialect {
    fn schema_statements(&self) -> Vec<Statement> {
        // The graph server owns its constraints; nothing to create here.
        Vec::new()
    }

    fn facet_probe(&self, custom_id: &str) -> Statement {
        Statement::new("MATCH (f:Facet {customId: $facet_id}) RETURN count(f) AS existing")
            .param("facet_id", custom_id)
    }

    fn facet_insert(&self, facet: &Facet) -> Statement {
        Statement::new(
            "MERGE (g:FacetGroup {name: $group_name}) \
             MERGE (f:Facet {customId: $facet_id}) \
             ON CREATE SET f.name = $name, f.shortName = $short_name, f.kind = $kind \
             MERGE (g)-[:HAS_FACET]->(f)",
        )
        .param("group_name", facet.group.clone())
        .param("facet_id", facet.custom_id.clone())
        .param("name", facet.name.clone())
        .param("short_name", facet.short_name.clone())
        .param("kind", facet.kind.to_string())
    }

    fn concept_chunk(&self, facet: &Facet, concepts: &[Concept]) -> Vec<Statement> {
        let nodes: Vec<Value> = concepts
            .iter()
            .map(|c| {
                json!({
                    "originalId": c.coordinates.original_id,
                    "source": c.coordinates.source,
                    "ambiguous": c.coordinates.ambiguous,
                    "prefName": c.pref_name,
                    "synonyms": c.synonyms,
                    "descriptions": c.descriptions,
                })
            })
            .collect();

        let edges: Vec<Value> = concepts
            .iter()
            .flat_map(|c| {
                c.parents.iter().map(move |p| {
                    json!({
                        "childId": c.coordinates.original_id,
                        "childSource": c.coordinates.source,
                        "parentId": p.original_id,
                        "parentSource": p.source,
                    })
                })
            })
            .collect();

        let mut statements = vec![Statement::new(
            "MATCH (f:Facet {customId: $facet_id}) \
             UNWIND $concepts AS c \
             MERGE (n:Concept {originalId: c.originalId, source: c.source}) \
             ON CREATE SET n.prefName = c.prefName, n.synonyms = c.synonyms, \
                           n.descriptions = c.descriptions, n.ambiguous = c.ambiguous \
             MERGE (n)-[:IN_FACET]->(f)",
        )
        .param("facet_id", facet.custom_id.clone())
        .param("concepts", Value::Array(nodes))];

        if !edges.is_empty() {
            statements.push(
                Statement::new(
                    "UNWIND $edges AS e \
                     MATCH (c:Concept {originalId: e.childId, source: e.childSource}) \
                     MATCH (p:Concept {originalId: e.parentId, source: e.parentSource}) \
                     MERGE (c)-[:HAS_PARENT]->(p)",
                )
                .param("edges", Value::Array(edges)),
            );
        }

        statements
    }

    fn mapping_chunk(&self, mappings: &[ImportMapping]) -> Vec<Statement> {
        if mappings.is_empty() {
            return Vec::new();
        }
        let records: Vec<Value> = mappings
            .iter()
            .map(|m| json!({"from": m.from, "to": m.to, "type": m.mapping_type}))
            .collect();

        vec![Statement::new(
            "UNWIND $mappings AS m \
             MATCH (a:Concept {originalId: m.from}) \
             MATCH (b:Concept {originalId: m.to}) \
             MERGE (a)-[r:MAPPED_TO]->(b) \
             ON CREATE SET r.type = m.type",
        )
        .param("mappings", Value::Array(records))]
    }

    fn version_probe(&self) -> Statement {
        Statement::new("MATCH (v:Version {id: $version_key}) RETURN v.value AS value")
            .param("version_key", VERSION_KEY)
    }

    fn version_create(&self, value: &str) -> Statement {
        Statement::new(
            "MERGE (v:Version {id: $version_key}) ON CREATE SET v.value = $version_value",
        )
        .param("version_key", VERSION_KEY)
        .param("version_value", value)
    }
}

// ============================================================================
// SQL
// ============================================================================

/// Dialect for the embedded store and the session protocol.
pub struct SqlDialect;

impl StatementDialect for SqlDialect {
    fn schema_statements(&self) -> Vec<Statement> {
        [
            "CREATE TABLE IF NOT EXISTS cdb_facet (\
                custom_id TEXT PRIMARY KEY, \
                name TEXT NOT NULL, \
                group_name TEXT NOT NULL, \
                short_name TEXT NOT NULL, \
                kind TEXT NOT NULL)",
            "CREATE TABLE IF NOT EXISTS cdb_concept (\
                original_id TEXT NOT NULL, \
                source TEXT NOT NULL, \
                facet_id TEXT NOT NULL, \
                pref_name TEXT NOT NULL, \
                synonyms TEXT NOT NULL, \
                descriptions TEXT NOT NULL, \
                ambiguous BOOLEAN NOT NULL, \
                PRIMARY KEY (original_id, source, facet_id))",
            "CREATE TABLE IF NOT EXISTS cdb_concept_edge (\
                child_id TEXT NOT NULL, \
                child_source TEXT NOT NULL, \
                parent_id TEXT NOT NULL, \
                parent_source TEXT NOT NULL, \
                facet_id TEXT NOT NULL, \
                PRIMARY KEY (child_id, child_source, parent_id, parent_source, facet_id))",
            "CREATE TABLE IF NOT EXISTS cdb_mapping (\
                from_id TEXT NOT NULL, \
                to_id TEXT NOT NULL, \
                mapping_type TEXT NOT NULL, \
                PRIMARY KEY (from_id, to_id, mapping_type))",
            "CREATE TABLE IF NOT EXISTS cdb_version (\
                id TEXT PRIMARY KEY, \
                value TEXT NOT NULL)",
        ]
        .into_iter()
        .map(Statement::new)
        .collect()
    }

    fn facet_probe(&self, custom_id: &str) -> Statement {
        Statement::new("SELECT COUNT(*) AS existing FROM cdb_facet WHERE custom_id = $facet_id")
            .param("facet_id", custom_id)
    }

    fn facet_insert(&self, facet: &Facet) -> Statement {
        Statement::new(
            "INSERT INTO cdb_facet (custom_id, name, group_name, short_name, kind) \
             SELECT $facet_id, $name, $group_name, $short_name, $kind \
             WHERE NOT EXISTS (SELECT 1 FROM cdb_facet WHERE custom_id = $facet_id)",
        )
        .param("facet_id", facet.custom_id.clone())
        .param("name", facet.name.clone())
        .param("group_name", facet.group.clone())
        .param("short_name", facet.short_name.clone())
        .param("kind", facet.kind.to_string())
    }

    fn concept_chunk(&self, facet: &Facet, concepts: &[Concept]) -> Vec<Statement> {
        if concepts.is_empty() {
            return Vec::new();
        }

        let mut rows = Vec::with_capacity(concepts.len());
        let mut params: Vec<(String, Value)> = Vec::with_capacity(concepts.len() * 6);
        for (i, concept) in concepts.iter().enumerate() {
            rows.push(format!(
                "($c{i}_id, $c{i}_source, $facet_id, $c{i}_name, $c{i}_synonyms, \
                 $c{i}_descriptions, $c{i}_ambiguous)"
            ));
            params.push((format!("c{i}_id"), concept.coordinates.original_id.clone().into()));
            params.push((format!("c{i}_source"), concept.coordinates.source.clone().into()));
            params.push((format!("c{i}_name"), concept.pref_name.clone().into()));
            params.push((format!("c{i}_synonyms"), encode_list(&concept.synonyms)));
            params.push((format!("c{i}_descriptions"), encode_list(&concept.descriptions)));
            params.push((format!("c{i}_ambiguous"), concept.coordinates.ambiguous.into()));
        }
        let insert = Statement::new(format!(
            "INSERT INTO cdb_concept \
             (original_id, source, facet_id, pref_name, synonyms, descriptions, ambiguous) \
             VALUES {} ON CONFLICT DO NOTHING",
            rows.join(", ")
        ))
        .params(params)
        .param("facet_id", facet.custom_id.clone());

        let mut statements = vec![insert];

        let mut edge_rows = Vec::new();
        let mut edge_params: Vec<(String, Value)> = Vec::new();
        let mut edge_index = 0usize;
        for concept in concepts {
            for parent in &concept.parents {
                let i = edge_index;
                edge_rows.push(format!(
                    "($e{i}_child, $e{i}_child_source, $e{i}_parent, $e{i}_parent_source, $facet_id)"
                ));
                edge_params
                    .push((format!("e{i}_child"), concept.coordinates.original_id.clone().into()));
                edge_params
                    .push((format!("e{i}_child_source"), concept.coordinates.source.clone().into()));
                edge_params.push((format!("e{i}_parent"), parent.original_id.clone().into()));
                edge_params.push((format!("e{i}_parent_source"), parent.source.clone().into()));
                edge_index += 1;
            }
        }
        if !edge_rows.is_empty() {
            statements.push(
                Statement::new(format!(
                    "INSERT INTO cdb_concept_edge \
                     (child_id, child_source, parent_id, parent_source, facet_id) \
                     VALUES {} ON CONFLICT DO NOTHING",
                    edge_rows.join(", ")
                ))
                .params(edge_params)
                .param("facet_id", facet.custom_id.clone()),
            );
        }

        statements
    }

    fn mapping_chunk(&self, mappings: &[ImportMapping]) -> Vec<Statement> {
        if mappings.is_empty() {
            return Vec::new();
        }

        let mut rows = Vec::with_capacity(mappings.len());
        let mut params: Vec<(String, Value)> = Vec::with_capacity(mappings.len() * 3);
        for (i, mapping) in mappings.iter().enumerate() {
            rows.push(format!("($m{i}_from, $m{i}_to, $m{i}_type)"));
            params.push((format!("m{i}_from"), mapping.from.clone().into()));
            params.push((format!("m{i}_to"), mapping.to.clone().into()));
            params.push((format!("m{i}_type"), mapping.mapping_type.clone().into()));
        }

        vec![Statement::new(format!(
            "INSERT INTO cdb_mapping (from_id, to_id, mapping_type) \
             VALUES {} ON CONFLICT DO NOTHING",
            rows.join(", ")
        ))
        .params(params)]
    }

    fn version_probe(&self) -> Statement {
        Statement::new("SELECT value FROM cdb_version WHERE id = $version_key")
            .param("version_key", VERSION_KEY)
    }

    fn version_create(&self, value: &str) -> Statement {
        Statement::new(
            "INSERT INTO cdb_version (id, value) \
             SELECT $version_key, $version_value \
             WHERE NOT EXISTS (SELECT 1 FROM cdb_version WHERE id = $version_key)",
        )
        .param("version_key", VERSION_KEY)
        .param("version_value", value)
    }
}

/// String lists are stored as JSON text in the relational schema.
fn encode_list(values: &[String]) -> Value {
    Value::String(Value::from(values.to_vec()).to_string())
}
