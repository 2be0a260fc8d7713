//! Embedded store transport
//!
//! Backs the "embedded" connection kind with a process-local SQLite
//! store. Handles are cached per canonical file-system path and shared
//! across concurrent callers, so two tasks asking for the same store get
//! exactly one handle, never two conflicting opens. Statement execution
//! runs inside a scoped transaction with commit-on-success and
//! rollback-on-error, on the blocking thread pool.

use crate::response::TransportResponse;
use crate::statement::{QueryResult, Row, Statement};
use crate::transport::GraphTransport;
use crate::{GraphError, GraphResult};
use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

type SharedConnection = Arc<Mutex<Connection>>;

/// Per-path handle cache. Shared mutable state, guarded by a mutex.
///
/// Entries are never evicted: a transport's `close` drops its clone of
/// the handle, but the cache keeps its own until the owning factory is
/// dropped. The factory lives for one run of the process, so a later
/// connect to the same path reuses the already-open store.
#[derive(Default)]
pub struct EmbeddedHandleCache {
    handles: Mutex<HashMap<PathBuf, SharedConnection>>,
}

impl EmbeddedHandleCache {
    fn open(&self, path: &Path) -> GraphResult<SharedConnection> {
        let canonical = canonical_store_path(path)?;
        let mut handles = self
            .handles
            .lock()
            .map_err(|_| GraphError::Connection("embedded handle cache poisoned".to_string()))?;

        if let Some(existing) = handles.get(&canonical) {
            return Ok(Arc::clone(existing));
        }

        debug!(path = %canonical.display(), "Opening embedded store");
        let connection = Connection::open(&canonical)
            .map_err(|e| GraphError::Connection(format!("cannot open embedded store: {}", e)))?;
        let shared = Arc::new(Mutex::new(connection));
        handles.insert(canonical, Arc::clone(&shared));
        Ok(shared)
    }
}

/// Canonical identity of a store file. The file itself may not exist yet,
/// but its parent directory must.
fn canonical_store_path(path: &Path) -> GraphResult<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }

    let file_name = path.file_name().ok_or_else(|| {
        GraphError::Connection(format!("store path has no file name: {}", path.display()))
    })?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let parent = parent.canonicalize().map_err(|e| {
        GraphError::Connection(format!(
            "store directory {} does not exist: {}",
            parent.display(),
            e
        ))
    })?;
    Ok(parent.join(file_name))
}

/// Transport over a cached embedded store handle
pub struct EmbeddedTransport {
    connection: SharedConnection,
}

impl EmbeddedTransport {
    pub fn open(cache: &EmbeddedHandleCache, path: &Path) -> GraphResult<Self> {
        Ok(Self {
            connection: cache.open(path)?,
        })
    }
}

#[async_trait]
impl GraphTransport for EmbeddedTransport {
    async fn execute(&self, statements: &[Statement]) -> GraphResult<TransportResponse> {
        let connection = Arc::clone(&self.connection);
        let statements = statements.to_vec();

        let results = tokio::task::spawn_blocking(move || -> GraphResult<Vec<QueryResult>> {
            let mut guard = connection
                .lock()
                .map_err(|_| GraphError::Statement("embedded handle lock poisoned".to_string()))?;
            let tx = guard.transaction()?;

            let mut results = Vec::with_capacity(statements.len());
            for statement in &statements {
                results.push(run_statement(&tx, statement)?);
            }

            // Dropping the transaction on the error path above rolls back
            tx.commit()?;
            Ok(results)
        })
        .await
        .map_err(|e| GraphError::Statement(format!("embedded execution task failed: {}", e)))??;

        Ok(TransportResponse::buffered(results, Vec::new()))
    }

    async fn close(&self) -> GraphResult<()> {
        // The handle is owned by the cache and may be shared; nothing to
        // release per transport.
        Ok(())
    }
}

fn run_statement(tx: &rusqlite::Transaction<'_>, statement: &Statement) -> GraphResult<QueryResult> {
    let mut prepared = tx
        .prepare(statement.text())
        .map_err(|e| GraphError::Statement(format!("{}: {}", e, statement.text())))?;
    let columns: Vec<String> = prepared
        .column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();

    for (name, value) in statement.parameters() {
        // Placeholders use `$name`; parameters absent from this statement
        // are ignored.
        let key = format!("${}", name);
        if let Some(index) = prepared.parameter_index(&key)? {
            prepared.raw_bind_parameter(index, json_to_sql(value))?;
        }
    }

    let mut rows = prepared.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(sql_to_json(row.get_ref(i)?));
        }
        let meta = vec![None; values.len()];
        out.push(Row { values, meta });
    }

    Ok(QueryResult::new(columns, out))
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        // Arrays and objects are stored as JSON text
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(r) => serde_json::Number::from_f64(r)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}
