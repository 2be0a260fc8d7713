//! Session-protocol transport
//!
//! Drives a session/transaction protocol through sqlx (PostgreSQL): open
//! a session from the pool, begin a transaction, run each statement,
//! commit or roll back as a unit. The wire bytes are owned by the client
//! library; this module only maps the uniform statement contract onto it.
//!
//! The protocol takes positional parameters, so `$name` placeholders are
//! rewritten to `$1`, `$2`, ... in first-occurrence order before
//! execution.

use crate::response::TransportResponse;
use crate::statement::{QueryResult, Row, Statement};
use crate::transport::GraphTransport;
use crate::{GraphError, GraphResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row as _};
use std::collections::BTreeMap;
use tracing::debug;

/// Transport over a sqlx PostgreSQL pool
pub struct SessionTransport {
    pool: PgPool,
}

impl SessionTransport {
    pub async fn connect(url: &str, max_connections: u32) -> GraphResult<Self> {
        debug!(max_connections, "Opening session pool");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| GraphError::Connection(format!("cannot open session: {}", e)))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl GraphTransport for SessionTransport {
    async fn execute(&self, statements: &[Statement]) -> GraphResult<TransportResponse> {
        let mut tx = self.pool.begin().await?;

        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            let (text, values) = rewrite_named(statement.text(), statement.parameters())?;

            let mut query = sqlx::query(&text);
            for value in &values {
                query = bind_value(query, value);
            }

            let rows = query.fetch_all(&mut *tx).await?;
            results.push(rows_to_result(&rows));
        }

        tx.commit().await?;
        Ok(TransportResponse::buffered(results, Vec::new()))
    }

    async fn close(&self) -> GraphResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_value<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(sqlx::types::Json(other.clone())),
    }
}

fn rows_to_result(rows: &[PgRow]) -> QueryResult {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let data = rows
        .iter()
        .map(|row| {
            let values: Vec<Value> = (0..columns.len()).map(|i| value_at(row, i)).collect();
            let meta = vec![None; values.len()];
            Row { values, meta }
        })
        .collect();

    QueryResult::new(columns, data)
}

/// Decode one column positionally, probing the common wire types
fn value_at(row: &PgRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<sqlx::types::Json<Value>>, _>(index) {
        return v.map(|j| j.0).unwrap_or(Value::Null);
    }
    Value::Null
}

/// Rewrite `$name` placeholders to positional `$1`, `$2`, ... in
/// first-occurrence order, returning the values to bind in that order.
///
/// Single-quoted literals and double-quoted identifiers are left alone.
/// A placeholder without a matching parameter is a statement error;
/// parameters never referenced by the text are ignored.
pub fn rewrite_named(
    text: &str,
    parameters: &BTreeMap<String, Value>,
) -> GraphResult<(String, Vec<Value>)> {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(text.len());
    let mut order: Vec<&str> = Vec::new();
    let mut positions: BTreeMap<&str, usize> = BTreeMap::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                let quote = bytes[i];
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                out.extend_from_slice(&bytes[start..i]);
            }
            b'$' if i + 1 < bytes.len()
                && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_') =>
            {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let name = &text[start..end];
                let position = match positions.get(name) {
                    Some(p) => *p,
                    None => {
                        if !parameters.contains_key(name) {
                            return Err(GraphError::Statement(format!(
                                "statement references unknown parameter ${}",
                                name
                            )));
                        }
                        let p = order.len() + 1;
                        order.push(name);
                        positions.insert(name, p);
                        p
                    }
                };
                out.push(b'$');
                out.extend_from_slice(position.to_string().as_bytes());
                i = end;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    let values = order
        .iter()
        .map(|name| parameters[*name].clone())
        .collect();
    let text = String::from_utf8(out)
        .map_err(|e| GraphError::Statement(format!("rewritten statement is not UTF-8: {}", e)))?;
    Ok((text, values))
}
