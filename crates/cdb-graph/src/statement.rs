//! Statement and result value objects
//!
//! These mirror the transactional HTTP wire contract: a request carries a
//! `statements` array of `{statement, parameters}` objects, a response
//! carries `results` (each with `columns` and `data`) and `errors`.
//! The embedded and session transports reuse the same shapes so the rest
//! of the importer never sees which backend is in play.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A parameterized request unit sent to a transport.
///
/// Parameter placeholders in the text use `$name` syntax; each transport
/// maps them to its own binding mechanism. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    #[serde(rename = "statement")]
    text: String,
    parameters: BTreeMap<String, Value>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Attach a named parameter. Later values replace earlier ones with
    /// the same name.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Attach many named parameters at once
    pub fn params(mut self, params: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.parameters.extend(params);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }
}

/// Per-value metadata attached to a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    pub id: i64,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub deleted: bool,
}

/// One row of a result: positional values plus optional per-value metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "row")]
    pub values: Vec<Value>,
    #[serde(default)]
    pub meta: Vec<Option<RowMeta>>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            meta: Vec::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// An ordered sequence of column names plus row records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    #[serde(rename = "data", default)]
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First value of the first row, if any
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|r| r.values.first())
    }

    /// First value of the first row interpreted as an integer
    pub fn first_i64(&self) -> Option<i64> {
        self.first_value().and_then(Value::as_i64)
    }
}

/// A protocol-level error object from the response `errors` array.
///
/// The wire allows arbitrary error shapes, so decoding is lenient: `code`
/// and `message` are extracted when present, everything else is preserved
/// in the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ResponseError {
    pub fn from_value(value: &Value) -> Self {
        let code = value
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let message = match value.get("message").and_then(Value::as_str) {
            Some(m) => m.to_string(),
            None if code.is_empty() => value.to_string(),
            None => String::new(),
        };
        Self { code, message }
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else if self.code.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_statement_serializes_to_wire_shape() {
        let statement = Statement::new("MATCH (f:Facet {customId: $fid}) RETURN count(f)")
            .param("fid", "fid1");

        let wire = serde_json::to_value(&statement).unwrap();
        assert_eq!(
            wire,
            json!({
                "statement": "MATCH (f:Facet {customId: $fid}) RETURN count(f)",
                "parameters": {"fid": "fid1"}
            })
        );
    }

    #[test]
    fn test_query_result_deserializes_with_meta() {
        let body = r#"{
            "columns": ["n"],
            "data": [{"row": [{"name": "x"}], "meta": [{"id": 7, "type": "node", "deleted": false}]}]
        }"#;

        let result: QueryResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.columns, vec!["n"]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].meta[0].as_ref().unwrap().id, 7);
    }

    #[test]
    fn test_query_result_tolerates_missing_meta() {
        let body = r#"{"columns": ["version"], "data": [{"row": ["1.0"]}]}"#;
        let result: QueryResult = serde_json::from_str(body).unwrap();
        assert!(result.rows[0].meta.is_empty());
        assert_eq!(result.first_value(), Some(&json!("1.0")));
    }

    #[test]
    fn test_response_error_lenient_decoding() {
        let err = ResponseError::from_value(&json!({"code": "X", "message": "boom"}));
        assert_eq!(err.to_string(), "X: boom");

        let bare = ResponseError::from_value(&json!({"weird": true}));
        assert!(bare.code.is_empty());
        assert!(bare.message.contains("weird"));
    }
}
