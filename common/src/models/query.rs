//! SQL query models.
//!
//! Contains the request for `execute_query` and the engine-agnostic row
//! representation every backend result is normalized into.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::default_config_name;

/// Marker emitted in place of binary column values.
pub const BINARY_MARKER: &str = "<binary data>";

/// Request body for executing a read-only SQL query.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct QueryRequest {
    /// SQL statement to execute (must be a SELECT).
    #[validate(length(min = 1, message = "SQL statement is required"))]
    pub query: String,

    /// Configuration name (default: "default").
    #[serde(default = "default_config_name")]
    pub config: String,

    /// Maximum number of rows to return (default: 1000).
    #[validate(range(min = 1, message = "limit must be positive"))]
    pub limit: Option<u32>,
}

/// One scalar cell after backend-specific coercion.
///
/// Native date/time and byte types never leave the adapter: they arrive here
/// as ISO-8601 text or as the binary marker.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// ISO-8601 date, time or timestamp.
    Timestamp(String),
    /// Unrepresentable binary content.
    Binary,
    /// A type the adapter cannot decode, tagged with its native type name.
    Unsupported(String),
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Bool(v) => serializer.serialize_bool(*v),
            CellValue::Int(v) => serializer.serialize_i64(*v),
            CellValue::UInt(v) => serializer.serialize_u64(*v),
            CellValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            CellValue::Float(v) => serializer.serialize_str(&v.to_string()),
            CellValue::Text(v) | CellValue::Timestamp(v) => serializer.serialize_str(v),
            CellValue::Binary => serializer.serialize_str(BINARY_MARKER),
            CellValue::Unsupported(type_name) => {
                serializer.serialize_str(&format!("<unsupported: {}>", type_name))
            }
        }
    }
}

/// Ordered mapping from column name to cell, serialized as a JSON object in
/// result-set column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRow {
    cells: Vec<(String, CellValue)>,
}

impl NormalizedRow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.push((column.into(), value));
    }

    /// Looks up a cell by column name.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for NormalizedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Result of a gated query execution.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResult {
    /// Statement actually sent to the backend (after the gate rewrite).
    pub statement: String,

    /// Column names in result order (empty when no rows were returned).
    pub columns: Vec<String>,

    /// Normalized rows.
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<NormalizedRow>,

    /// Number of rows returned.
    pub row_count: usize,

    /// Query execution time in milliseconds.
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Builds a result, deriving the column list from the first row.
    pub fn new(statement: String, rows: Vec<NormalizedRow>, execution_time_ms: u64) -> Self {
        let columns = rows
            .first()
            .map(|row| row.columns().map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            statement,
            columns,
            row_count: rows.len(),
            rows,
            execution_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_serializes_in_column_order() {
        let mut row = NormalizedRow::with_capacity(4);
        row.push("zeta", CellValue::Int(1));
        row.push("alpha", CellValue::Binary);
        row.push("created_at", CellValue::Timestamp("2024-01-02T03:04:05".into()));
        row.push("note", CellValue::Null);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"zeta":1,"alpha":"<binary data>","created_at":"2024-01-02T03:04:05","note":null}"#
        );
    }

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "SELECT 1"}"#).unwrap();
        assert_eq!(req.config, "default");
        assert_eq!(req.limit, None);
        assert!(req.validate().is_ok());

        let bad: QueryRequest =
            serde_json::from_str(r#"{"query": "SELECT 1", "limit": 0}"#).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_result_columns_from_first_row() {
        let mut row = NormalizedRow::default();
        row.push("id", CellValue::UInt(7));
        let result = QueryResult::new("SELECT id FROM t LIMIT 10".into(), vec![row], 3);
        assert_eq!(result.columns, vec!["id".to_string()]);
        assert_eq!(result.row_count, 1);
    }
}
