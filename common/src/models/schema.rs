//! Schema introspection models.
//!
//! Shapes returned by the introspection operations. Every backend fills every
//! field; values a backend cannot supply are empty strings, never omitted.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::connection::BackendKind;

/// One column of a described table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub field: String,
    /// Native column type.
    #[serde(rename = "type")]
    pub data_type: String,
    /// "YES" when the column accepts NULL, otherwise "NO".
    pub null: String,
    /// Key role: "PRI", "UNI", "MUL" or "".
    pub key: String,
    /// Default value expression.
    pub default: Option<String>,
    /// Backend-specific extra attributes (e.g. auto_increment).
    pub extra: String,
}

impl ColumnInfo {
    /// Renders a nullability flag the way MySQL's DESCRIBE does.
    pub fn null_flag(nullable: bool) -> String {
        if nullable { "YES" } else { "NO" }.to_string()
    }
}

/// Result of `describe_table`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TableDescription {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Result of `get_table_count` and one entry of `search_tables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TableCount {
    pub table_name: String,
    pub row_count: i64,
}

/// Server facts reported by a backend adapter.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServerInfo {
    /// Current database name (file path for the embedded engine).
    pub database: String,
    /// Server version string.
    pub version: String,
}

/// Result of `get_database_info`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatabaseInfo {
    /// Configuration name.
    pub config_name: String,
    /// Product name (MySQL, PostgreSQL, SQLite).
    pub database_type: String,
    /// Backend kind.
    pub kind: BackendKind,
    /// Current database.
    pub database: String,
    /// Server version.
    pub version: String,
    /// Number of tables in the catalog listing.
    pub table_count: usize,
    /// `host:port` for networked backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Result of `get_database_stats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatabaseStats {
    pub config_name: String,
    pub database_type: String,
    pub database: String,
    pub total_tables: usize,
    pub total_rows: i64,
    pub tables: Vec<TableCount>,
}

impl DatabaseStats {
    /// Aggregates per-table counts.
    pub fn from_counts(
        config_name: String,
        database_type: String,
        database: String,
        tables: Vec<TableCount>,
    ) -> Self {
        Self {
            config_name,
            database_type,
            database,
            total_tables: tables.len(),
            total_rows: tables.iter().map(|t| t.row_count).sum(),
            tables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_info_field_names() {
        let column = ColumnInfo {
            field: "id".into(),
            data_type: "INTEGER".into(),
            null: ColumnInfo::null_flag(true),
            key: "PRI".into(),
            default: None,
            extra: String::new(),
        };
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "field": "id",
                "type": "INTEGER",
                "null": "YES",
                "key": "PRI",
                "default": null,
                "extra": ""
            })
        );
    }

    #[test]
    fn test_stats_totals() {
        let stats = DatabaseStats::from_counts(
            "default".into(),
            "SQLite".into(),
            "test.db".into(),
            vec![
                TableCount { table_name: "users".into(), row_count: 3 },
                TableCount { table_name: "orders".into(), row_count: 4 },
            ],
        );
        assert_eq!(stats.total_tables, 2);
        assert_eq!(stats.total_rows, 7);
    }
}
