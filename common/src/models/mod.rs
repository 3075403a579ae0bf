//! Shared data models.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{BackendConfig, BackendKind, ConfigItem, ConfigValue, ConnectionSettings};
pub use query::{CellValue, NormalizedRow, QueryRequest, QueryResult};
pub use schema::{ColumnInfo, DatabaseInfo, DatabaseStats, ServerInfo, TableCount, TableDescription};

/// Configuration name used when a request does not name one.
pub const DEFAULT_CONFIG_NAME: &str = "default";

pub(crate) fn default_config_name() -> String {
    DEFAULT_CONFIG_NAME.to_string()
}
