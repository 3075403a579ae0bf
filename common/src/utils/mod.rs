//! Utility functions and helpers.

pub mod identifier;
pub mod query_gate;

// Re-export commonly used types
pub use identifier::{quote_table_name, validate_table_name, QuoteStyle};
pub use query_gate::{GatedStatement, QueryGate, QueryVerdict, Rejection};
