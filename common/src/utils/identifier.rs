//! Table identifier checks.
//!
//! Table names reach statements that cannot bind identifiers as parameters
//! (`SELECT COUNT(*) FROM <table>`), so they are restricted to plain
//! identifiers, optionally schema-qualified once, before being quoted.

use crate::errors::{AppError, AppResult};

/// Identifier quoting style of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// MySQL: `` `name` ``
    Backtick,
    /// PostgreSQL and SQLite: `"name"`
    DoubleQuote,
}

/// Validates a table name against `[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?`.
pub fn validate_table_name(name: &str) -> AppResult<()> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| is_plain_identifier(part)) {
        return Err(AppError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Validates and quotes a table name for the given style.
pub fn quote_table_name(name: &str, style: QuoteStyle) -> AppResult<String> {
    validate_table_name(name)?;
    let quote = match style {
        QuoteStyle::Backtick => '`',
        QuoteStyle::DoubleQuote => '"',
    };
    Ok(name
        .split('.')
        .map(|part| format!("{quote}{part}{quote}"))
        .collect::<Vec<_>>()
        .join("."))
}

fn is_plain_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_pass() {
        for name in ["users", "_tmp", "Order_Items", "t1$", "public.users"] {
            assert!(validate_table_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_injection_attempts_fail() {
        for name in [
            "",
            "1users",
            "users; DROP TABLE users",
            "users--",
            "a.b.c",
            "users ",
            "\"users\"",
            "users)",
            ".users",
        ] {
            assert!(
                matches!(validate_table_name(name), Err(AppError::InvalidIdentifier(_))),
                "{name:?}"
            );
        }
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_table_name("users", QuoteStyle::Backtick).unwrap(), "`users`");
        assert_eq!(
            quote_table_name("public.users", QuoteStyle::DoubleQuote).unwrap(),
            "\"public\".\"users\""
        );
    }
}
