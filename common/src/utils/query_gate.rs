//! Query safety gate.
//!
//! Statically inspects caller-supplied SQL before it reaches any connection.
//! The check is lexical, not a parser: a SELECT that merely mentions a
//! forbidden word (in a literal or an alias) is rejected too.

use std::fmt;

use crate::errors::AppError;

/// Keywords that reject a statement wherever they appear.
pub const FORBIDDEN_KEYWORDS: [&str; 6] = ["DROP", "DELETE", "TRUNCATE", "UPDATE", "INSERT", "ALTER"];

/// A statement that passed the gate.
///
/// Only [`QueryGate::evaluate`] can build one, so anything that executes a
/// `GatedStatement` has necessarily been through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatedStatement(String);

impl GatedStatement {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for GatedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotASelect,
    ForbiddenKeyword(&'static str),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotASelect => write!(f, "NotASelect"),
            Rejection::ForbiddenKeyword(kw) => write!(f, "ForbiddenKeyword: {}", kw),
        }
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NotASelect => AppError::NotASelect,
            Rejection::ForbiddenKeyword(kw) => AppError::ForbiddenKeyword(kw.to_string()),
        }
    }
}

/// Outcome of [`QueryGate::evaluate`]. Purely a function of the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryVerdict {
    Accepted(GatedStatement),
    Rejected(Rejection),
}

impl QueryVerdict {
    pub fn accepted(&self) -> bool {
        matches!(self, QueryVerdict::Accepted(_))
    }

    /// The statement to execute, present iff accepted.
    pub fn rewritten_statement(&self) -> Option<&str> {
        match self {
            QueryVerdict::Accepted(stmt) => Some(stmt.as_str()),
            QueryVerdict::Rejected(_) => None,
        }
    }

    /// The rejection reason, present iff not accepted.
    pub fn rejection_reason(&self) -> Option<String> {
        match self {
            QueryVerdict::Accepted(_) => None,
            QueryVerdict::Rejected(reason) => Some(reason.to_string()),
        }
    }

    /// Converts the verdict into the statement or the matching gate error.
    pub fn into_result(self) -> Result<GatedStatement, AppError> {
        match self {
            QueryVerdict::Accepted(stmt) => Ok(stmt),
            QueryVerdict::Rejected(reason) => Err(reason.into()),
        }
    }
}

/// Read-only gate for arbitrary SQL.
pub struct QueryGate;

impl QueryGate {
    /// Evaluates a raw statement against the read-only rules.
    ///
    /// 1. The statement is trimmed; keyword checks run on an uppercased copy.
    /// 2. It must start with `SELECT`.
    /// 3. It must not contain any of [`FORBIDDEN_KEYWORDS`].
    /// 4. Without a `LIMIT` it gets ` LIMIT <max_rows>` appended (after
    ///    dropping trailing semicolons); otherwise it passes unchanged. When
    ///    the last line holds a `--` comment the clause goes on a new line,
    ///    or the comment would swallow it.
    ///
    /// Rules 2 and 3 both reject; when both apply the forbidden keyword is
    /// reported, so `DELETE FROM t` reads `ForbiddenKeyword: DELETE`.
    pub fn evaluate(raw: &str, max_rows: u32) -> QueryVerdict {
        let statement = raw.trim();
        let upper = statement.to_uppercase();
        let forbidden = FORBIDDEN_KEYWORDS
            .iter()
            .copied()
            .find(|kw| upper.contains(kw));

        if !Self::is_select(statement) {
            return QueryVerdict::Rejected(match forbidden {
                Some(keyword) => Rejection::ForbiddenKeyword(keyword),
                None => Rejection::NotASelect,
            });
        }

        if let Some(keyword) = forbidden {
            return QueryVerdict::Rejected(Rejection::ForbiddenKeyword(keyword));
        }

        if upper.contains("LIMIT") {
            return QueryVerdict::Accepted(GatedStatement(statement.to_string()));
        }

        let body = statement.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
        let separator = match body.lines().last() {
            Some(line) if line.contains("--") => '\n',
            _ => ' ',
        };
        QueryVerdict::Accepted(GatedStatement(format!("{}{}LIMIT {}", body, separator, max_rows)))
    }

    /// Checks if the SQL is a SELECT query.
    pub fn is_select(sql: &str) -> bool {
        sql.trim().to_uppercase().starts_with("SELECT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_gets_limit_appended() {
        let verdict = QueryGate::evaluate("SELECT * FROM users", 1000);
        assert!(verdict.accepted());
        assert_eq!(
            verdict.rewritten_statement(),
            Some("SELECT * FROM users LIMIT 1000")
        );
        assert_eq!(verdict.rejection_reason(), None);
    }

    #[test]
    fn test_delete_is_forbidden() {
        let verdict = QueryGate::evaluate("DELETE FROM users", 1000);
        assert!(!verdict.accepted());
        assert_eq!(
            verdict.rejection_reason().as_deref(),
            Some("ForbiddenKeyword: DELETE")
        );

        let verdict = QueryGate::evaluate("SELECT * FROM users; DELETE FROM users", 1000);
        assert_eq!(
            verdict.rejection_reason().as_deref(),
            Some("ForbiddenKeyword: DELETE")
        );
        assert!(matches!(
            verdict.into_result(),
            Err(AppError::ForbiddenKeyword(kw)) if kw == "DELETE"
        ));
    }

    #[test]
    fn test_existing_limit_is_kept_verbatim() {
        let verdict = QueryGate::evaluate("select id from orders limit 5", 1000);
        assert_eq!(verdict.rewritten_statement(), Some("select id from orders limit 5"));
    }

    #[test]
    fn test_non_select_is_rejected() {
        for sql in [
            "",
            "   ",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "EXPLAIN SELECT 1",
            "SHOW TABLES",
            "PRAGMA table_info(users)",
        ] {
            let verdict = QueryGate::evaluate(sql, 10);
            assert!(!verdict.accepted(), "{sql:?} should be rejected");
            assert_eq!(verdict.rejection_reason().as_deref(), Some("NotASelect"));
        }
        let verdict = QueryGate::evaluate("INSERT INTO t VALUES (1)", 10);
        assert_eq!(
            verdict.rejection_reason().as_deref(),
            Some("ForbiddenKeyword: INSERT")
        );
    }

    #[test]
    fn test_leading_whitespace_and_case_are_ignored() {
        let verdict = QueryGate::evaluate("\n\t  sElEcT name FROM users  \n", 50);
        assert_eq!(verdict.rewritten_statement(), Some("sElEcT name FROM users LIMIT 50"));
    }

    #[test]
    fn test_keyword_inside_literal_is_still_rejected() {
        let verdict = QueryGate::evaluate("SELECT 'drop' AS word", 10);
        assert_eq!(
            verdict.rejection_reason().as_deref(),
            Some("ForbiddenKeyword: DROP")
        );
        // Substring match: a column named updated_at trips UPDATE.
        let verdict = QueryGate::evaluate("SELECT updated_at FROM users", 10);
        assert_eq!(
            verdict.rejection_reason().as_deref(),
            Some("ForbiddenKeyword: UPDATE")
        );
    }

    #[test]
    fn test_trailing_semicolon_stripped_before_limit() {
        let verdict = QueryGate::evaluate("SELECT 1;  ", 5);
        assert_eq!(verdict.rewritten_statement(), Some("SELECT 1 LIMIT 5"));
    }

    #[test]
    fn test_every_accepted_statement_without_limit_ends_with_cap() {
        for sql in ["SELECT 1", "SELECT a, b FROM t WHERE a > 2", "select * from t order by a"] {
            for n in [1u32, 7, 1000] {
                let verdict = QueryGate::evaluate(sql, n);
                let stmt = verdict.rewritten_statement().unwrap();
                assert!(stmt.ends_with(&format!(" LIMIT {}", n)));
            }
        }
    }

    #[test]
    fn test_limit_not_swallowed_by_trailing_comment() {
        let verdict = QueryGate::evaluate("SELECT * FROM t -- recent rows", 50);
        assert_eq!(
            verdict.rewritten_statement(),
            Some("SELECT * FROM t -- recent rows\nLIMIT 50")
        );

        let verdict = QueryGate::evaluate("SELECT a -- first\nFROM t", 50);
        assert_eq!(verdict.rewritten_statement(), Some("SELECT a -- first\nFROM t LIMIT 50"));
    }

    #[test]
    fn test_is_select() {
        assert!(QueryGate::is_select("  SELECT * FROM users"));
        assert!(!QueryGate::is_select("INSERT INTO users"));
    }
}
