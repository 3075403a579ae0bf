//! SQLite adapter.

use std::str::FromStr;
use std::time::Duration;

use common::models::connection::ConnectionSettings;
use common::models::query::{CellValue, NormalizedRow};
use common::models::schema::{ColumnInfo, ServerInfo};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, Connection, Executor, Row, SqliteConnection, TypeInfo, ValueRef};

use super::TableRef;

const MEMORY_DATABASE: &str = ":memory:";

pub(super) async fn connect(
    settings: &ConnectionSettings,
    busy_timeout: Duration,
) -> Result<SqliteConnection, sqlx::Error> {
    // Files are opened SQLITE_OPEN_READONLY, which no statement on the
    // connection can lift. A missing file is a connection error, never created.
    let options = if settings.database == MEMORY_DATABASE {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::new()
            .filename(&settings.database)
            .read_only(true)
    }
    .busy_timeout(busy_timeout);

    let mut conn = SqliteConnection::connect_with(&options).await?;
    // Second layer; a stacked PRAGMA can switch this one off.
    conn.execute("PRAGMA query_only = ON").await?;
    Ok(conn)
}

pub(super) async fn ping(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    conn.ping().await
}

pub(super) async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(&mut *conn)
        .await
}

pub(super) async fn describe_table(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1, ?2) ORDER BY cid"#,
    )
    .bind(&table.name)
    .bind(table.schema.as_deref().unwrap_or("main"))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let not_null: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;
            Ok(ColumnInfo {
                field: row.try_get("name")?,
                data_type: row.try_get::<Option<String>, _>("type")?.unwrap_or_default(),
                null: ColumnInfo::null_flag(not_null == 0),
                key: if pk > 0 { "PRI".to_string() } else { String::new() },
                default: row.try_get("dflt_value")?,
                extra: String::new(),
            })
        })
        .collect()
}

pub(super) async fn row_count(conn: &mut SqliteConnection, table: &TableRef) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.quoted);
    sqlx::query_scalar::<_, i64>(&sql).fetch_one(&mut *conn).await
}

/// The engine has no notion of a current database; the configured path is reported.
pub(super) async fn server_info(
    conn: &mut SqliteConnection,
    configured: &str,
) -> Result<ServerInfo, sqlx::Error> {
    let version = sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
        .fetch_one(&mut *conn)
        .await?;
    Ok(ServerInfo {
        database: configured.to_string(),
        version,
    })
}

pub(super) async fn execute(conn: &mut SqliteConnection, sql: &str) -> Result<Vec<NormalizedRow>, sqlx::Error> {
    let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(normalize_row).collect())
}

fn normalize_row(row: &SqliteRow) -> NormalizedRow {
    let mut normalized = NormalizedRow::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        normalized.push(column.name(), cell(row, index));
    }
    normalized
}

/// Storage classes are per value, so the value's own type decides.
fn cell(row: &SqliteRow, index: usize) -> CellValue {
    let storage = match row.try_get_raw(index) {
        Ok(value) if value.is_null() => return CellValue::Null,
        Ok(value) => value.type_info().name().to_string(),
        Err(_) => return CellValue::Unsupported("UNKNOWN".to_string()),
    };

    let decoded = match storage.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).ok().map(CellValue::Int),
        "REAL" => row.try_get_unchecked::<f64, _>(index).ok().map(CellValue::Float),
        "TEXT" => row.try_get_unchecked::<String, _>(index).ok().map(CellValue::Text),
        "BLOB" => Some(CellValue::Binary),
        _ => None,
    };
    decoded.unwrap_or(CellValue::Unsupported(storage))
}
