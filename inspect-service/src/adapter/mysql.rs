//! MySQL adapter.

use std::time::Duration;

use common::models::connection::ConnectionSettings;
use common::models::query::{CellValue, NormalizedRow};
use common::models::schema::{ColumnInfo, ServerInfo};
use sqlx::mysql::{MySqlConnectOptions, MySqlRow};
use sqlx::{Column, Connection, Executor, MySqlConnection, Row, TypeInfo, ValueRef};

use super::{decode, TableRef};

pub(super) async fn connect(
    settings: &ConnectionSettings,
    statement_timeout: Duration,
) -> Result<MySqlConnection, sqlx::Error> {
    let mut options = MySqlConnectOptions::new()
        .host(settings.host.as_deref().unwrap_or("localhost"))
        .port(settings.port.unwrap_or(3306))
        .database(&settings.database)
        .charset("utf8mb4");
    if let Some(user) = settings.user.as_deref() {
        options = options.username(user);
    }
    if let Some(password) = settings.password.as_deref().filter(|p| !p.is_empty()) {
        options = options.password(password);
    }

    let mut conn = MySqlConnection::connect_with(&options).await?;
    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;

    // Server-side cap for SELECTs; MariaDB and old servers lack the variable.
    let cap = format!("SET SESSION MAX_EXECUTION_TIME = {}", statement_timeout.as_millis());
    if let Err(e) = conn.execute(cap.as_str()).await {
        tracing::debug!(error = %e, "MAX_EXECUTION_TIME not available");
    }
    Ok(conn)
}

pub(super) async fn ping(conn: &mut MySqlConnection) -> Result<(), sqlx::Error> {
    conn.ping().await
}

pub(super) async fn list_tables(conn: &mut MySqlConnection) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SHOW TABLES").fetch_all(&mut *conn).await?;
    Ok(rows.iter().filter_map(|row| text_at(row, 0)).collect())
}

pub(super) async fn describe_table(
    conn: &mut MySqlConnection,
    table: &TableRef,
) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, COLUMN_DEFAULT, EXTRA
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
        "#,
    )
    .bind(table.schema.as_deref())
    .bind(&table.name)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ColumnInfo {
            field: text_at(row, 0).unwrap_or_default(),
            data_type: text_at(row, 1).unwrap_or_default(),
            null: text_at(row, 2).unwrap_or_else(|| "NO".to_string()),
            key: text_at(row, 3).unwrap_or_default(),
            default: text_at(row, 4),
            extra: text_at(row, 5).unwrap_or_default(),
        })
        .collect())
}

pub(super) async fn row_count(conn: &mut MySqlConnection, table: &TableRef) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.quoted);
    let row = sqlx::query(&sql).fetch_one(&mut *conn).await?;
    row.try_get::<i64, _>(0)
}

pub(super) async fn server_info(
    conn: &mut MySqlConnection,
    configured: &str,
) -> Result<ServerInfo, sqlx::Error> {
    let row = sqlx::query("SELECT DATABASE(), VERSION()")
        .fetch_one(&mut *conn)
        .await?;
    Ok(ServerInfo {
        database: text_at(&row, 0).unwrap_or_else(|| configured.to_string()),
        version: text_at(&row, 1).unwrap_or_default(),
    })
}

pub(super) async fn execute(conn: &mut MySqlConnection, sql: &str) -> Result<Vec<NormalizedRow>, sqlx::Error> {
    let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(normalize_row).collect())
}

/// Reads a text column, falling back to lossy UTF-8 for columns the server
/// reports with a binary collation (information_schema on some versions).
fn text_at(row: &MySqlRow, index: usize) -> Option<String> {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value;
    }
    row.try_get::<Option<Vec<u8>>, _>(index)
        .ok()
        .flatten()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

fn normalize_row(row: &MySqlRow) -> NormalizedRow {
    let mut normalized = NormalizedRow::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        normalized.push(column.name(), cell(row, index, type_name));
    }
    normalized
}

fn cell(row: &MySqlRow, index: usize, type_name: &str) -> CellValue {
    match row.try_get_raw(index) {
        Ok(value) if value.is_null() => return CellValue::Null,
        Ok(_) => {}
        Err(_) => return CellValue::Unsupported(type_name.to_string()),
    }

    let decoded = match type_name {
        "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(CellValue::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(index).ok().map(CellValue::Int)
        }
        t if t.ends_with("UNSIGNED") => row.try_get::<u64, _>(index).ok().map(CellValue::UInt),
        "FLOAT" => row
            .try_get::<f32, _>(index)
            .ok()
            .map(|v| CellValue::Float(f64::from(v))),
        "DOUBLE" => row.try_get::<f64, _>(index).ok().map(CellValue::Float),
        // DECIMAL arrives as its exact decimal text on both protocols.
        "DECIMAL" | "ENUM" | "SET" => row
            .try_get_unchecked::<String, _>(index)
            .ok()
            .map(CellValue::Text),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .ok()
            .map(decode::date),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(index)
            .ok()
            .map(decode::time),
        "DATETIME" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .ok()
            .map(decode::datetime),
        "TIMESTAMP" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .ok()
            .map(decode::datetime_utc),
        "YEAR" => row.try_get::<u16, _>(index).ok().map(|v| CellValue::UInt(u64::from(v))),
        "JSON" => row
            .try_get::<serde_json::Value, _>(index)
            .ok()
            .map(|v| CellValue::Text(v.to_string())),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => Some(CellValue::Binary),
        _ => row.try_get::<String, _>(index).ok().map(CellValue::Text),
    };

    decoded.unwrap_or_else(|| fallback(row, index, type_name))
}

fn fallback(row: &MySqlRow, index: usize, type_name: &str) -> CellValue {
    if let Ok(v) = row.try_get::<String, _>(index) {
        return CellValue::Text(v);
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return CellValue::Int(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return CellValue::Float(v);
    }
    if row.try_get::<Vec<u8>, _>(index).is_ok() {
        return CellValue::Binary;
    }
    CellValue::Unsupported(type_name.to_string())
}
