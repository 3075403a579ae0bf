//! PostgreSQL adapter.

use std::time::Duration;

use common::models::connection::ConnectionSettings;
use common::models::query::{CellValue, NormalizedRow};
use common::models::schema::{ColumnInfo, ServerInfo};
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Column, Connection, PgConnection, Row, TypeInfo, ValueRef};

use super::{decode, TableRef};

/// Catalog schema used for unqualified names.
const DEFAULT_SCHEMA: &str = "public";

pub(super) async fn connect(
    settings: &ConnectionSettings,
    statement_timeout: Duration,
) -> Result<PgConnection, sqlx::Error> {
    let timeout_ms = statement_timeout.as_millis().to_string();
    let mut options = PgConnectOptions::new()
        .host(settings.host.as_deref().unwrap_or("localhost"))
        .port(settings.port.unwrap_or(5432))
        .database(&settings.database)
        .options([
            ("default_transaction_read_only", "on"),
            ("statement_timeout", timeout_ms.as_str()),
        ]);
    if let Some(user) = settings.user.as_deref() {
        options = options.username(user);
    }
    if let Some(password) = settings.password.as_deref().filter(|p| !p.is_empty()) {
        options = options.password(password);
    }

    PgConnection::connect_with(&options).await
}

pub(super) async fn ping(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    conn.ping().await
}

pub(super) async fn list_tables(conn: &mut PgConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT tablename::text FROM pg_catalog.pg_tables WHERE schemaname = $1",
    )
    .bind(DEFAULT_SCHEMA)
    .fetch_all(&mut *conn)
    .await
}

pub(super) async fn describe_table(
    conn: &mut PgConnection,
    table: &TableRef,
) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT c.column_name::text AS field,
               c.data_type::text AS data_type,
               c.is_nullable::text AS nullable,
               c.column_default::text AS default_value,
               COALESCE((
                   SELECT CASE
                              WHEN bool_or(tc.constraint_type = 'PRIMARY KEY') THEN 'PRI'
                              WHEN bool_or(tc.constraint_type = 'UNIQUE') THEN 'UNI'
                          END
                   FROM information_schema.key_column_usage k
                   JOIN information_schema.table_constraints tc
                     ON tc.constraint_schema = k.constraint_schema
                    AND tc.constraint_name = k.constraint_name
                   WHERE k.table_schema = c.table_schema
                     AND k.table_name = c.table_name
                     AND k.column_name = c.column_name
               ), '') AS key_role
        FROM information_schema.columns c
        WHERE c.table_schema = COALESCE($1::text, 'public')
          AND c.table_name = $2::text
        ORDER BY c.ordinal_position
        "#,
    )
    .bind(table.schema.as_deref())
    .bind(&table.name)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ColumnInfo {
                field: row.try_get("field")?,
                data_type: row.try_get("data_type")?,
                null: row.try_get("nullable")?,
                key: row.try_get("key_role")?,
                default: row.try_get("default_value")?,
                extra: String::new(),
            })
        })
        .collect()
}

pub(super) async fn row_count(conn: &mut PgConnection, table: &TableRef) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.quoted);
    sqlx::query_scalar::<_, i64>(&sql).fetch_one(&mut *conn).await
}

pub(super) async fn server_info(conn: &mut PgConnection, configured: &str) -> Result<ServerInfo, sqlx::Error> {
    let (database, version): (Option<String>, String) =
        sqlx::query_as("SELECT current_database()::text, version()")
            .fetch_one(&mut *conn)
            .await?;
    // "PostgreSQL 16.2 on x86_64-pc-linux-gnu, compiled by ..." -> product and release
    let version = version.split(',').next().unwrap_or_default().trim().to_string();
    Ok(ServerInfo {
        database: database.unwrap_or_else(|| configured.to_string()),
        version,
    })
}

pub(super) async fn execute(conn: &mut PgConnection, sql: &str) -> Result<Vec<NormalizedRow>, sqlx::Error> {
    let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(normalize_row).collect())
}

fn normalize_row(row: &PgRow) -> NormalizedRow {
    let mut normalized = NormalizedRow::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        normalized.push(column.name(), cell(row, index, type_name));
    }
    normalized
}

fn cell(row: &PgRow, index: usize, type_name: &str) -> CellValue {
    match row.try_get_raw(index) {
        Ok(value) if value.is_null() => return CellValue::Null,
        Ok(_) => {}
        Err(_) => return CellValue::Unsupported(type_name.to_string()),
    }

    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).ok().map(CellValue::Bool),
        "INT2" => row
            .try_get::<i16, _>(index)
            .ok()
            .map(|v| CellValue::Int(i64::from(v))),
        "INT4" => row
            .try_get::<i32, _>(index)
            .ok()
            .map(|v| CellValue::Int(i64::from(v))),
        "INT8" => row.try_get::<i64, _>(index).ok().map(CellValue::Int),
        "OID" => row
            .try_get::<sqlx::postgres::types::Oid, _>(index)
            .ok()
            .map(|v| CellValue::UInt(u64::from(v.0))),
        "FLOAT4" => row
            .try_get::<f32, _>(index)
            .ok()
            .map(|v| CellValue::Float(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(index).ok().map(CellValue::Float),
        "NUMERIC" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .ok()
            .and_then(|bytes| decode::pg_numeric_text(&bytes))
            .map(CellValue::Text),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .ok()
            .map(decode::date),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(index)
            .ok()
            .map(decode::time),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .ok()
            .map(decode::datetime),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .ok()
            .map(decode::datetime_utc),
        "UUID" => row
            .try_get::<sqlx::types::Uuid, _>(index)
            .ok()
            .map(|v| CellValue::Text(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(index)
            .ok()
            .map(|v| CellValue::Text(v.to_string())),
        "BYTEA" => Some(CellValue::Binary),
        _ => row.try_get::<String, _>(index).ok().map(CellValue::Text),
    };

    decoded.unwrap_or_else(|| CellValue::Unsupported(type_name.to_string()))
}
