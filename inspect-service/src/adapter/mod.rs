//! Backend adapters.
//!
//! One module per backend kind translates the generic operations (list tables,
//! describe a table, count rows, report server info, execute a gated
//! statement) into native statements and normalizes native result shapes into
//! [`NormalizedRow`]s. Each driver is a cargo feature; a kind whose feature is
//! compiled out fails to connect with `DriverMissing`.

#[cfg(not(any(feature = "mysql", feature = "postgres", feature = "sqlite")))]
compile_error!("enable at least one backend feature: mysql, postgres or sqlite");

mod decode;
#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::connection::{BackendKind, ConnectionSettings};
use common::models::query::NormalizedRow;
use common::models::schema::{ColumnInfo, ServerInfo};
use common::utils::{quote_table_name, GatedStatement, QuoteStyle};
use sqlx::Connection;
use tokio::time::{error::Elapsed, timeout};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Timeouts applied to every native call.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub probe: Duration,
    pub query: Duration,
}

impl From<&AppConfig> for Timeouts {
    fn from(config: &AppConfig) -> Self {
        Self {
            connect: config.connect_timeout(),
            probe: config.probe_timeout(),
            query: config.query_timeout(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts::from(&AppConfig::default())
    }
}

/// Native connection wrapper for the compiled-in backends.
pub enum NativeConnection {
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlConnection),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::PgConnection),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqliteConnection),
}

/// Runs `$call` from the backend module matching the native connection.
macro_rules! dispatch {
    ($native:expr, $conn:ident => $call:ident($($arg:expr),*)) => {
        match $native {
            #[cfg(feature = "mysql")]
            NativeConnection::MySql($conn) => mysql::$call($conn $(, $arg)*).await,
            #[cfg(feature = "postgres")]
            NativeConnection::Postgres($conn) => postgres::$call($conn $(, $arg)*).await,
            #[cfg(feature = "sqlite")]
            NativeConnection::Sqlite($conn) => sqlite::$call($conn $(, $arg)*).await,
        }
    };
}

/// A table reference ready for interpolation.
#[derive(Debug, Clone)]
pub struct TableRef {
    /// Schema qualifier, if the caller gave one.
    pub schema: Option<String>,
    /// Bare table name, used for catalog lookups with bound parameters.
    pub name: String,
    /// Quoted form for statements that cannot bind identifiers.
    pub quoted: String,
}

impl TableRef {
    /// Validates a caller-supplied table name and quotes it for `kind`.
    pub fn parse(raw: &str, kind: BackendKind) -> AppResult<Self> {
        let quoted = quote_table_name(raw, quote_style(kind))?;
        let (schema, name) = match raw.split_once('.') {
            Some((schema, name)) => (Some(schema.to_string()), name.to_string()),
            None => (None, raw.to_string()),
        };
        Ok(Self { schema, name, quoted })
    }

    /// Wraps a name taken from the backend's own catalog listing. No pattern
    /// check; embedded quote characters are escaped by doubling.
    pub fn from_catalog(name: &str, kind: BackendKind) -> Self {
        let quote = match quote_style(kind) {
            QuoteStyle::Backtick => '`',
            QuoteStyle::DoubleQuote => '"',
        };
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        Self {
            schema: None,
            name: name.to_string(),
            quoted: format!("{quote}{escaped}{quote}"),
        }
    }
}

fn quote_style(kind: BackendKind) -> QuoteStyle {
    match kind {
        BackendKind::MySql => QuoteStyle::Backtick,
        BackendKind::Postgres | BackendKind::Sqlite => QuoteStyle::DoubleQuote,
    }
}

/// One live native connection owned by the registry.
pub struct LiveConnection {
    id: u64,
    config_name: String,
    kind: BackendKind,
    database: String,
    endpoint: Option<String>,
    query_timeout: Duration,
    /// Set while a statement runs; still set afterwards only if the statement
    /// was abandoned (timeout or cancelled caller).
    in_flight: bool,
    native: NativeConnection,
}

impl fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConnection")
            .field("id", &self.id)
            .field("config_name", &self.config_name)
            .field("kind", &self.kind)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

/// Opens a new native connection for resolved settings.
pub async fn connect(settings: &ConnectionSettings, timeouts: &Timeouts) -> AppResult<LiveConnection> {
    let started = Instant::now();
    let native = match timeout(timeouts.connect, open_native(settings, timeouts)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AppError::ConnectionFailed {
                config: settings.name.clone(),
                kind: settings.kind,
                message: format!(
                    "connection attempt timed out after {:?}",
                    timeouts.connect
                ),
            })
        }
    };

    let conn = LiveConnection {
        id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        config_name: settings.name.clone(),
        kind: settings.kind,
        database: settings.database.clone(),
        endpoint: settings.endpoint(),
        query_timeout: timeouts.query,
        in_flight: false,
        native,
    };

    tracing::info!(
        config = %conn.config_name,
        kind = %conn.kind,
        id = conn.id,
        endpoint = conn.endpoint.as_deref().unwrap_or(conn.database.as_str()),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Connection established"
    );
    Ok(conn)
}

async fn open_native(settings: &ConnectionSettings, timeouts: &Timeouts) -> AppResult<NativeConnection> {
    let connection_failed = |e: sqlx::Error| AppError::ConnectionFailed {
        config: settings.name.clone(),
        kind: settings.kind,
        message: e.to_string(),
    };

    match settings.kind {
        #[cfg(feature = "mysql")]
        BackendKind::MySql => mysql::connect(settings, timeouts.query)
            .await
            .map(NativeConnection::MySql)
            .map_err(connection_failed),
        #[cfg(feature = "postgres")]
        BackendKind::Postgres => postgres::connect(settings, timeouts.query)
            .await
            .map(NativeConnection::Postgres)
            .map_err(connection_failed),
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => sqlite::connect(settings, timeouts.query)
            .await
            .map(NativeConnection::Sqlite)
            .map_err(connection_failed),
        #[allow(unreachable_patterns)]
        kind => Err(AppError::DriverMissing {
            config: settings.name.clone(),
            kind,
            feature: kind.feature(),
        }),
    }
}

impl LiveConnection {
    /// Process-unique handle id; stable for the lifetime of the native connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Configured database name (file path for the embedded engine).
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Whether a previous statement on this connection was abandoned.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Cheap liveness probe.
    pub async fn ping(&mut self) -> Result<(), sqlx::Error> {
        dispatch!(&mut self.native, c => ping())
    }

    /// Closes the native connection.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        match self.native {
            #[cfg(feature = "mysql")]
            NativeConnection::MySql(c) => c.close().await,
            #[cfg(feature = "postgres")]
            NativeConnection::Postgres(c) => c.close().await,
            #[cfg(feature = "sqlite")]
            NativeConnection::Sqlite(c) => c.close().await,
        }
    }

    /// Table names in the backend's natural catalog order.
    pub async fn list_tables(&mut self) -> AppResult<Vec<String>> {
        self.in_flight = true;
        let outcome = timeout(self.query_timeout, async {
            dispatch!(&mut self.native, c => list_tables())
        })
        .await;
        self.finish("list_tables", outcome)
    }

    /// Column metadata of a table, in ordinal order.
    pub async fn describe_table(&mut self, table: &TableRef) -> AppResult<Vec<ColumnInfo>> {
        self.in_flight = true;
        let outcome = timeout(self.query_timeout, async {
            dispatch!(&mut self.native, c => describe_table(table))
        })
        .await;
        self.finish("describe_table", outcome)
    }

    /// `SELECT COUNT(*)` over a table.
    pub async fn row_count(&mut self, table: &TableRef) -> AppResult<i64> {
        self.in_flight = true;
        let outcome = timeout(self.query_timeout, async {
            dispatch!(&mut self.native, c => row_count(table))
        })
        .await;
        self.finish("row_count", outcome)
    }

    /// Current database and server version.
    pub async fn server_info(&mut self) -> AppResult<ServerInfo> {
        self.in_flight = true;
        let configured = self.database.clone();
        let outcome = timeout(self.query_timeout, async {
            dispatch!(&mut self.native, c => server_info(&configured))
        })
        .await;
        self.finish("server_info", outcome)
    }

    /// Runs a statement that passed the query gate.
    pub async fn execute(&mut self, statement: &GatedStatement) -> AppResult<Vec<NormalizedRow>> {
        self.in_flight = true;
        let sql = statement.as_str();
        let outcome = timeout(self.query_timeout, async {
            dispatch!(&mut self.native, c => execute(sql))
        })
        .await;
        self.finish("execute", outcome)
    }

    fn finish<T>(
        &mut self,
        operation: &str,
        outcome: Result<Result<T, sqlx::Error>, Elapsed>,
    ) -> AppResult<T> {
        match outcome {
            Ok(result) => {
                self.in_flight = false;
                result.map_err(|e| self.execution_failed(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(
                    config = %self.config_name,
                    id = self.id,
                    operation,
                    "Statement timed out, connection will be replaced"
                );
                Err(self.execution_failed(format!(
                    "{} timed out after {:?}",
                    operation, self.query_timeout
                )))
            }
        }
    }

    fn execution_failed(&self, message: String) -> AppError {
        AppError::BackendExecutionFailed {
            config: self.config_name.clone(),
            kind: self.kind,
            message,
        }
    }
}
