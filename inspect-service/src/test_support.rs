//! Shared test fixtures.

use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, Executor, SqliteConnection};
use tempfile::TempDir;

use crate::config_store::ConfigStore;

const MAIN_SCHEMA: &str = r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT UNIQUE,
    score REAL DEFAULT 0,
    avatar BLOB
);
INSERT INTO users (name, email, score, avatar) VALUES
    ('alice', 'alice@example.com', 9.5, x'00ff'),
    ('bob', NULL, 7, NULL),
    ('carol', 'carol@example.com', 8.25, NULL);

CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    amount REAL NOT NULL
);
INSERT INTO orders (user_id, amount) VALUES (1, 10.0), (1, 20.5), (2, 5.0), (3, 1.0);

CREATE TABLE user_sessions (id INTEGER PRIMARY KEY, user_id INTEGER);
"#;

const ARCHIVE_SCHEMA: &str = "CREATE TABLE events (id INTEGER PRIMARY KEY, payload BLOB);";

/// Two seeded SQLite files registered as `default` and `archive`.
pub(crate) struct SqliteFixture {
    _dir: TempDir,
    pub store: Arc<ConfigStore>,
    pub path: String,
}

pub(crate) async fn sqlite_fixture() -> SqliteFixture {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("test.db");
    let archive = dir.path().join("archive.db");
    seed(&main, MAIN_SCHEMA).await;
    seed(&archive, ARCHIVE_SCHEMA).await;

    let path = main.to_string_lossy().into_owned();
    let config = serde_json::json!({
        "default": { "type": "sqlite", "database": path },
        "archive": { "type": "sqlite", "database": archive.to_string_lossy() },
    });
    let store = ConfigStore::from_json_str(&config.to_string(), "INSPECT_FIXTURE").unwrap();

    SqliteFixture {
        _dir: dir,
        store: Arc::new(store),
        path,
    }
}

/// A single MySQL entry named `default` pointing at `host:port`.
#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
pub(crate) fn mysql_store(host: &str, port: u16) -> Arc<ConfigStore> {
    let config = serde_json::json!({
        "default": {
            "type": "mysql",
            "host": host,
            "port": port,
            "user": "root",
            "password": "",
            "database": "chatbi"
        }
    });
    Arc::new(ConfigStore::from_json_str(&config.to_string(), "INSPECT_FIXTURE").unwrap())
}

async fn seed(path: &Path, schema: &str) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    conn.execute(schema).await.unwrap();
    conn.close().await.unwrap();
}
