//! Backend configuration models.
//!
//! A [`BackendConfig`] is one named entry of the configuration source. Its
//! string fields stay unresolved until read; [`ConnectionSettings`] is the
//! resolved form handed to a driver.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Backend kind enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// MySQL-protocol server.
    #[serde(rename = "mysql")]
    MySql,
    /// PostgreSQL-protocol server.
    #[serde(rename = "postgresql")]
    Postgres,
    /// Embedded single-file SQLite engine.
    Sqlite,
}

impl BackendKind {
    /// Parses a configuration `type` value (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "mysql" => Some(BackendKind::MySql),
            "postgresql" | "postgres" => Some(BackendKind::Postgres),
            "sqlite" | "sqlite3" => Some(BackendKind::Sqlite),
            _ => None,
        }
    }

    /// Fields that must be present for this kind.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            BackendKind::MySql | BackendKind::Postgres => &["host", "port", "user", "database"],
            BackendKind::Sqlite => &["database"],
        }
    }

    /// Returns the default port for this backend kind.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            BackendKind::MySql => Some(3306),
            BackendKind::Postgres => Some(5432),
            BackendKind::Sqlite => None,
        }
    }

    /// Product name as reported by `get_database_info`.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::MySql => "MySQL",
            BackendKind::Postgres => "PostgreSQL",
            BackendKind::Sqlite => "SQLite",
        }
    }

    /// Cargo feature that compiles in the driver for this kind.
    pub fn feature(&self) -> &'static str {
        match self {
            BackendKind::MySql => "mysql",
            BackendKind::Postgres => "postgres",
            BackendKind::Sqlite => "sqlite",
        }
    }

    /// Whether the backend is reached over the network.
    pub fn is_networked(&self) -> bool {
        !matches!(self, BackendKind::Sqlite)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::MySql => write!(f, "mysql"),
            BackendKind::Postgres => write!(f, "postgresql"),
            BackendKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// A configuration field as stored: either a literal or a `${TOKEN}` reference
/// to an environment variable, resolved on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Literal(String),
    Deferred(String),
}

impl ConfigValue {
    /// Classifies a raw field value. Only a value that is exactly `${TOKEN}` is deferred.
    pub fn parse(raw: &str) -> Self {
        let token = raw
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
            .filter(|t| !t.is_empty() && !t.contains(['{', '}']));
        match token {
            Some(token) => ConfigValue::Deferred(token.to_string()),
            None => ConfigValue::Literal(raw.to_string()),
        }
    }

    /// Text as written in the configuration source.
    pub fn as_written(&self) -> String {
        match self {
            ConfigValue::Literal(v) => v.clone(),
            ConfigValue::Deferred(token) => format!("${{{}}}", token),
        }
    }
}

/// One named backend configuration, immutable after load.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Unique configuration name.
    pub name: String,
    /// Backend kind.
    pub kind: BackendKind,
    pub host: Option<ConfigValue>,
    pub port: Option<ConfigValue>,
    pub user: Option<ConfigValue>,
    pub password: Option<ConfigValue>,
    pub database: Option<ConfigValue>,
}

impl BackendConfig {
    /// Field names paired with their stored values, in declaration order.
    pub fn fields(&self) -> [(&'static str, Option<&ConfigValue>); 5] {
        [
            ("host", self.host.as_ref()),
            ("port", self.port.as_ref()),
            ("user", self.user.as_ref()),
            ("password", self.password.as_ref()),
            ("database", self.database.as_ref()),
        ]
    }

    /// Names of the required fields this entry lacks.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields = self.fields();
        self.kind
            .required_fields()
            .iter()
            .copied()
            .filter(|required| {
                fields
                    .iter()
                    .any(|(name, value)| name == required && value.is_none())
            })
            .collect()
    }
}

/// Fully resolved settings used to open a native connection.
#[derive(Clone)]
pub struct ConnectionSettings {
    pub name: String,
    pub kind: BackendKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database name, or the file path for the embedded engine.
    pub database: String,
}

impl ConnectionSettings {
    /// `host:port` for networked backends.
    pub fn endpoint(&self) -> Option<String> {
        if !self.kind.is_networked() {
            return None;
        }
        let host = self.host.as_deref()?;
        let port = self.port.or_else(|| self.kind.default_port())?;
        Some(format!("{}:{}", host, port))
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("database", &self.database)
            .finish()
    }
}

/// Configuration entry for API responses (excludes the password).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigItem {
    /// Configuration name.
    pub name: String,
    /// Backend kind.
    pub database_type: BackendKind,
    /// Host as written (may be a `${TOKEN}` reference).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port as written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Database name or file path as written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl From<&BackendConfig> for ConfigItem {
    fn from(config: &BackendConfig) -> Self {
        Self {
            name: config.name.clone(),
            database_type: config.kind,
            host: config.host.as_ref().map(ConfigValue::as_written),
            port: config.port.as_ref().map(ConfigValue::as_written),
            database: config.database.as_ref().map(ConfigValue::as_written),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind_aliases() {
        assert_eq!(BackendKind::parse("MySQL"), Some(BackendKind::MySql));
        assert_eq!(BackendKind::parse("postgres"), Some(BackendKind::Postgres));
        assert_eq!(BackendKind::parse("postgresql"), Some(BackendKind::Postgres));
        assert_eq!(BackendKind::parse("sqlite"), Some(BackendKind::Sqlite));
        assert_eq!(BackendKind::parse("oracle"), None);
    }

    #[test]
    fn test_config_value_deferred_only_when_exact() {
        assert_eq!(
            ConfigValue::parse("${DB_PASSWORD}"),
            ConfigValue::Deferred("DB_PASSWORD".into())
        );
        for raw in ["prefix-${DB_PASSWORD}", "${}", "${A}${B}"] {
            assert_eq!(ConfigValue::parse(raw), ConfigValue::Literal(raw.into()));
        }
        assert_eq!(ConfigValue::parse("${DB_HOST}").as_written(), "${DB_HOST}");
    }

    #[test]
    fn test_missing_fields_by_kind() {
        let config = BackendConfig {
            name: "default".into(),
            kind: BackendKind::MySql,
            host: Some(ConfigValue::parse("localhost")),
            port: None,
            user: None,
            password: None,
            database: Some(ConfigValue::parse("app")),
        };
        assert_eq!(config.missing_fields(), vec!["port", "user"]);

        let embedded = BackendConfig {
            kind: BackendKind::Sqlite,
            host: None,
            ..config
        };
        assert!(embedded.missing_fields().is_empty());
    }

    #[test]
    fn test_settings_debug_redacts_password() {
        let settings = ConnectionSettings {
            name: "default".into(),
            kind: BackendKind::Postgres,
            host: Some("db".into()),
            port: None,
            user: Some("reader".into()),
            password: Some("hunter2".into()),
            database: "app".into(),
        };
        let text = format!("{:?}", settings);
        assert!(!text.contains("hunter2"));
        assert_eq!(settings.endpoint().as_deref(), Some("db:5432"));
    }
}
