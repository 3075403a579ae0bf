//! Backend configuration store.
//!
//! Loads the named backend entries from a JSON object file once at start-up and
//! validates them. Field values are resolved on every read:
//! - a value that is exactly `${TOKEN}` is replaced by the environment
//!   variable `TOKEN` (an undefined variable is an error);
//! - any other value present in the file can be overridden by the environment
//!   variable `<PREFIX>_<FIELD>` (e.g. `CHATBI_HOST`).
//!
//! Resolved values are never cached, so rotated secrets are picked up by the
//! next connection attempt.

use std::collections::BTreeMap;
use std::path::Path;

use common::errors::{AppError, AppResult};
use common::models::connection::{
    BackendConfig, BackendKind, ConfigItem, ConfigValue, ConnectionSettings,
};
use serde_json::Value;

/// Immutable set of named backend configurations.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    env_prefix: String,
    configs: BTreeMap<String, BackendConfig>,
}

impl ConfigStore {
    /// Loads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>, env_prefix: impl Into<String>) -> AppResult<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ConfigNotFound {
                    path: path.display().to_string(),
                })
            }
            Err(e) => {
                return Err(AppError::ConfigMalformed(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let store = Self::from_json_str(&text, env_prefix)?;
        tracing::info!(
            path = %path.display(),
            configs = store.configs.len(),
            "Backend configurations loaded"
        );
        Ok(store)
    }

    /// Parses and validates configuration text. Fails as a whole: a single bad
    /// entry means no store is returned.
    pub fn from_json_str(text: &str, env_prefix: impl Into<String>) -> AppResult<Self> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| AppError::ConfigMalformed(e.to_string()))?;
        let entries = document.as_object().ok_or_else(|| {
            AppError::ConfigMalformed("top level must be an object keyed by configuration name".into())
        })?;

        if entries.is_empty() {
            return Err(AppError::ConfigInvalid("configuration file is empty".into()));
        }

        let mut configs = BTreeMap::new();
        for (name, entry) in entries {
            let config = parse_entry(name, entry)?;
            configs.insert(name.clone(), config);
        }

        Ok(Self {
            env_prefix: env_prefix.into(),
            configs,
        })
    }

    /// Returns the stored (unresolved) configuration.
    pub fn get(&self, name: &str) -> AppResult<&BackendConfig> {
        self.configs
            .get(name)
            .ok_or_else(|| AppError::ConfigNameUnknown(name.to_string()))
    }

    /// Backend kind of a configuration, without resolving any value.
    pub fn kind_of(&self, name: &str) -> AppResult<BackendKind> {
        self.get(name).map(|config| config.kind)
    }

    /// All configuration names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    /// Password-free summaries of all configurations.
    pub fn items(&self) -> Vec<ConfigItem> {
        self.configs.values().map(ConfigItem::from).collect()
    }

    /// Resolves a configuration against the current environment.
    pub fn resolve(&self, name: &str) -> AppResult<ConnectionSettings> {
        let config = self.get(name)?;

        let host = self.resolve_field(config, "host", config.host.as_ref())?;
        let port = self.resolve_field(config, "port", config.port.as_ref())?;
        let user = self.resolve_field(config, "user", config.user.as_ref())?;
        let password = self.resolve_field(config, "password", config.password.as_ref())?;
        let database = self
            .resolve_field(config, "database", config.database.as_ref())?
            .ok_or_else(|| {
                AppError::ConfigInvalid(format!("config '{}' is missing field: database", name))
            })?;

        let port = port
            .map(|raw| {
                raw.trim().parse::<u16>().map_err(|_| {
                    AppError::ConfigInvalid(format!(
                        "config '{}': port '{}' is not a valid TCP port",
                        name, raw
                    ))
                })
            })
            .transpose()?;

        Ok(ConnectionSettings {
            name: config.name.clone(),
            kind: config.kind,
            host,
            port,
            user,
            password,
            database,
        })
    }

    fn resolve_field(
        &self,
        config: &BackendConfig,
        field: &str,
        value: Option<&ConfigValue>,
    ) -> AppResult<Option<String>> {
        match value {
            None => Ok(None),
            Some(ConfigValue::Deferred(var)) => std::env::var(var).map(Some).map_err(|_| {
                AppError::MissingEnvironmentValue {
                    config: config.name.clone(),
                    field: field.to_string(),
                    var: var.clone(),
                }
            }),
            Some(ConfigValue::Literal(literal)) => {
                let key = format!("{}_{}", self.env_prefix, field.to_uppercase());
                Ok(Some(std::env::var(&key).unwrap_or_else(|_| literal.clone())))
            }
        }
    }
}

fn parse_entry(name: &str, entry: &Value) -> AppResult<BackendConfig> {
    let fields = entry.as_object().ok_or_else(|| {
        AppError::ConfigMalformed(format!("config '{}' must be an object", name))
    })?;

    let kind = match fields.get("type") {
        None | Some(Value::Null) => {
            return Err(AppError::ConfigInvalid(format!(
                "config '{}' is missing required field: type",
                name
            )))
        }
        Some(Value::String(raw)) => BackendKind::parse(raw).ok_or_else(|| {
            AppError::ConfigInvalid(format!(
                "config '{}' has unsupported database type '{}' (supported: mysql, postgresql, sqlite)",
                name, raw
            ))
        })?,
        Some(other) => {
            return Err(AppError::ConfigInvalid(format!(
                "config '{}': type must be a string, got {}",
                name, other
            )))
        }
    };

    let field = |key: &str| -> AppResult<Option<ConfigValue>> {
        match fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(ConfigValue::parse(s))),
            Some(Value::Number(n)) => Ok(Some(ConfigValue::Literal(n.to_string()))),
            Some(other) => Err(AppError::ConfigInvalid(format!(
                "config '{}': field '{}' must be a string or number, got {}",
                name, key, other
            ))),
        }
    };

    let config = BackendConfig {
        name: name.to_string(),
        kind,
        host: field("host")?,
        port: field("port")?,
        user: field("user")?,
        password: field("password")?,
        database: field("database")?,
    };

    let missing = config.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::ConfigInvalid(format!(
            "config '{}' ({}) is missing required fields: {}",
            name,
            kind,
            missing.join(", ")
        )));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = r#"{
        "default": {"type": "sqlite", "database": "test.db"},
        "warehouse": {
            "type": "postgresql",
            "host": "db.internal",
            "port": 5432,
            "user": "reader",
            "password": "${CSTEST_WAREHOUSE_PW}",
            "database": "analytics"
        },
        "legacy": {
            "type": "MySQL",
            "host": "${CSTEST_LEGACY_HOST}",
            "port": "3307",
            "user": "root",
            "database": "shop"
        }
    }"#;

    #[test]
    fn test_load_valid_mapping() {
        let store = ConfigStore::from_json_str(MIXED, "CSTEST_LOAD").unwrap();
        assert_eq!(store.names(), vec!["default", "legacy", "warehouse"]);
        assert_eq!(store.kind_of("default").unwrap(), BackendKind::Sqlite);
        assert_eq!(store.kind_of("legacy").unwrap(), BackendKind::MySql);
        assert!(matches!(
            store.get("missing"),
            Err(AppError::ConfigNameUnknown(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_missing_required_field_fails_whole_load() {
        let text = r#"{
            "default": {"type": "sqlite", "database": "ok.db"},
            "broken": {"type": "mysql", "host": "h", "user": "u", "database": "d"}
        }"#;
        let err = ConfigStore::from_json_str(text, "CSTEST").unwrap_err();
        match err {
            AppError::ConfigInvalid(msg) => {
                assert!(msg.contains("broken"));
                assert!(msg.contains("port"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_every_missing_relational_field_is_invalid() {
        for dropped in ["host", "port", "user", "database", "type"] {
            let mut entry = serde_json::json!({
                "type": "postgresql", "host": "h", "port": 1, "user": "u", "database": "d"
            });
            entry.as_object_mut().unwrap().remove(dropped);
            let text = serde_json::json!({ "default": entry }).to_string();
            assert!(
                matches!(ConfigStore::from_json_str(&text, "CSTEST"), Err(AppError::ConfigInvalid(_))),
                "dropping {dropped} should be invalid"
            );
        }
    }

    #[test]
    fn test_unsupported_kind_and_empty_source() {
        let text = r#"{"default": {"type": "oracle", "database": "x"}}"#;
        assert!(matches!(
            ConfigStore::from_json_str(text, "CSTEST"),
            Err(AppError::ConfigInvalid(_))
        ));
        assert!(matches!(
            ConfigStore::from_json_str("{}", "CSTEST"),
            Err(AppError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_malformed_sources() {
        for text in ["{not json", "[]", r#"{"default": "sqlite"}"#] {
            assert!(
                matches!(ConfigStore::from_json_str(text, "CSTEST"), Err(AppError::ConfigMalformed(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigStore::load("/nonexistent/dir/db_config.json", "CSTEST").unwrap_err();
        assert!(matches!(err, AppError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_deferred_value_resolved_on_every_read() {
        let store = ConfigStore::from_json_str(MIXED, "CSTEST_DEFERRED").unwrap();

        std::env::remove_var("CSTEST_WAREHOUSE_PW");
        assert!(matches!(
            store.resolve("warehouse"),
            Err(AppError::MissingEnvironmentValue { var, field, .. })
                if var == "CSTEST_WAREHOUSE_PW" && field == "password"
        ));

        std::env::set_var("CSTEST_WAREHOUSE_PW", "first");
        assert_eq!(store.resolve("warehouse").unwrap().password.as_deref(), Some("first"));

        std::env::set_var("CSTEST_WAREHOUSE_PW", "rotated");
        assert_eq!(store.resolve("warehouse").unwrap().password.as_deref(), Some("rotated"));
        std::env::remove_var("CSTEST_WAREHOUSE_PW");
    }

    #[test]
    fn test_prefix_override_applies_to_literals_only() {
        let store = ConfigStore::from_json_str(MIXED, "CSTEST_OVR").unwrap();
        std::env::set_var("CSTEST_LEGACY_HOST", "from-token");
        std::env::set_var("CSTEST_OVR_HOST", "from-override");
        std::env::set_var("CSTEST_OVR_USER", "admin");

        let legacy = store.resolve("legacy").unwrap();
        // Deferred host is not double-resolved through the override.
        assert_eq!(legacy.host.as_deref(), Some("from-token"));
        assert_eq!(legacy.user.as_deref(), Some("admin"));
        assert_eq!(legacy.port, Some(3307));

        std::env::remove_var("CSTEST_LEGACY_HOST");
        std::env::remove_var("CSTEST_OVR_HOST");
        std::env::remove_var("CSTEST_OVR_USER");
    }

    #[test]
    fn test_invalid_port_rejected_at_resolve() {
        let text = r#"{"default": {"type": "mysql", "host": "h", "port": "abc", "user": "u", "database": "d"}}"#;
        let store = ConfigStore::from_json_str(text, "CSTEST_PORT").unwrap();
        assert!(matches!(store.resolve("default"), Err(AppError::ConfigInvalid(_))));
    }

    #[test]
    fn test_items_hide_password() {
        let store = ConfigStore::from_json_str(MIXED, "CSTEST_ITEMS").unwrap();
        let json = serde_json::to_string(&store.items()).unwrap();
        assert!(!json.contains("CSTEST_WAREHOUSE_PW"));
        assert!(json.contains("${CSTEST_LEGACY_HOST}"));
    }
}
