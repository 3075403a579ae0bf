//! Service settings.
//!
//! Read once from the process environment at start-up. Backend configurations
//! (the named database entries) live in a separate JSON source, see
//! `inspect_service::config_store`.

use std::time::Duration;

/// Default path of the backend configuration source.
pub const DEFAULT_DB_CONFIG_PATH: &str = "db_config.json";
/// Default prefix for per-field environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "CHATBI";
/// Default row cap appended by the query gate.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Runtime settings shared by all services.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name, used in logs and response metadata.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path of the backend configuration file.
    pub db_config_path: String,
    /// Prefix of `PREFIX_FIELD` environment overrides.
    pub env_prefix: String,
    /// Timeout for establishing a backend connection.
    pub connect_timeout_secs: u64,
    /// Timeout for the validation probe of a cached connection.
    pub probe_timeout_secs: u64,
    /// Timeout for a single statement.
    pub query_timeout_secs: u64,
    /// Row cap used when a query request does not name one.
    pub default_row_limit: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "inspect-service".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8090,
            db_config_path: DEFAULT_DB_CONFIG_PATH.to_string(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            connect_timeout_secs: 10,
            probe_timeout_secs: 3,
            query_timeout_secs: 30,
            default_row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

impl AppConfig {
    /// Loads settings from the environment for the given service.
    pub fn load_with_service(service: &str) -> Self {
        let defaults = Self::default();
        let config = Self {
            service_name: service.to_string(),
            host: env_or("SERVER_HOST", defaults.host),
            port: env_parse("SERVER_PORT", defaults.port),
            db_config_path: env_or("CHATBI_CONFIG", defaults.db_config_path),
            env_prefix: env_or("CHATBI_ENV_PREFIX", defaults.env_prefix),
            connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            probe_timeout_secs: env_parse("DB_PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs),
            query_timeout_secs: env_parse("DB_QUERY_TIMEOUT_SECS", defaults.query_timeout_secs),
            default_row_limit: env_parse("DEFAULT_ROW_LIMIT", defaults.default_row_limit),
        };
        tracing::debug!(service, ?config, "settings loaded");
        config
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.default_row_limit, 1000);
        assert_eq!(config.env_prefix, "CHATBI");
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_unparseable_value_falls_back() {
        std::env::set_var("APPCONFIG_TEST_BAD_NUMBER", "ten");
        assert_eq!(env_parse("APPCONFIG_TEST_BAD_NUMBER", 10u64), 10);
        std::env::remove_var("APPCONFIG_TEST_BAD_NUMBER");
    }
}
