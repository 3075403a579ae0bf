//! Application state for the inspect service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::adapter::Timeouts;
use crate::config_store::ConfigStore;
use crate::registry::ConnectionRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Creates a new application state over a loaded configuration store.
    pub fn new(config: AppConfig, store: ConfigStore) -> Self {
        let timeouts = Timeouts::from(&config);
        Self {
            registry: Arc::new(ConnectionRegistry::new(Arc::new(store), timeouts)),
            config,
        }
    }
}
