//! Authentication context handed to plugins at initialization.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use gatehouse_core::config::AppConfig;
use gatehouse_core::error::{AppError, ErrorKind};

/// Shared application state a plugin may read while initializing.
#[derive(Debug, Clone)]
pub struct AuthContext {
    config: Arc<AppConfig>,
}

impl AuthContext {
    /// Wraps the loaded configuration.
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// The full application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Raw `plugins.settings.<plugin_id>` value, if configured.
    pub fn plugin_settings(&self, plugin_id: &str) -> Option<&serde_json::Value> {
        self.config.plugins.settings_for(plugin_id)
    }

    /// Deserializes a plugin's settings, falling back to `T::default()` when
    /// none are configured.
    pub fn settings<T>(&self, plugin_id: &str) -> Result<T, AppError>
    where
        T: DeserializeOwned + Default,
    {
        match self.plugin_settings(plugin_id) {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid settings for plugin '{plugin_id}': {e}"),
                    e,
                )
            }),
            None => Ok(T::default()),
        }
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new(Arc::new(AppConfig::default()))
    }
}
