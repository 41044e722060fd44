//! Plugin system configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Plugin system configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Identifiers of compiled-in plugins that should not be handed to the manager.
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Reject duplicate plugin identifiers when the manager is constructed.
    #[serde(default)]
    pub enforce_unique_ids: bool,
    /// Free-form per-plugin settings, keyed by plugin identifier.
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
}

impl PluginConfig {
    /// Whether the plugin with this identifier is disabled.
    pub fn is_disabled(&self, plugin_id: &str) -> bool {
        self.disabled.iter().any(|id| id == plugin_id)
    }

    /// Raw settings for a plugin, if any were configured.
    pub fn settings_for(&self, plugin_id: &str) -> Option<&serde_json::Value> {
        self.settings.get(plugin_id)
    }
}
