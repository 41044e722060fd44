//! The plugin capability trait and the fixed, ordered plugin list.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::endpoint::Endpoints;
use crate::error::{BoxError, PluginError};
use crate::hooks::definitions::HookConfig;
use crate::host::Host;
use crate::middleware::MiddlewareConfig;

/// Trait that all plugins implement.
///
/// Every contribution has a no-op default, so a plugin overrides only what
/// it provides. The manager calls `initialize` once, then reads
/// `endpoints`, `hooks`, and `middleware` once each, in that order.
#[async_trait]
pub trait Plugin<H: Host>: Send + Sync + fmt::Debug {
    /// Unique plugin identifier.
    fn id(&self) -> &str;

    /// Called once with the host's authentication context before any
    /// contribution is read.
    async fn initialize(&self, _ctx: &H::AuthContext) -> Result<(), BoxError> {
        Ok(())
    }

    /// Endpoints keyed by path.
    fn endpoints(&self) -> Endpoints<H> {
        Endpoints::<H>::new()
    }

    /// Before/after hooks, if the plugin has any.
    fn hooks(&self) -> Option<HookConfig> {
        None
    }

    /// Middleware contributions.
    fn middleware(&self) -> Vec<MiddlewareConfig<H>> {
        Vec::new()
    }
}

/// The plugin list handed to a manager, in caller-supplied order.
///
/// Lookup by identifier is linear and returns the first match, so a later
/// plugin sharing an identifier is unreachable through [`PluginRegistry::get`].
pub struct PluginRegistry<H: Host> {
    plugins: Vec<Arc<dyn Plugin<H>>>,
}

impl<H: Host> PluginRegistry<H> {
    /// Wraps an ordered plugin list.
    pub fn new(plugins: Vec<Arc<dyn Plugin<H>>>) -> Self {
        Self { plugins }
    }

    /// Fails with the first identifier that appears more than once.
    pub fn ensure_unique_ids(&self) -> Result<(), PluginError> {
        let mut seen = HashSet::new();
        for plugin in &self.plugins {
            if !seen.insert(plugin.id()) {
                return Err(PluginError::DuplicatePlugin(plugin.id().to_string()));
            }
        }
        Ok(())
    }

    /// First plugin whose identifier equals `plugin_id`.
    pub fn get(&self, plugin_id: &str) -> Option<&Arc<dyn Plugin<H>>> {
        self.plugins.iter().find(|p| p.id() == plugin_id)
    }

    /// Whether a plugin with this identifier exists.
    pub fn contains(&self, plugin_id: &str) -> bool {
        self.get(plugin_id).is_some()
    }

    /// Plugin identifiers in order (duplicates included).
    pub fn ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.id()).collect()
    }

    /// All plugins in order.
    pub fn all(&self) -> &[Arc<dyn Plugin<H>>] {
        &self.plugins
    }

    /// Number of plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl<H: Host> fmt::Debug for PluginRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.plugins.iter().map(|p| p.id())).finish()
    }
}
