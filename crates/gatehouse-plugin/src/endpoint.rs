//! Merged endpoint table with conflict detection.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::PluginError;
use crate::host::Host;

/// Endpoints declared by one plugin, keyed by path.
pub type Endpoints<H> = BTreeMap<String, <H as Host>::Endpoint>;

/// Path → endpoint table merged across all plugins.
///
/// Each path maps to exactly one endpoint; a second insert at the same path
/// is rejected, never overwritten. The owning plugin of each path is kept
/// for diagnostics.
pub struct EndpointTable<H: Host> {
    endpoints: Endpoints<H>,
    owners: HashMap<String, String>,
}

impl<H: Host> EndpointTable<H> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Inserts `endpoint` at `path` on behalf of `plugin_id`.
    pub fn insert(
        &mut self,
        plugin_id: &str,
        path: String,
        endpoint: H::Endpoint,
    ) -> Result<(), PluginError> {
        if let Some(existing) = self.owners.get(&path) {
            return Err(PluginError::EndpointConflict {
                path,
                plugin_id: plugin_id.to_string(),
                existing: existing.clone(),
            });
        }

        self.owners.insert(path.clone(), plugin_id.to_string());
        self.endpoints.insert(path, endpoint);
        Ok(())
    }

    /// The endpoint registered at `path`.
    pub fn get(&self, path: &str) -> Option<&H::Endpoint> {
        self.endpoints.get(path)
    }

    /// The plugin that registered `path`.
    pub fn owner(&self, path: &str) -> Option<&str> {
        self.owners.get(path).map(String::as_str)
    }

    /// Whether `path` is registered.
    pub fn contains(&self, path: &str) -> bool {
        self.endpoints.contains_key(path)
    }

    /// Registered paths in ascending order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// The merged map.
    pub fn as_map(&self) -> &Endpoints<H> {
        &self.endpoints
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl<H: Host> Default for EndpointTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> fmt::Debug for EndpointTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.endpoints.keys().map(|path| (path, self.owners.get(path))))
            .finish()
    }
}
