//! Hook registry: per-plugin before/after hook sequences and their execution.
//!
//! Execution order is deterministic: plugins run in the order they were
//! first registered, and each plugin's hooks run in the order it declared
//! them. The first failing handler stops the phase.

use tracing::{debug, trace};

use crate::error::PluginError;

use super::definitions::{Hook, HookConfig, HookPayload, HookPhase, RequestContext};

/// Hooks registered by one plugin for one phase.
#[derive(Debug, Clone)]
struct HookEntry {
    /// Plugin that registered these hooks.
    plugin_id: String,
    /// Hooks in registration order.
    hooks: Vec<Hook>,
}

/// Insertion-ordered `plugin id → hooks` storage for a single phase.
#[derive(Debug, Clone, Default)]
struct PhaseHooks {
    entries: Vec<HookEntry>,
}

impl PhaseHooks {
    fn append(&mut self, plugin_id: &str, hooks: Vec<Hook>) {
        if hooks.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|e| e.plugin_id == plugin_id) {
            Some(entry) => entry.hooks.extend(hooks),
            None => self.entries.push(HookEntry {
                plugin_id: plugin_id.to_string(),
                hooks,
            }),
        }
    }

    fn get(&self, plugin_id: &str) -> &[Hook] {
        self.entries
            .iter()
            .find(|e| e.plugin_id == plugin_id)
            .map(|e| e.hooks.as_slice())
            .unwrap_or_default()
    }

    fn has_any(&self) -> bool {
        self.entries.iter().any(|e| !e.hooks.is_empty())
    }

    fn count(&self) -> usize {
        self.entries.iter().map(|e| e.hooks.len()).sum()
    }
}

/// Registry of hooks organized by phase and owning plugin.
///
/// Populated while the manager initializes plugins; read-only afterwards.
/// There is no removal operation.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    before: PhaseHooks,
    after: PhaseHooks,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin's hooks to whatever it already registered.
    ///
    /// `None` is a no-op. Nothing is deduplicated: registering the same
    /// bundle twice runs every hook twice.
    pub fn register(&mut self, plugin_id: &str, config: Option<HookConfig>) {
        let Some(config) = config else {
            return;
        };

        let before = config.before.len();
        let after = config.after.len();

        self.before.append(plugin_id, config.before);
        self.after.append(plugin_id, config.after);

        debug!(
            plugin_id = %plugin_id,
            before = before,
            after = after,
            "Hooks registered"
        );
    }

    /// Runs every matching before-hook. See [`HookRegistry::execute`].
    pub async fn execute_before(
        &self,
        ctx: &RequestContext,
        path: &str,
        method: &str,
        payload: &HookPayload,
    ) -> Result<(), PluginError> {
        self.execute(HookPhase::Before, ctx, path, method, payload).await
    }

    /// Runs every matching after-hook. See [`HookRegistry::execute`].
    pub async fn execute_after(
        &self,
        ctx: &RequestContext,
        path: &str,
        method: &str,
        payload: &HookPayload,
    ) -> Result<(), PluginError> {
        self.execute(HookPhase::After, ctx, path, method, payload).await
    }

    /// Runs the hooks of `phase` whose matcher accepts `(path, method)`.
    ///
    /// Plugins are visited in registration order and each plugin's hooks in
    /// declaration order. The first handler error stops execution and is
    /// returned as [`PluginError::HookFailed`] carrying the plugin id and the
    /// hook's index within that plugin's sequence. Hooks that do not match
    /// are never invoked.
    pub async fn execute(
        &self,
        phase: HookPhase,
        ctx: &RequestContext,
        path: &str,
        method: &str,
        payload: &HookPayload,
    ) -> Result<(), PluginError> {
        for entry in &self.phase(phase).entries {
            for (index, hook) in entry.hooks.iter().enumerate() {
                if !hook.matches(path, method) {
                    continue;
                }

                trace!(
                    phase = %phase,
                    plugin_id = %entry.plugin_id,
                    index = index,
                    path = %path,
                    method = %method,
                    "Running hook"
                );

                hook.call(ctx, payload)
                    .await
                    .map_err(|source| PluginError::HookFailed {
                        plugin_id: entry.plugin_id.clone(),
                        phase,
                        index,
                        source,
                    })?;
            }
        }

        Ok(())
    }

    /// Before-hooks registered by a plugin, in order (empty if none).
    pub fn before_hooks(&self, plugin_id: &str) -> &[Hook] {
        self.before.get(plugin_id)
    }

    /// After-hooks registered by a plugin, in order (empty if none).
    pub fn after_hooks(&self, plugin_id: &str) -> &[Hook] {
        self.after.get(plugin_id)
    }

    /// Whether any plugin registered at least one before-hook.
    pub fn has_before_hooks(&self) -> bool {
        self.before.has_any()
    }

    /// Whether any plugin registered at least one after-hook.
    pub fn has_after_hooks(&self) -> bool {
        self.after.has_any()
    }

    /// Whether any hook exists for `phase`.
    pub fn has_hooks(&self, phase: HookPhase) -> bool {
        self.phase(phase).has_any()
    }

    /// Plugins with hooks in `phase`, in execution order.
    pub fn plugin_ids(&self, phase: HookPhase) -> Vec<&str> {
        self.phase(phase)
            .entries
            .iter()
            .map(|e| e.plugin_id.as_str())
            .collect()
    }

    /// Total number of hooks registered for `phase`.
    pub fn hook_count(&self, phase: HookPhase) -> usize {
        self.phase(phase).count()
    }

    fn phase(&self, phase: HookPhase) -> &PhaseHooks {
        match phase {
            HookPhase::Before => &self.before,
            HookPhase::After => &self.after,
        }
    }
}
