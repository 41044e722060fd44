//! Plugin manager: initializes plugins in order and merges their contributions.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::endpoint::{EndpointTable, Endpoints};
use crate::error::PluginError;
use crate::hooks::registry::HookRegistry;
use crate::host::Host;
use crate::middleware::MiddlewareConfig;
use crate::registry::{Plugin, PluginRegistry};

/// Lifecycle of a [`PluginManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// `initialize` has not run.
    Uninitialized,
    /// Every plugin was initialized and merged.
    Initialized,
    /// `initialize` failed part-way; merged state is partial and must not be used.
    Failed,
}

/// Initializes plugins and exposes their merged endpoints, hooks, and middleware.
///
/// A manager is single-shot: `initialize` runs once, and all accessors are
/// read-only views that are only meaningful after it succeeded. After a
/// failure the manager should be discarded; nothing is rolled back.
pub struct PluginManager<H: Host> {
    /// Plugins in caller-supplied order.
    plugins: PluginRegistry<H>,
    /// Merged endpoints.
    endpoints: EndpointTable<H>,
    /// Hooks from every plugin.
    hooks: HookRegistry,
    /// Middleware, sorted by priority once initialization completes.
    middleware: Vec<MiddlewareConfig<H>>,
    state: ManagerState,
}

impl<H: Host> PluginManager<H> {
    /// Creates a manager over an ordered plugin list.
    ///
    /// Duplicate identifiers are accepted; lookups return the first match.
    pub fn new(plugins: Vec<Arc<dyn Plugin<H>>>) -> Self {
        Self {
            plugins: PluginRegistry::new(plugins),
            endpoints: EndpointTable::new(),
            hooks: HookRegistry::new(),
            middleware: Vec::new(),
            state: ManagerState::Uninitialized,
        }
    }

    /// Creates a manager, rejecting duplicate plugin identifiers.
    pub fn with_unique_ids(plugins: Vec<Arc<dyn Plugin<H>>>) -> Result<Self, PluginError> {
        let manager = Self::new(plugins);
        manager.plugins.ensure_unique_ids()?;
        Ok(manager)
    }

    /// Initializes every plugin in order and merges its contributions.
    ///
    /// For each plugin: run its `initialize`, merge its endpoints (a path
    /// already taken aborts with [`PluginError::EndpointConflict`]), register
    /// its hooks, and collect its middleware. Once every plugin succeeded the
    /// middleware list is stably sorted by ascending priority.
    ///
    /// The first failure aborts and leaves the manager [`ManagerState::Failed`].
    pub async fn initialize(&mut self, ctx: &H::AuthContext) -> Result<(), PluginError> {
        if self.state != ManagerState::Uninitialized {
            return Err(PluginError::AlreadyInitialized);
        }

        match self.initialize_plugins(ctx).await {
            Ok(()) => {
                self.middleware.sort_by_key(|mw| mw.priority);
                self.state = ManagerState::Initialized;

                info!(
                    plugins = self.plugins.len(),
                    endpoints = self.endpoints.len(),
                    middleware = self.middleware.len(),
                    "Plugins initialized"
                );
                Ok(())
            }
            Err(e) => {
                self.state = ManagerState::Failed;
                Err(e)
            }
        }
    }

    async fn initialize_plugins(&mut self, ctx: &H::AuthContext) -> Result<(), PluginError> {
        for plugin in self.plugins.all() {
            let plugin_id = plugin.id();

            plugin
                .initialize(ctx)
                .await
                .map_err(|source| PluginError::Initialization {
                    plugin_id: plugin_id.to_string(),
                    source,
                })?;

            for (path, endpoint) in plugin.endpoints() {
                self.endpoints.insert(plugin_id, path, endpoint)?;
            }

            self.hooks.register(plugin_id, plugin.hooks());

            let middleware = plugin.middleware();
            for mw in &middleware {
                debug!(
                    plugin_id = %plugin_id,
                    path = %mw.path,
                    priority = mw.priority,
                    "Middleware collected"
                );
            }
            self.middleware.extend(middleware);

            debug!(plugin_id = %plugin_id, "Plugin initialized");
        }

        Ok(())
    }

    /// Merged endpoints, keyed by path.
    pub fn endpoints(&self) -> &Endpoints<H> {
        self.endpoints.as_map()
    }

    /// The merged endpoint table, including owners.
    pub fn endpoint_table(&self) -> &EndpointTable<H> {
        &self.endpoints
    }

    /// Plugin that registered `path`.
    pub fn endpoint_owner(&self, path: &str) -> Option<&str> {
        self.endpoints.owner(path)
    }

    /// The hook registry, for the host to drive around each request.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Middleware in application order (ascending priority, stable).
    pub fn middleware(&self) -> &[MiddlewareConfig<H>] {
        &self.middleware
    }

    /// First plugin with this identifier.
    pub fn get_plugin(&self, plugin_id: &str) -> Option<&Arc<dyn Plugin<H>>> {
        self.plugins.get(plugin_id)
    }

    /// Whether a plugin with this identifier was supplied.
    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugins.contains(plugin_id)
    }

    /// All plugins in construction order.
    pub fn plugins(&self) -> &[Arc<dyn Plugin<H>>] {
        self.plugins.all()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Whether `initialize` completed successfully.
    pub fn is_initialized(&self) -> bool {
        self.state == ManagerState::Initialized
    }
}

impl<H: Host> fmt::Debug for PluginManager<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.plugins)
            .field("endpoints", &self.endpoints)
            .field("hooks", &self.hooks)
            .field("middleware", &self.middleware)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::builder::BasicPlugin;
    use crate::hooks::definitions::{Hook, HookConfig, HookPayload, RequestContext};
    use crate::matcher::Matcher;

    struct TestHost;

    impl Host for TestHost {
        type AuthContext = String;
        type Endpoint = &'static str;
        type Handler = Vec<String>;
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn tagged(name: &str, priority: i32) -> MiddlewareConfig<TestHost> {
        let name = name.to_string();
        MiddlewareConfig::new("/", priority, move |mut chain: Vec<String>| {
            chain.push(name.clone());
            chain
        })
    }

    fn order(manager: &PluginManager<TestHost>) -> Vec<String> {
        manager
            .middleware()
            .iter()
            .fold(Vec::new(), |chain, mw| mw.apply(chain))
    }

    fn plugin(id: &str) -> BasicPlugin<TestHost> {
        BasicPlugin::new(id)
    }

    fn boxed(plugin: BasicPlugin<TestHost>) -> Arc<dyn Plugin<TestHost>> {
        Arc::new(plugin)
    }

    #[tokio::test]
    async fn test_disjoint_endpoints_are_merged() {
        let mut manager = PluginManager::new(vec![
            boxed(
                plugin("email")
                    .with_endpoint("/sign-in/email", "email-in")
                    .with_endpoint("/sign-up/email", "email-up"),
            ),
            boxed(plugin("empty")),
            boxed(plugin("oauth").with_endpoint("/callback", "oauth-cb")),
        ]);

        manager.initialize(&"ctx".to_string()).await.unwrap();

        assert!(manager.is_initialized());
        let merged: Vec<(&str, &str)> = manager
            .endpoints()
            .iter()
            .map(|(path, endpoint)| (path.as_str(), *endpoint))
            .collect();
        assert_eq!(
            merged,
            vec![
                ("/callback", "oauth-cb"),
                ("/sign-in/email", "email-in"),
                ("/sign-up/email", "email-up"),
            ]
        );
        assert_eq!(manager.endpoint_owner("/callback"), Some("oauth"));
        assert_eq!(manager.endpoint_owner("/sign-up/email"), Some("email"));
    }

    #[tokio::test]
    async fn test_endpoint_conflict_aborts() {
        let log = Log::default();
        let later = log.clone();
        let mut manager = PluginManager::new(vec![
            boxed(plugin("first").with_endpoint("/session", "one")),
            boxed(plugin("second").with_endpoint("/session", "two")),
            boxed(plugin("third").on_initialize(move |_| {
                later.lock().unwrap().push("third".to_string());
                Ok(())
            })),
        ]);

        let err = manager.initialize(&String::new()).await.unwrap_err();
        match &err {
            PluginError::EndpointConflict {
                path,
                plugin_id,
                existing,
            } => {
                assert_eq!(path, "/session");
                assert_eq!(plugin_id, "second");
                assert_eq!(existing, "first");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("/session"));
        assert_eq!(manager.state(), ManagerState::Failed);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initialization_failure_names_plugin_and_stops() {
        let log = Log::default();
        let seen = log.clone();
        let after = log.clone();
        let mut manager = PluginManager::new(vec![
            boxed(plugin("ok").on_initialize(move |ctx: &String| {
                seen.lock().unwrap().push(format!("ok:{ctx}"));
                Ok(())
            })),
            boxed(plugin("broken").on_initialize(|_| Err("missing secret".into()))),
            boxed(plugin("never").on_initialize(move |_| {
                after.lock().unwrap().push("never".to_string());
                Ok(())
            })),
        ]);

        let err = manager.initialize(&"shared".to_string()).await.unwrap_err();
        assert!(matches!(&err, PluginError::Initialization { plugin_id, .. } if plugin_id == "broken"));
        assert_eq!(err.to_string(), "plugin 'broken' failed to initialize: missing secret");
        assert_eq!(*log.lock().unwrap(), vec!["ok:shared"]);
        assert!(!manager.is_initialized());
    }

    #[tokio::test]
    async fn test_middleware_sorted_by_priority() {
        let mut manager = PluginManager::new(vec![
            boxed(plugin("a").with_middleware(tagged("thirty", 30))),
            boxed(plugin("b").with_middleware(tagged("ten", 10))),
            boxed(plugin("c").with_middleware(tagged("twenty", 20))),
        ]);

        manager.initialize(&String::new()).await.unwrap();

        let priorities: Vec<i32> = manager.middleware().iter().map(|m| m.priority).collect();
        assert_eq!(priorities, vec![10, 20, 30]);
        assert_eq!(order(&manager), vec!["ten", "twenty", "thirty"]);
    }

    #[tokio::test]
    async fn test_middleware_ties_keep_plugin_order() {
        let mut manager = PluginManager::new(vec![
            boxed(plugin("a").with_middleware(tagged("a-50", 50)).with_middleware(tagged("a-10", 10))),
            boxed(plugin("b").with_middleware(tagged("b-50", 50))),
            boxed(plugin("c").with_middleware(tagged("c-10", 10)).with_middleware(tagged("c-50", 50))),
        ]);

        manager.initialize(&String::new()).await.unwrap();

        assert_eq!(order(&manager), vec!["a-10", "c-10", "a-50", "b-50", "c-50"]);
    }

    #[tokio::test]
    async fn test_hooks_registered_under_plugin_id() {
        let hook = || Hook::from_fn(Matcher::all(), |_, _| Ok(()));
        let mut manager = PluginManager::new(vec![
            boxed(plugin("plain")),
            boxed(plugin("guard").with_hooks(HookConfig::new().before(hook()).before(hook()))),
            boxed(plugin("audit").with_hooks(HookConfig::new().after(hook()))),
        ]);

        assert!(!manager.hooks().has_before_hooks());
        assert!(!manager.hooks().has_after_hooks());

        manager.initialize(&String::new()).await.unwrap();

        assert!(manager.hooks().has_before_hooks());
        assert!(manager.hooks().has_after_hooks());
        assert_eq!(manager.hooks().before_hooks("guard").len(), 2);
        assert_eq!(manager.hooks().after_hooks("audit").len(), 1);
        assert!(manager.hooks().before_hooks("plain").is_empty());

        manager
            .hooks()
            .execute_before(&RequestContext::new(), "/", "GET", &HookPayload::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_plugin_lookup() {
        let manager = PluginManager::new(vec![
            boxed(plugin("a").with_endpoint("/first", "first")),
            boxed(plugin("b")),
            boxed(plugin("a").with_endpoint("/second", "second")),
        ]);

        assert!(manager.has_plugin("a"));
        assert!(manager.has_plugin("b"));
        assert!(!manager.has_plugin("c"));
        assert!(manager.get_plugin("c").is_none());

        let first = manager.get_plugin("a").unwrap();
        assert!(first.endpoints().contains_key("/first"));
        assert_eq!(manager.plugins().len(), 3);
    }

    #[test]
    fn test_unique_ids_enforced_on_request() {
        let plugins = || {
            vec![
                boxed(plugin("a")),
                boxed(plugin("a")),
            ]
        };

        assert!(PluginManager::new(plugins()).has_plugin("a"));
        let err = PluginManager::with_unique_ids(plugins()).unwrap_err();
        assert!(matches!(err, PluginError::DuplicatePlugin(id) if id == "a"));
    }

    #[tokio::test]
    async fn test_initialize_is_single_shot() {
        let mut manager = PluginManager::new(vec![boxed(plugin("a").with_endpoint("/a", "a"))]);
        assert_eq!(manager.state(), ManagerState::Uninitialized);

        manager.initialize(&String::new()).await.unwrap();
        let err = manager.initialize(&String::new()).await.unwrap_err();
        assert!(matches!(err, PluginError::AlreadyInitialized));
        assert_eq!(manager.endpoints().len(), 1);
        assert!(manager.is_initialized());
    }

    #[tokio::test]
    async fn test_empty_manager_initializes() {
        let mut manager = PluginManager::<TestHost>::new(Vec::new());
        manager.initialize(&String::new()).await.unwrap();

        assert!(manager.endpoints().is_empty());
        assert!(manager.middleware().is_empty());
        assert!(!manager.hooks().has_before_hooks());
    }
}
