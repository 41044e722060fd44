//! Builder for assembling a plugin from parts without writing a dedicated type.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::endpoint::Endpoints;
use crate::error::BoxError;
use crate::hooks::definitions::HookConfig;
use crate::host::Host;
use crate::middleware::MiddlewareConfig;
use crate::registry::Plugin;

type InitFn<H> = Arc<dyn Fn(&<H as Host>::AuthContext) -> Result<(), BoxError> + Send + Sync>;

/// A plugin assembled from an identifier plus whatever contributions it is given.
///
/// # Example
/// ```rust,ignore
/// let plugin = BasicPlugin::<AxumHost>::new("health")
///     .with_endpoint("/health", get(|| async { "ok" }))
///     .with_middleware(MiddlewareConfig::new("/", 50, |router| router));
/// ```
pub struct BasicPlugin<H: Host> {
    /// Plugin identifier.
    id: String,
    /// Optional initialization callback.
    init: Option<InitFn<H>>,
    /// Endpoints handed to the manager.
    endpoints: Endpoints<H>,
    /// Hook bundle handed to the manager.
    hooks: Option<HookConfig>,
    /// Middleware handed to the manager.
    middleware: Vec<MiddlewareConfig<H>>,
}

impl<H: Host> BasicPlugin<H> {
    /// Creates a plugin with no contributions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            init: None,
            endpoints: Endpoints::<H>::new(),
            hooks: None,
            middleware: Vec::new(),
        }
    }

    /// Runs `init` when the manager initializes this plugin.
    pub fn on_initialize<F>(mut self, init: F) -> Self
    where
        F: Fn(&H::AuthContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    /// Adds an endpoint. A repeated path replaces the earlier one within this plugin.
    pub fn with_endpoint(mut self, path: impl Into<String>, endpoint: H::Endpoint) -> Self {
        self.endpoints.insert(path.into(), endpoint);
        self
    }

    /// Appends hooks to this plugin's bundle.
    pub fn with_hooks(mut self, hooks: HookConfig) -> Self {
        let bundle = self.hooks.get_or_insert_with(HookConfig::new);
        bundle.before.extend(hooks.before);
        bundle.after.extend(hooks.after);
        self
    }

    /// Adds a middleware contribution.
    pub fn with_middleware(mut self, middleware: MiddlewareConfig<H>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

#[async_trait]
impl<H: Host> Plugin<H> for BasicPlugin<H> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self, ctx: &H::AuthContext) -> Result<(), BoxError> {
        match &self.init {
            Some(init) => init(ctx),
            None => Ok(()),
        }
    }

    fn endpoints(&self) -> Endpoints<H> {
        self.endpoints.clone()
    }

    fn hooks(&self) -> Option<HookConfig> {
        self.hooks.clone()
    }

    fn middleware(&self) -> Vec<MiddlewareConfig<H>> {
        self.middleware.clone()
    }
}

impl<H: Host> fmt::Debug for BasicPlugin<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicPlugin")
            .field("id", &self.id)
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .field("middleware", &self.middleware)
            .finish()
    }
}
