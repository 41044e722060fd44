//! Middleware contributions: transforms over the host's handler type, ordered by priority.

use std::fmt;
use std::sync::Arc;

use crate::host::Host;

/// Priority used when a plugin does not pick one (lower runs first).
pub const DEFAULT_PRIORITY: i32 = 100;

/// A transform that wraps the host's request handler.
pub type MiddlewareFn<H> = Arc<dyn Fn(<H as Host>::Handler) -> <H as Host>::Handler + Send + Sync>;

/// A plugin's middleware contribution.
///
/// The plugin layer only orders these; the host decides how `path` scopes
/// apply and when `apply` is called.
pub struct MiddlewareConfig<H: Host> {
    /// Path scope, interpreted by the host.
    pub path: String,
    /// Ordering key; lower runs first.
    pub priority: i32,
    transform: MiddlewareFn<H>,
}

impl<H: Host> MiddlewareConfig<H> {
    /// Creates a contribution with an explicit priority.
    pub fn new<F>(path: impl Into<String>, priority: i32, transform: F) -> Self
    where
        F: Fn(H::Handler) -> H::Handler + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            priority,
            transform: Arc::new(transform),
        }
    }

    /// Creates a contribution at [`DEFAULT_PRIORITY`].
    pub fn with_default_priority<F>(path: impl Into<String>, transform: F) -> Self
    where
        F: Fn(H::Handler) -> H::Handler + Send + Sync + 'static,
    {
        Self::new(path, DEFAULT_PRIORITY, transform)
    }

    /// Wraps `handler` with this middleware.
    pub fn apply(&self, handler: H::Handler) -> H::Handler {
        (self.transform)(handler)
    }

    /// The shared transform.
    pub fn transform(&self) -> &MiddlewareFn<H> {
        &self.transform
    }
}

impl<H: Host> Clone for MiddlewareConfig<H> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            priority: self.priority,
            transform: Arc::clone(&self.transform),
        }
    }
}

impl<H: Host> fmt::Debug for MiddlewareConfig<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareConfig")
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("transform", &"<fn>")
            .finish()
    }
}
