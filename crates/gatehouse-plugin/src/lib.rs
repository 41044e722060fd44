//! # gatehouse-plugin
//!
//! Plugin composition layer for Gatehouse. Provides:
//!
//! - The [`Plugin`] capability trait with no-op defaults
//! - Endpoint merging with conflict detection
//! - A hook registry with before/after phases and request matchers
//! - Middleware collection, stably ordered by priority
//! - The [`PluginManager`] that initializes plugins and merges their contributions
//!
//! Everything is generic over a [`Host`], the bundle of transport-owned types
//! (authentication context, endpoint value, request handler). The crate never
//! serves requests itself.

pub mod builder;
pub mod endpoint;
pub mod error;
pub mod hooks;
pub mod host;
pub mod macros;
pub mod manager;
pub mod matcher;
pub mod middleware;
pub mod prelude;
pub mod registry;
pub mod traits;

pub use builder::BasicPlugin;
pub use endpoint::{EndpointTable, Endpoints};
pub use error::{BoxError, PluginError};
pub use hooks::definitions::{Hook, HookConfig, HookHandler, HookPayload, HookPhase, RequestContext};
pub use hooks::registry::HookRegistry;
pub use host::Host;
pub use manager::{ManagerState, PluginManager};
pub use matcher::Matcher;
pub use middleware::{DEFAULT_PRIORITY, MiddlewareConfig};
pub use registry::{Plugin, PluginRegistry};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
