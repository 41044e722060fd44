//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use crate::builder::BasicPlugin;
pub use crate::endpoint::Endpoints;
pub use crate::error::{BoxError, PluginError};
pub use crate::hooks::definitions::{
    Hook, HookConfig, HookHandler, HookPayload, HookPhase, RequestContext,
};
pub use crate::host::Host;
pub use crate::matcher::Matcher;
pub use crate::middleware::{DEFAULT_PRIORITY, MiddlewareConfig};
pub use crate::registry::Plugin;

pub use crate::hook_payload;
