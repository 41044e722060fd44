//! Hook system: hook definitions and the phase-separated registry.

pub mod definitions;
pub mod registry;

pub use definitions::{Hook, HookConfig, HookHandler, HookPayload, HookPhase, RequestContext};
pub use registry::HookRegistry;
