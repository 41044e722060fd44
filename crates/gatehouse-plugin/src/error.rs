//! Errors produced while composing plugins or running their hooks.

use thiserror::Error;

use gatehouse_core::error::{AppError, ErrorKind};

use crate::hooks::definitions::HookPhase;

/// Boxed error returned by plugin initialization and hook handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the plugin manager and hook registry.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A plugin's `initialize` failed. Fatal for the whole manager.
    #[error("plugin '{plugin_id}' failed to initialize: {source}")]
    Initialization {
        /// Plugin that failed.
        plugin_id: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// Two plugins declared the same endpoint path.
    #[error("endpoint '{path}' from plugin '{plugin_id}' is already registered by plugin '{existing}'")]
    EndpointConflict {
        /// The contested path.
        path: String,
        /// Plugin whose registration was rejected.
        plugin_id: String,
        /// Plugin that registered the path first.
        existing: String,
    },

    /// A matched hook's handler failed.
    #[error("{phase} hook #{index} of plugin '{plugin_id}' failed: {source}")]
    HookFailed {
        /// Plugin owning the hook.
        plugin_id: String,
        /// Phase being executed.
        phase: HookPhase,
        /// Position of the hook within the plugin's sequence for that phase.
        index: usize,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// Two plugins share an identifier and uniqueness was requested.
    #[error("duplicate plugin identifier '{0}'")]
    DuplicatePlugin(String),

    /// `initialize` was called on a manager that already ran it.
    #[error("plugin manager has already been initialized")]
    AlreadyInitialized,
}

impl PluginError {
    /// Identifier of the plugin this error is attributed to, if any.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::Initialization { plugin_id, .. }
            | Self::EndpointConflict { plugin_id, .. }
            | Self::HookFailed { plugin_id, .. } => Some(plugin_id),
            Self::DuplicatePlugin(id) => Some(id),
            Self::AlreadyInitialized => None,
        }
    }
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        let kind = match &err {
            // A handler that rejects with an `AppError` keeps its own category.
            PluginError::HookFailed { source, .. } => source
                .downcast_ref::<AppError>()
                .map(|inner| inner.kind)
                .unwrap_or(ErrorKind::Plugin),
            PluginError::EndpointConflict { .. } | PluginError::DuplicatePlugin(_) => {
                ErrorKind::Conflict
            }
            PluginError::Initialization { .. } | PluginError::AlreadyInitialized => {
                ErrorKind::Plugin
            }
        };
        let message = match &err {
            PluginError::HookFailed { source, .. } => match source.downcast_ref::<AppError>() {
                Some(inner) => inner.message.clone(),
                None => err.to_string(),
            },
            _ => err.to_string(),
        };

        AppError::with_source(kind, message, err)
    }
}
