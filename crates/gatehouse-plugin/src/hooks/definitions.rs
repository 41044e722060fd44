//! Hook building blocks: phases, request context, payload, handlers, and hook bundles.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::BoxError;
use crate::matcher::Matcher;
use crate::traits::{ClosureHandler, SyncHandler};

/// When a hook runs relative to request handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Before the endpoint handles the request.
    Before,
    /// After the endpoint produced a response.
    After,
}

impl HookPhase {
    /// Returns the string name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped cancellation and deadline carrier handed to every hook.
///
/// The registry never enforces the deadline or checks the token itself;
/// handlers doing slow work are expected to honor both.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context with a fresh request id, no deadline, and a new token.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Uses an existing request id instead of a generated one.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Uses the given cancellation token (e.g. a child of a server-wide token).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The request id.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The cancellation token for this request.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether a deadline is set and has passed.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload passed to hook handlers: a flexible key-value map.
///
/// The keys present depend on the host and the matcher scope; handlers and
/// callers agree on them out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookPayload {
    /// Arbitrary data keyed by string.
    pub data: HashMap<String, serde_json::Value>,
    /// The authenticated actor, when known.
    pub actor_id: Option<Uuid>,
    /// When the payload was created.
    pub timestamp: DateTime<Utc>,
}

impl HookPayload {
    /// Creates an empty payload stamped with the current time.
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            actor_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the actor ID.
    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Inserts a typed data value.
    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// Inserts a string value.
    pub fn with_string(self, key: &str, value: &str) -> Self {
        self.with_data(key, serde_json::json!(value))
    }

    /// Inserts an integer value.
    pub fn with_int(self, key: &str, value: i64) -> Self {
        self.with_data(key, serde_json::json!(value))
    }

    /// Inserts a boolean value.
    pub fn with_bool(self, key: &str, value: bool) -> Self {
        self.with_data(key, serde_json::json!(value))
    }

    /// Inserts a data value in place.
    pub fn insert(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_string(), value);
    }

    /// Gets a data value by key.
    pub fn get_data(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a string data value.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Gets a UUID data value.
    pub fn get_uuid(&self, key: &str) -> Option<Uuid> {
        self.get_string(key).and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Gets an i64 data value.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }

    /// Gets a bool data value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(|v| v.as_bool())
    }
}

impl Default for HookPayload {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for hook handler implementations.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handles a hook invocation. An `Err` stops the current phase.
    async fn handle(&self, ctx: &RequestContext, payload: &HookPayload) -> Result<(), BoxError>;
}

/// A matcher paired with the handler it guards. Immutable once built.
#[derive(Clone)]
pub struct Hook {
    matcher: Matcher,
    handler: Arc<dyn HookHandler>,
}

impl Hook {
    /// Creates a hook from a matcher and a shared handler.
    pub fn new(matcher: Matcher, handler: Arc<dyn HookHandler>) -> Self {
        Self { matcher, handler }
    }

    /// Creates a hook from a synchronous closure.
    pub fn from_fn<F>(matcher: Matcher, handler: F) -> Self
    where
        F: Fn(&RequestContext, &HookPayload) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::new(matcher, Arc::new(SyncHandler::new(handler)))
    }

    /// Creates a hook from a closure returning a future.
    pub fn from_async<F, Fut>(matcher: Matcher, handler: F) -> Self
    where
        F: Fn(&RequestContext, &HookPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::new(matcher, Arc::new(ClosureHandler::new(handler)))
    }

    /// The matcher guarding this hook.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The handler invoked when the matcher accepts.
    pub fn handler(&self) -> &Arc<dyn HookHandler> {
        &self.handler
    }

    /// Evaluates the matcher.
    pub fn matches(&self, path: &str, method: &str) -> bool {
        self.matcher.matches(path, method)
    }

    /// Invokes the handler unconditionally.
    pub async fn call(&self, ctx: &RequestContext, payload: &HookPayload) -> Result<(), BoxError> {
        self.handler.handle(ctx, payload).await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("matcher", &self.matcher)
            .field("handler", &"<handler>")
            .finish()
    }
}

/// A plugin's declared before- and after-hooks, each in registration order.
#[derive(Debug, Clone, Default)]
pub struct HookConfig {
    /// Hooks run before the endpoint.
    pub before: Vec<Hook>,
    /// Hooks run after the endpoint.
    pub after: Vec<Hook>,
}

impl HookConfig {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a before-hook.
    pub fn before(mut self, hook: Hook) -> Self {
        self.before.push(hook);
        self
    }

    /// Appends an after-hook.
    pub fn after(mut self, hook: Hook) -> Self {
        self.after.push(hook);
        self
    }

    /// Hooks for a phase.
    pub fn phase(&self, phase: HookPhase) -> &[Hook] {
        match phase {
            HookPhase::Before => &self.before,
            HookPhase::After => &self.after,
        }
    }

    /// Whether the bundle holds no hooks at all.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}
