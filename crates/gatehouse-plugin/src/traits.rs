//! Closure adapters for the [`HookHandler`] trait.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::BoxError;
use crate::hooks::definitions::{HookHandler, HookPayload, RequestContext};

type BoxedHandlerFn =
    Arc<dyn Fn(&RequestContext, &HookPayload) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A closure-based async hook handler.
///
/// The returned future must own what it needs: clone out of the context or
/// payload before the `async move` block.
#[derive(Clone)]
pub struct ClosureHandler {
    /// Handler function.
    handler: BoxedHandlerFn,
}

impl ClosureHandler {
    /// Creates a new closure-based handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(&RequestContext, &HookPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            handler: Arc::new(
                move |ctx: &RequestContext,
                      payload: &HookPayload|
                      -> BoxFuture<'static, Result<(), BoxError>> {
                    Box::pin(handler(ctx, payload))
                },
            ),
        }
    }
}

impl fmt::Debug for ClosureHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureHandler")
            .field("handler", &"<closure>")
            .finish()
    }
}

#[async_trait]
impl HookHandler for ClosureHandler {
    async fn handle(&self, ctx: &RequestContext, payload: &HookPayload) -> Result<(), BoxError> {
        (self.handler)(ctx, payload).await
    }
}

/// A hook handler backed by a synchronous closure.
pub struct SyncHandler<F> {
    handler: F,
}

impl<F> SyncHandler<F>
where
    F: Fn(&RequestContext, &HookPayload) -> Result<(), BoxError> + Send + Sync + 'static,
{
    /// Wraps a synchronous closure.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> fmt::Debug for SyncHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandler")
            .field("handler", &"<closure>")
            .finish()
    }
}

#[async_trait]
impl<F> HookHandler for SyncHandler<F>
where
    F: Fn(&RequestContext, &HookPayload) -> Result<(), BoxError> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &RequestContext, payload: &HookPayload) -> Result<(), BoxError> {
        (self.handler)(ctx, payload)
    }
}
