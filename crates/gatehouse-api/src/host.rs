//! Axum binding of the plugin layer's host types.

use axum::Router;
use axum::routing::MethodRouter;

use gatehouse_plugin::Host;

use crate::context::AuthContext;

/// Host whose endpoints are axum method routers and whose middleware wraps routers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxumHost;

impl Host for AxumHost {
    type AuthContext = AuthContext;
    type Endpoint = MethodRouter;
    type Handler = Router;
}
