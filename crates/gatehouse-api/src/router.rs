//! Router assembly from an initialized plugin manager.
//!
//! Every endpoint is mounted on its own route so middleware can be scoped per
//! path. Middleware is applied innermost-first, walking the priority-sorted
//! list backwards, so the lowest priority ends up outermost and sees the
//! request first. The merged router is then wrapped with the hook layer,
//! HTTP tracing, and request logging.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware as axum_middleware;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use gatehouse_core::config::ServerConfig;
use gatehouse_plugin::PluginManager;

use crate::host::AxumHost;
use crate::middleware::hooks::{HookState, run_hooks};
use crate::middleware::logging::request_logging;

/// Build the Axum router serving everything the plugins contributed.
///
/// Endpoints axum cannot route are skipped with a warning instead of failing
/// startup: paths not starting with `/`, `:name`/`*name` capture segments, and
/// paths whose captures overlap a route that is already mounted (for example
/// `/users/{name}` after `/users/{id}`). Endpoints are mounted in path order,
/// so the lexicographically first of two overlapping paths wins.
pub fn build_router(manager: &PluginManager<AxumHost>, server: &ServerConfig) -> Router {
    let mut router = Router::new();
    let mut mounted: HashMap<String, &str> = HashMap::new();

    for (path, endpoint) in manager.endpoints() {
        let owner = manager.endpoint_owner(path);
        if let Some(reason) = path_problem(path) {
            warn!(path = %path, owner = ?owner, reason, "Skipping endpoint with invalid path");
            continue;
        }

        let shape = route_shape(path);
        if let Some(existing) = mounted.get(&shape) {
            warn!(
                path = %path,
                owner = ?owner,
                overlaps = %existing,
                "Skipping endpoint that overlaps a mounted route"
            );
            continue;
        }

        let Some(mut route) = catch_route_panic(|| Router::new().route(path, endpoint.clone()))
        else {
            warn!(path = %path, owner = ?owner, "Skipping endpoint rejected by the router");
            continue;
        };

        for middleware in manager
            .middleware()
            .iter()
            .rev()
            .filter(|mw| scope_matches(&mw.path, path))
        {
            debug!(
                path = %path,
                scope = %middleware.path,
                priority = middleware.priority,
                "Applying middleware"
            );
            route = middleware.apply(route);
        }

        match catch_route_panic(|| router.clone().merge(route)) {
            Some(merged) => {
                router = merged;
                mounted.insert(shape, path);
            }
            None => warn!(
                path = %path,
                owner = ?owner,
                "Skipping endpoint that conflicts with a mounted route"
            ),
        }
    }

    let hooks = HookState::new(
        Arc::new(manager.hooks().clone()),
        Duration::from_secs(server.request_timeout_seconds),
    );

    router
        .layer(axum_middleware::from_fn_with_state(hooks, run_hooks))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(request_logging))
}

/// Why axum would refuse `path`, if it would.
fn path_problem(path: &str) -> Option<&'static str> {
    if !path.starts_with('/') {
        return Some("path must start with '/'");
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Some("captures must use {name} or {*name}");
    }
    None
}

/// `path` with capture names erased: `/users/{id}` and `/users/{name}` share
/// the shape `/users/{}`.
fn route_shape(path: &str) -> String {
    let mut shape = String::with_capacity(path.len());
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c != '{' {
            shape.push(c);
            continue;
        }
        let capture: String = chars.by_ref().take_while(|&c| c != '}').collect();
        shape.push_str(if capture.starts_with('*') { "{*}" } else { "{}" });
    }
    shape
}

/// Axum reports route conflicts by panicking; turn that into `None`.
fn catch_route_panic(build: impl FnOnce() -> Router) -> Option<Router> {
    panic::catch_unwind(AssertUnwindSafe(build)).ok()
}

/// Whether a middleware scope covers `path`.
///
/// An empty scope, `"/"`, or `"*"` covers every path. Any other scope is a
/// segment-aware prefix: `/admin` covers `/admin` and `/admin/users` but not
/// `/administrator`.
pub fn scope_matches(scope: &str, path: &str) -> bool {
    let scope = scope.trim_end_matches('/');
    if scope.is_empty() || scope == "*" {
        return true;
    }

    match path.strip_prefix(scope) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
