//! Runs the plugin hook registry around every request.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use gatehouse_plugin::{HookRegistry, RequestContext, hook_payload};

use crate::error::ApiError;

/// Header whose UUID value, when present, becomes the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// State for [`run_hooks`].
#[derive(Debug, Clone)]
pub struct HookState {
    registry: Arc<HookRegistry>,
    timeout: Option<Duration>,
}

impl HookState {
    /// Wraps a registry. A zero timeout means requests carry no deadline.
    pub fn new(registry: Arc<HookRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            timeout: (!timeout.is_zero()).then_some(timeout),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }
}

/// Executes before-hooks, the wrapped route, then after-hooks.
///
/// A failing hook short-circuits into an error response; when a before-hook
/// fails the route is never called. The request's cancellation token is
/// cancelled as soon as this future completes or is dropped. The
/// [`RequestContext`] is also placed in the request extensions for handlers.
pub async fn run_hooks(State(state): State<HookState>, mut request: Request, next: Next) -> Response {
    let registry = state.registry();
    let run_before = registry.has_before_hooks();
    let run_after = registry.has_after_hooks();
    if !run_before && !run_after {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let token = CancellationToken::new();
    let _cancel_on_drop = token.clone().drop_guard();

    let mut ctx = RequestContext::new().with_cancellation(token);
    if let Some(id) = request_id_from(&request) {
        ctx = ctx.with_request_id(id);
    }
    if let Some(timeout) = state.timeout {
        ctx = ctx.with_timeout(timeout);
    }
    let request_id = ctx.request_id().to_string();

    if run_before {
        let payload = hook_payload!({
            "path" => path,
            "method" => method,
            "request_id" => request_id,
        });
        if let Err(err) = registry.execute_before(&ctx, &path, &method, &payload).await {
            warn!(path = %path, method = %method, error = %err, "Before hook rejected request");
            return ApiError::from(err).into_response();
        }
    }

    request.extensions_mut().insert(ctx.clone());
    let response = next.run(request).await;

    if run_after {
        let payload = hook_payload!({
            "path" => path,
            "method" => method,
            "request_id" => request_id,
            "status" => response.status().as_u16(),
        });
        if let Err(err) = registry.execute_after(&ctx, &path, &method, &payload).await {
            warn!(path = %path, method = %method, error = %err, "After hook failed");
            return ApiError::from(err).into_response();
        }
    }

    response
}

fn request_id_from(request: &Request) -> Option<Uuid> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use gatehouse_core::AppError;
    use gatehouse_plugin::{Hook, HookConfig, Matcher};
    use tower::ServiceExt;

    fn app(registry: HookRegistry, timeout: Duration) -> Router {
        let state = HookState::new(Arc::new(registry), timeout);
        Router::new()
            .route("/x", get(|| async { "x" }))
            .route("/y", get(|| async { "y" }))
            .layer(axum::middleware::from_fn_with_state(state, run_hooks))
    }

    fn get_request(path: &str) -> Request {
        axum::http::Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_before_rejection_skips_route() {
        let reached = Arc::new(Mutex::new(false));
        let mut registry = HookRegistry::new();
        registry.register(
            "guard",
            Some(HookConfig::new().before(Hook::from_fn(Matcher::path("/x"), |_, _| {
                Err(AppError::authorization("nope").into())
            }))),
        );
        let seen = Arc::clone(&reached);
        registry.register(
            "recorder",
            Some(HookConfig::new().after(Hook::from_fn(Matcher::all(), move |_, _| {
                *seen.lock().unwrap() = true;
                Ok(())
            }))),
        );

        let app = app(registry, Duration::ZERO);

        let response = app.clone().oneshot(get_request("/x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!*reached.lock().unwrap());

        let response = app.oneshot(get_request("/y")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(*reached.lock().unwrap());
    }

    #[tokio::test]
    async fn test_payload_and_context() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let mut registry = HookRegistry::new();
        registry.register(
            "inspect",
            Some(HookConfig::new().after(Hook::from_fn(Matcher::all(), move |ctx, payload| {
                sink.lock().unwrap().push((
                    ctx.request_id(),
                    ctx.deadline().is_some(),
                    payload.get_string("path").map(str::to_string),
                    payload.get_string("method").map(str::to_string),
                    payload.get_i64("status"),
                    payload.get_uuid("request_id"),
                ));
                Ok(())
            }))),
        );

        let id = Uuid::new_v4();
        let request = axum::http::Request::builder()
            .uri("/y")
            .header(REQUEST_ID_HEADER, id.to_string())
            .body(Body::empty())
            .unwrap();
        let response = app(registry, Duration::from_secs(5))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let captured = captured.lock().unwrap();
        assert_eq!(
            captured.as_slice(),
            &[(
                id,
                true,
                Some("/y".to_string()),
                Some("GET".to_string()),
                Some(200),
                Some(id),
            )]
        );
    }

    #[tokio::test]
    async fn test_after_failure_with_foreign_error_is_500() {
        let mut registry = HookRegistry::new();
        registry.register(
            "flaky",
            Some(HookConfig::new().after(Hook::from_fn(Matcher::all(), |_, _| {
                Err("backend went away".into())
            }))),
        );

        let response = app(registry, Duration::ZERO)
            .oneshot(get_request("/x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_token_cancelled_after_request() {
        let token = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&token);
        let mut registry = HookRegistry::new();
        registry.register(
            "keep",
            Some(HookConfig::new().before(Hook::from_fn(Matcher::all(), move |ctx, _| {
                assert!(!ctx.is_cancelled());
                *slot.lock().unwrap() = Some(ctx.cancellation().clone());
                Ok(())
            }))),
        );

        app(registry, Duration::ZERO)
            .oneshot(get_request("/x"))
            .await
            .unwrap();

        let token = token.lock().unwrap().take().unwrap();
        assert!(token.is_cancelled());
    }
}
