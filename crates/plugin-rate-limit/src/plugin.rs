//! Rate limit plugin: registers with the Gatehouse plugin system.

use std::net::SocketAddr;
use std::sync::OnceLock;

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::http::header::RETRY_AFTER;
use axum::middleware::{self as axum_middleware, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use gatehouse_api::{ApiError, AuthContext, AxumHost};
use gatehouse_core::error::{AppError, ErrorKind};
use gatehouse_plugin::{BoxError, Endpoints, MiddlewareConfig, Plugin};

use crate::config::RateLimitSettings;
use crate::limiter::{BucketStatus, RateLimiter};

/// Plugin identifier, also the settings key.
pub const PLUGIN_ID: &str = "rate-limit";

/// Path of the status endpoint.
pub const STATUS_PATH: &str = "/rate-limit/status";

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug)]
struct Active {
    settings: RateLimitSettings,
    limiter: RateLimiter,
}

/// Token-bucket rate limiting plugin.
///
/// Settings are read once during `initialize`. Until then the plugin has no
/// limiter and contributes no endpoints or middleware.
#[derive(Debug, Default)]
pub struct RateLimitPlugin {
    active: OnceLock<Active>,
}

impl RateLimitPlugin {
    /// Create an uninitialized plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a plugin with fixed settings, ignoring configuration.
    pub fn with_settings(settings: RateLimitSettings) -> Result<Self, AppError> {
        let plugin = Self::new();
        plugin.activate(settings)?;
        Ok(plugin)
    }

    /// Settings in effect, once initialized.
    pub fn settings(&self) -> Option<&RateLimitSettings> {
        self.active.get().map(|active| &active.settings)
    }

    /// The shared limiter, once initialized.
    pub fn limiter(&self) -> Option<&RateLimiter> {
        self.active.get().map(|active| &active.limiter)
    }

    fn activate(&self, settings: RateLimitSettings) -> Result<(), AppError> {
        settings.validate().map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid rate limit settings: {e}"),
                e,
            )
        })?;

        self.active
            .set(Active::new(settings))
            .map_err(|_| AppError::plugin("Rate limit plugin is already initialized"))
    }
}

impl Active {
    fn new(settings: RateLimitSettings) -> Self {
        let limiter = RateLimiter::new(settings.max_tokens, settings.refill_per_second)
            .with_prune_every(settings.prune_every);
        Self { settings, limiter }
    }
}

#[async_trait]
impl Plugin<AxumHost> for RateLimitPlugin {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    async fn initialize(&self, ctx: &AuthContext) -> Result<(), BoxError> {
        let settings: RateLimitSettings = ctx.settings(PLUGIN_ID)?;
        let (max_tokens, refill_per_second) = (settings.max_tokens, settings.refill_per_second);
        let (scope, priority) = (settings.scope.clone(), settings.priority);
        self.activate(settings)?;

        tracing::info!(
            max_tokens,
            refill_per_second,
            scope = %scope,
            priority,
            "Rate limit plugin initialized"
        );
        Ok(())
    }

    fn endpoints(&self) -> Endpoints<AxumHost> {
        let mut endpoints = Endpoints::<AxumHost>::new();
        if let Some(limiter) = self.limiter() {
            endpoints.insert(
                STATUS_PATH.to_string(),
                get(status).with_state(limiter.clone()),
            );
        }
        endpoints
    }

    fn middleware(&self) -> Vec<MiddlewareConfig<AxumHost>> {
        let Some(active) = self.active.get() else {
            return Vec::new();
        };
        let limiter = active.limiter.clone();

        vec![MiddlewareConfig::new(
            active.settings.scope.clone(),
            active.settings.priority,
            move |router: Router| {
                router.layer(axum_middleware::from_fn_with_state(limiter.clone(), enforce))
            },
        )]
    }
}

/// Rejects the request with 429 once the client's bucket is empty.
async fn enforce(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let key = client_key(&request);
    if limiter.check(&key).await {
        return next.run(request).await;
    }

    tracing::debug!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
    let mut response = ApiError::from(AppError::rate_limited("Too many requests")).into_response();
    if let Some(secs) = limiter.retry_after_secs() {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

/// `GET /rate-limit/status`: the caller's bucket, without consuming a token.
async fn status(State(limiter): State<RateLimiter>, request: Request) -> Json<BucketStatus> {
    Json(limiter.status(&client_key(&request)).await)
}

/// First `x-forwarded-for` entry, else the peer IP, else `"unknown"`.
fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::StatusCode;
    use gatehouse_core::config::AppConfig;
    use tower::ServiceExt;

    fn request(path: &str, client: &str) -> Request {
        axum::http::Request::builder()
            .uri(path)
            .header(FORWARDED_FOR, client)
            .body(Body::empty())
            .unwrap()
    }

    fn limited_app(plugin: &RateLimitPlugin) -> Router {
        let router = Router::new().route("/login", get(|| async { "ok" }));
        plugin.middleware()[0].apply(router)
    }

    #[tokio::test]
    async fn test_initialize_reads_settings() {
        let config = AppConfig::from_toml(
            r#"
            [plugins.settings.rate-limit]
            max_tokens = 3
            scope = "/session"
            priority = 5
            "#,
        )
        .unwrap();
        let plugin = RateLimitPlugin::new();
        plugin
            .initialize(&AuthContext::new(Arc::new(config)))
            .await
            .unwrap();

        assert_eq!(plugin.settings().unwrap().max_tokens, 3);
        let middleware = plugin.middleware();
        assert_eq!(middleware.len(), 1);
        assert_eq!(middleware[0].path, "/session");
        assert_eq!(middleware[0].priority, 5);
        assert!(plugin.endpoints().contains_key(STATUS_PATH));
    }

    #[tokio::test]
    async fn test_invalid_settings_fail_initialization() {
        let config = AppConfig::from_toml(
            r#"
            [plugins.settings.rate-limit]
            max_tokens = 0
            "#,
        )
        .unwrap();
        let plugin = RateLimitPlugin::new();
        let err = plugin
            .initialize(&AuthContext::new(Arc::new(config)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[tokio::test]
    async fn test_second_initialize_is_rejected() {
        let plugin = RateLimitPlugin::new();
        let ctx = AuthContext::default();
        plugin.initialize(&ctx).await.unwrap();
        assert!(plugin.initialize(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_with_429_per_client() {
        let plugin = RateLimitPlugin::with_settings(RateLimitSettings {
            max_tokens: 1,
            refill_per_second: 0.5,
            ..Default::default()
        })
        .unwrap();
        let app = limited_app(&plugin);

        let ok = app.clone().oneshot(request("/login", "1.1.1.1")).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let limited = app
            .clone()
            .oneshot(request("/login", "1.1.1.1, 10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.headers()[RETRY_AFTER], "2");

        let other = app.oneshot(request("/login", "2.2.2.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_caller() {
        let plugin = RateLimitPlugin::with_settings(RateLimitSettings {
            max_tokens: 4,
            refill_per_second: 0.0,
            ..Default::default()
        })
        .unwrap();
        plugin.limiter().unwrap().check("3.3.3.3").await;

        let endpoint = plugin.endpoints().remove(STATUS_PATH).unwrap();
        let app = Router::new().route(STATUS_PATH, endpoint);
        let response = app.oneshot(request(STATUS_PATH, "3.3.3.3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["key"], "3.3.3.3");
        assert_eq!(body["remaining"], 3);
        assert_eq!(body["max_tokens"], 4);
    }

    #[tokio::test]
    async fn test_uninitialized_plugin_contributes_nothing() {
        let plugin = RateLimitPlugin::new();
        assert!(plugin.endpoints().is_empty());
        assert!(plugin.middleware().is_empty());
        assert!(plugin.settings().is_none());

        let config = AppConfig::from_toml("[plugins.settings.rate-limit]\nmax_tokens = 7\n").unwrap();
        plugin
            .initialize(&AuthContext::new(Arc::new(config)))
            .await
            .unwrap();
        assert_eq!(plugin.settings().unwrap().max_tokens, 7);
        assert_eq!(plugin.middleware().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spoofed_clients_do_not_accumulate() {
        let plugin = RateLimitPlugin::with_settings(RateLimitSettings {
            max_tokens: 2,
            prune_every: 200,
            ..Default::default()
        })
        .unwrap();
        let app = limited_app(&plugin);
        let limiter = plugin.limiter().unwrap();

        for i in 0..2000 {
            let client = format!("198.51.{}.{}", i / 256, i % 256);
            let response = app.clone().oneshot(request("/login", &client)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            if i % 100 == 99 {
                tokio::time::advance(std::time::Duration::from_secs(1)).await;
            }
        }
        assert!(limiter.tracked().await <= 300);
    }

    #[test]
    fn test_client_key_fallbacks() {
        let bare = axum::http::Request::builder()
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&bare), "unknown");

        let mut peer = axum::http::Request::builder()
            .body(Body::empty())
            .unwrap();
        peer.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(client_key(&peer), "127.0.0.1");
    }
}
