//! Audit plugin: registers with the Gatehouse plugin system.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::Json;
use axum::extract::{Query, State};
use axum::routing::get;
use serde::{Deserialize, Serialize};

use gatehouse_api::{AuthContext, AxumHost};
use gatehouse_core::error::AppError;
use gatehouse_plugin::{BoxError, Endpoints, Hook, HookConfig, Matcher, Plugin};

use crate::hooks::RecordRequestHook;
use crate::log::{AuditLog, AuditRecord};

/// Plugin identifier, also the settings key.
pub const PLUGIN_ID: &str = "audit";

/// Path of the listing endpoint.
pub const RECENT_PATH: &str = "/audit/recent";

/// Audit settings read from `plugins.settings.audit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Records kept before the oldest is evicted.
    pub capacity: usize,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Query parameters for `GET /audit/recent`.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Maximum records returned; defaults to the whole log.
    pub limit: Option<usize>,
}

/// Records every request's outcome.
///
/// The log is created during `initialize`; before that the plugin contributes
/// no endpoints or hooks.
#[derive(Debug, Default)]
pub struct AuditPlugin {
    log: OnceLock<Arc<AuditLog>>,
}

impl AuditPlugin {
    /// Create an uninitialized plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared log, once initialized.
    pub fn log(&self) -> Option<&Arc<AuditLog>> {
        self.log.get()
    }
}

#[async_trait]
impl Plugin<AxumHost> for AuditPlugin {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    async fn initialize(&self, ctx: &AuthContext) -> Result<(), BoxError> {
        let settings: AuditSettings = ctx.settings(PLUGIN_ID)?;
        if settings.capacity == 0 {
            return Err(AppError::configuration("audit capacity must be at least 1").into());
        }

        self.log
            .set(Arc::new(AuditLog::new(settings.capacity)))
            .map_err(|_| AppError::plugin("Audit plugin is already initialized"))?;

        tracing::info!(capacity = settings.capacity, "Audit plugin initialized");
        Ok(())
    }

    fn endpoints(&self) -> Endpoints<AxumHost> {
        let mut endpoints = Endpoints::<AxumHost>::new();
        if let Some(log) = self.log() {
            endpoints.insert(RECENT_PATH.to_string(), get(recent).with_state(Arc::clone(log)));
        }
        endpoints
    }

    fn hooks(&self) -> Option<HookConfig> {
        let recorder = RecordRequestHook::new(Arc::clone(self.log()?));
        Some(HookConfig::new().after(Hook::new(Matcher::all(), Arc::new(recorder))))
    }
}

/// `GET /audit/recent`: newest records first.
async fn recent(
    State(log): State<Arc<AuditLog>>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<AuditRecord>> {
    let limit = query.limit.unwrap_or(log.capacity());
    Json(log.recent(limit).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use chrono::Utc;
    use gatehouse_core::config::AppConfig;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn context(toml: &str) -> AuthContext {
        AuthContext::new(Arc::new(AppConfig::from_toml(toml).unwrap()))
    }

    #[tokio::test]
    async fn test_initialize_sets_capacity() {
        let plugin = AuditPlugin::new();
        plugin
            .initialize(&context("[plugins.settings.audit]\ncapacity = 3\n"))
            .await
            .unwrap();
        assert_eq!(plugin.log().unwrap().capacity(), 3);

        let hooks = plugin.hooks().unwrap();
        assert!(hooks.before.is_empty());
        assert_eq!(hooks.after.len(), 1);
        assert!(hooks.after[0].matches("/anything", "PATCH"));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_rejected() {
        let plugin = AuditPlugin::new();
        let result = plugin
            .initialize(&context("[plugins.settings.audit]\ncapacity = 0\n"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_contributions_wait_for_initialize() {
        let plugin = AuditPlugin::new();
        assert!(plugin.endpoints().is_empty());
        assert!(plugin.hooks().is_none());
        assert!(plugin.log().is_none());

        plugin
            .initialize(&context("[plugins.settings.audit]\ncapacity = 5\n"))
            .await
            .unwrap();
        assert_eq!(plugin.log().unwrap().capacity(), 5);
        assert!(plugin.endpoints().contains_key(RECENT_PATH));
    }

    #[tokio::test]
    async fn test_recent_endpoint_honors_limit() {
        let plugin = AuditPlugin::new();
        plugin.initialize(&AuthContext::default()).await.unwrap();
        for (i, path) in ["/a", "/b", "/c"].into_iter().enumerate() {
            plugin
                .log()
                .unwrap()
                .push(AuditRecord {
                    method: "GET".to_string(),
                    path: path.to_string(),
                    status: 200 + i as u16,
                    request_id: Uuid::new_v4(),
                    timestamp: Utc::now(),
                })
                .await;
        }

        let endpoint = plugin.endpoints().remove(RECENT_PATH).unwrap();
        let app = Router::new().route(RECENT_PATH, endpoint);
        let request = axum::http::Request::builder()
            .uri("/audit/recent?limit=2")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let records: Vec<AuditRecord> = serde_json::from_slice(&bytes).unwrap();
        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/c", "/b"]);
    }
}
