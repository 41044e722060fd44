//! Hook implementation for the audit plugin.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use gatehouse_core::error::AppError;
use gatehouse_plugin::{BoxError, HookHandler, HookPayload, RequestContext};

use crate::log::{AuditLog, AuditRecord};

/// After-hook that appends the request outcome to the audit log.
pub struct RecordRequestHook {
    log: Arc<AuditLog>,
}

impl RecordRequestHook {
    /// Create a hook writing into `log`.
    pub fn new(log: Arc<AuditLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl HookHandler for RecordRequestHook {
    async fn handle(&self, ctx: &RequestContext, payload: &HookPayload) -> Result<(), BoxError> {
        let path = payload
            .get_string("path")
            .ok_or_else(|| AppError::validation("audit hook: 'path' missing from payload"))?;
        let method = payload
            .get_string("method")
            .ok_or_else(|| AppError::validation("audit hook: 'method' missing from payload"))?;
        let status = payload
            .get_i64("status")
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or_default();

        self.log
            .push(AuditRecord {
                method: method.to_string(),
                path: path.to_string(),
                status,
                request_id: payload
                    .get_uuid("request_id")
                    .unwrap_or_else(|| ctx.request_id()),
                timestamp: Utc::now(),
            })
            .await;

        Ok(())
    }
}
