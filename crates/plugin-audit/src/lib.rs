//! Request audit trail plugin for Gatehouse.
//!
//! Registers an after-hook on every request that records the outcome into a
//! bounded in-memory log, and serves the newest entries at
//! `GET /audit/recent`.

pub mod hooks;
pub mod log;
pub mod plugin;

pub use log::{AuditLog, AuditRecord};
pub use plugin::{AuditPlugin, AuditSettings};
