//! # gatehouse-api
//!
//! Axum host for Gatehouse.
//!
//! Binds the plugin layer's opaque host types to axum ([`AxumHost`]), mounts
//! the merged endpoint table, wraps each route with the middleware whose
//! scope covers it, and runs before/after hooks around every request.

pub mod context;
pub mod error;
pub mod host;
pub mod middleware;
pub mod router;

pub use context::AuthContext;
pub use error::{ApiError, ApiErrorResponse};
pub use host::AxumHost;
pub use router::{build_router, scope_matches};
