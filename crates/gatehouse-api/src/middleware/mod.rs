//! Axum middleware installed by the host around plugin routes.

pub mod hooks;
pub mod logging;
