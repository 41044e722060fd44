//! Token-bucket rate limiting plugin for Gatehouse.
//!
//! Contributes a middleware that meters requests per client (first
//! `x-forwarded-for` entry, else the peer address) and a
//! `GET /rate-limit/status` endpoint reporting the caller's bucket.

pub mod config;
pub mod limiter;
pub mod plugin;

pub use config::RateLimitSettings;
pub use limiter::RateLimiter;
pub use plugin::RateLimitPlugin;
