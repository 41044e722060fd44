//! # gatehouse-core
//!
//! Core crate for Gatehouse. Contains the configuration schemas and the
//! unified error system shared by the plugin layer, the HTTP host, and the
//! bundled plugins.
//!
//! This crate has **no** internal dependencies on other Gatehouse crates.

pub mod config;
pub mod error;

pub use error::{AppError, ErrorKind};
