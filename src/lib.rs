//! # Token Cache Library
//!
//! Keeps one client-credentials bearer token per subject, refreshes it from
//! the credential issuer when it is missing or within five minutes of expiry,
//! and exposes lookup and invalidation to the rest of the console.
//!
//! Modules:
//! - `cache` — cached credential type and the subject-keyed token cache
//! - `sources` — issuer seam and the client-credentials HTTP issuer
//! - `config` — YAML service configuration, loading and validation
//! - `server` — diagnostic HTTP routes over the cache
//! - `error` — error taxonomy surfaced to callers

pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::credential::{CachedCredential, SAFETY_BUFFER_MS};
pub use crate::cache::token_cache::TokenCache;
pub use crate::config::issuer::ServiceConfig;
pub use crate::error::TokenCacheError;
