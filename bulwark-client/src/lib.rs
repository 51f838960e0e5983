//! # Bulwark Client
//!
//! The resilient remote-access layer: every call from the application to its
//! backend goes through here.
//!
//! - [`RetryExecutor`]: bounded retry with backoff and jitter
//! - [`CircuitBreaker`] / [`CircuitRegistry`]: per-host failure gating
//! - [`ResilientClient`]: GET/POST with graceful degradation to the cache
//! - [`ReqwestTransport`]: the default HTTP transport
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bulwark_cache::TtlCache;
//! use bulwark_client::ResilientClient;
//! use bulwark_core::PolicyConfig;
//!
//! let config = PolicyConfig::load("policy.json");
//! let cache = Arc::new(TtlCache::with_config("cache.json", &config.cache));
//! let client = ResilientClient::with_reqwest(&config)?.with_cache(cache);
//!
//! let response = client
//!     .get("https://api.example.com/v1/documents", &[("page", "1")], Some("documents:1"))
//!     .await?;
//! if response.from_cache {
//!     // show "offline" banner
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod circuit;
mod client;
mod retry;
mod transport;

#[cfg(test)]
mod testing;

pub use circuit::{CircuitBreaker, CircuitConfig, CircuitRegistry, CircuitState};
pub use client::ResilientClient;
pub use retry::{Backoff, RetryExecutor, RetryPolicy, TokioSleeper};
pub use transport::ReqwestTransport;
