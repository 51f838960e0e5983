//! Persistent TTL cache for Bulwark.
//!
//! A JSON-file-backed key/value store with per-entry expiry. It is a
//! fallback for failed live calls, not a source of truth: storage problems
//! are logged and otherwise ignored.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;

pub use cache::{CacheStats, TtlCache};
