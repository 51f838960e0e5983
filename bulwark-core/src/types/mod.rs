//! Domain types for Bulwark.
//!
//! This module provides the data structures shared across the workspace:
//!
//! - [`CacheEntry`]: A cached payload with its creation and expiry time
//! - [`QueueItem`]: A deferred write operation awaiting delivery
//! - [`HttpRequest`] / [`HttpResponse`]: Transport-neutral HTTP messages
//! - [`ClientResponse`]: What the resilient client hands back to callers

mod cache;
mod http;
mod queue;

pub use cache::*;
pub use http::*;
pub use queue::*;
