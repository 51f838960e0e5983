//! Common traits for Bulwark.
//!
//! These traits define the collaborators the resilience layer depends on,
//! so real implementations can be swapped for stubs in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{HttpRequest, HttpResponse};

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP TRANSPORT TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for issuing a single HTTP request.
///
/// Implementations must honour `request.connect_timeout` and
/// `request.read_timeout`, and must return non-2xx statuses as a normal
/// [`HttpResponse`] rather than an error. Errors are reserved for transport
/// failures (timeouts, refused connections, TLS, broken bodies).
///
/// Implementations might use:
/// - `reqwest` (the default, see `bulwark-client`)
/// - A canned-response stub (for testing)
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request and returns whatever the server answered.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLEEPER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for waiting between retry attempts.
///
/// Production code sleeps on the tokio timer; tests record the requested
/// delays instead of waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}
