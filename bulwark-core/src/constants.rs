//! Built-in policy defaults for Bulwark.
//!
//! Every value here can be overridden through the optional policy file
//! (see [`crate::config::PolicyConfig`]). A missing or malformed file falls
//! back to exactly these numbers.

// ═══════════════════════════════════════════════════════════════════════════════
// TIMEOUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Time allowed to establish a TCP/TLS connection, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: f64 = 5.0;

/// Time allowed to receive a response once connected, in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: f64 = 30.0;

// ═══════════════════════════════════════════════════════════════════════════════
// RETRIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Total attempts per call (first try included).
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Attempt-indexed delays between client attempts, in seconds.
/// Attempts beyond the list length reuse the last element.
pub const DEFAULT_BACKOFF_SCHEDULE_SECS: [f64; 3] = [1.0, 2.0, 5.0];

/// Base of the exponential backoff used by the generic retry driver.
/// Delay before retry `n` is `base^n` seconds.
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

/// Upper bound of the uniform jitter added by the generic retry driver, in seconds.
pub const DEFAULT_JITTER_MAX_SECS: f64 = 1.0;

// ═══════════════════════════════════════════════════════════════════════════════
// CIRCUIT BREAKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Consecutive failures that open a host's circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long an open circuit blocks calls, in seconds.
pub const DEFAULT_COOL_DOWN_SECS: u64 = 300;

/// Longest accepted cool-down, in seconds (one year). Longer values are capped.
pub const MAX_COOL_DOWN_SECS: u64 = 365 * 24 * 3600;

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifetime of a cached payload, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Suffix appended to a store's file name for the temporary file of an atomic save.
pub const TEMP_FILE_SUFFIX: &str = ".tmp";
