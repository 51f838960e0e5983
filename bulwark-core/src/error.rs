//! Error types for Bulwark.
//!
//! This module provides the error hierarchy using `thiserror`. Every error
//! maps to exactly one [`ErrorClass`], which is what retry policies match on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `BulwarkError`.
pub type Result<T> = std::result::Result<T, BulwarkError>;

/// Main error type for all Bulwark operations.
#[derive(Debug, Error)]
pub enum BulwarkError {
    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Connect or read deadline elapsed.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Could not reach the remote host.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Any other transport-level failure (TLS, protocol, body read).
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// URL could not be parsed or has no host.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CIRCUIT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The host's circuit is open and no cached fallback exists.
    #[error("Service unavailable for {host}, try again later")]
    CircuitOpen { host: String },

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Queue backing file exists but cannot be decoded.
    #[error("Queue file '{path}' is corrupt: {reason}")]
    QueueCorrupt { path: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse classification used by retry policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Connect or read deadline elapsed.
    Timeout,
    /// Host unreachable / connection refused / DNS failure.
    Connect,
    /// Other transport failure.
    Transport,
    /// 5xx status.
    ServerError,
    /// 429 Too Many Requests.
    RateLimited,
    /// 413 Payload Too Large.
    PayloadTooLarge,
    /// Any other non-2xx status.
    ClientError,
    /// Circuit breaker refused the call.
    CircuitOpen,
    /// Local persistence failure.
    Storage,
    /// Everything else (bad input, configuration, internal).
    Other,
}

impl ErrorClass {
    /// Classes retried by the default policy.
    pub const TRANSIENT: [ErrorClass; 6] = [
        ErrorClass::Timeout,
        ErrorClass::Connect,
        ErrorClass::Transport,
        ErrorClass::ServerError,
        ErrorClass::RateLimited,
        ErrorClass::PayloadTooLarge,
    ];

    /// Returns true if this class is retried by the default policy.
    pub fn is_transient(self) -> bool {
        Self::TRANSIENT.contains(&self)
    }

    /// Classifies an HTTP status code. 2xx has no class.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            413 => Some(ErrorClass::PayloadTooLarge),
            429 => Some(ErrorClass::RateLimited),
            500..=599 => Some(ErrorClass::ServerError),
            _ => Some(ErrorClass::ClientError),
        }
    }
}

impl BulwarkError {
    /// Returns the retry classification of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            BulwarkError::HttpStatus { status, .. } => {
                ErrorClass::from_status(*status).unwrap_or(ErrorClass::Other)
            }
            BulwarkError::Timeout(_) => ErrorClass::Timeout,
            BulwarkError::ConnectionFailed(_) => ErrorClass::Connect,
            BulwarkError::HttpError(_) => ErrorClass::Transport,
            BulwarkError::CircuitOpen { .. } => ErrorClass::CircuitOpen,
            BulwarkError::IoError(_)
            | BulwarkError::JsonError(_)
            | BulwarkError::QueueCorrupt { .. } => ErrorClass::Storage,
            BulwarkError::InvalidUrl(_)
            | BulwarkError::ConfigError(_)
            | BulwarkError::InternalError(_) => ErrorClass::Other,
        }
    }

    /// Returns true if this error is recoverable (can retry).
    pub fn is_recoverable(&self) -> bool {
        self.class().is_transient()
    }

    /// Returns true if the call was refused by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BulwarkError::CircuitOpen { .. })
    }

    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BulwarkError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
