//! Cache entry type.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached payload.
///
/// The key is not stored here; it is the map key of the backing document:
///
/// ```text
/// { "<key>": { "created_at": "...", "payload": ..., "expires_at": "..." } }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// Cached value
    pub payload: Value,
    /// First instant at which the entry is no longer valid
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry that expires `ttl` after now.
    pub fn new(payload: Value, ttl: Duration) -> Self {
        Self::created_at(payload, Utc::now(), ttl)
    }

    /// Creates an entry with an explicit creation time.
    pub fn created_at(payload: Value, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            created_at,
            payload,
            expires_at,
        }
    }

    /// Returns true if the entry is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Returns true if the entry is still valid.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
