//! Durable queue types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A deferred write operation.
///
/// Serialized as `{"id", "type", "payload", "timestamp"}`; `kind` maps to the
/// `type` field of the backing document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Globally unique identifier (UUID v4)
    pub id: String,
    /// Operation tag chosen by the caller (e.g. "upload_document")
    #[serde(rename = "type")]
    pub kind: String,
    /// Operation arguments
    pub payload: Value,
    /// When the item was enqueued
    pub timestamp: DateTime<Utc>,
}

impl QueueItem {
    /// Creates a new item with a fresh id and the current time.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one processing pass over the queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    /// Items confirmed by the processor and dropped from storage
    pub processed: usize,
    /// Items still in storage after the pass
    pub remaining: usize,
}

impl ProcessReport {
    /// Returns true if nothing is left to deliver.
    pub fn is_drained(&self) -> bool {
        self.remaining == 0
    }
}
