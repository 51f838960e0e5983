//! File-backed durable queue.

use std::fmt::Display;
use std::future::Future;
use std::io::ErrorKind;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use bulwark_core::paths::temp_path;
use bulwark_core::error::{BulwarkError, Result};
use bulwark_core::types::{ProcessReport, QueueItem};

/// Durable FIFO of pending write operations.
///
/// Every call holds one async lock across its whole load → mutate → persist
/// cycle. A processor passed to [`DurableQueue::process`] runs while that
/// lock is held and must not call back into the same queue.
///
/// # File Format
///
/// ```text
/// [ { "id": uuid, "type": string, "payload": <json>, "timestamp": RFC3339 }, ... ]
/// ```
///
/// in insertion order. Unlike the cache, storage errors are reported: a
/// corrupt queue file is never silently replaced.
pub struct DurableQueue {
    /// Path to the backing document
    path: PathBuf,
    /// Lock held across each load/mutate/persist cycle
    lock: Mutex<()>,
}

impl DurableQueue {
    /// Creates a queue over `path`.
    ///
    /// The file is created on the first enqueue.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Appends an operation and persists it before returning its id.
    #[instrument(skip(self, payload))]
    pub async fn enqueue(&self, kind: &str, payload: Value) -> Result<String> {
        let _guard = self.lock.lock().await;

        let mut items = self.load().await?;
        let item = QueueItem::new(kind, payload);
        let id = item.id.clone();
        items.push(item);
        self.save(&items).await?;

        debug!(id = %id, pending = items.len(), "Enqueued operation");
        Ok(id)
    }

    /// Returns all pending items in insertion order.
    pub async fn list(&self) -> Result<Vec<QueueItem>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Returns the number of pending items.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }

    /// Returns true if nothing is pending.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Hands pending items to `processor` in insertion order.
    ///
    /// `Ok(true)` confirms an item and drops it. `Ok(false)`, an `Err`, or a
    /// panic keeps it for the next pass. Once `max_items` items have been
    /// confirmed, the rest are kept without being offered. The store is then
    /// rewritten with exactly the kept items, in their original order.
    ///
    /// Per-item failures never surface here; they are counted in
    /// [`ProcessReport::remaining`].
    ///
    /// # Errors
    ///
    /// Fails only when the backing store itself fails, and then the file is
    /// left as it was:
    /// - [`BulwarkError::QueueCorrupt`] if the file cannot be parsed
    /// - [`BulwarkError::IoError`] if it cannot be read or rewritten
    ///
    /// Treat either as "try the whole pass again later"; no item is dropped.
    #[instrument(skip(self, processor))]
    pub async fn process<F, Fut, E>(
        &self,
        mut processor: F,
        max_items: Option<usize>,
    ) -> Result<ProcessReport>
    where
        F: FnMut(QueueItem) -> Fut,
        Fut: Future<Output = std::result::Result<bool, E>>,
        E: Display,
    {
        let _guard = self.lock.lock().await;

        let items = self.load().await?;
        let mut remaining = Vec::with_capacity(items.len());
        let mut processed = 0usize;

        for item in items {
            if max_items.is_some_and(|max| processed >= max) {
                remaining.push(item);
                continue;
            }

            let outcome = AssertUnwindSafe(async { processor(item.clone()).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(true)) => {
                    debug!(id = %item.id, kind = %item.kind, "Operation delivered");
                    processed += 1;
                }
                Ok(Ok(false)) => {
                    debug!(id = %item.id, kind = %item.kind, "Operation declined, keeping");
                    remaining.push(item);
                }
                Ok(Err(e)) => {
                    warn!(id = %item.id, kind = %item.kind, error = %e, "Operation failed, keeping");
                    remaining.push(item);
                }
                Err(_) => {
                    warn!(id = %item.id, kind = %item.kind, "Processor panicked, keeping");
                    remaining.push(item);
                }
            }
        }

        if processed > 0 {
            self.save(&remaining).await?;
        }

        let report = ProcessReport {
            processed,
            remaining: remaining.len(),
        };
        info!(processed = report.processed, remaining = report.remaining, "Queue pass complete");
        Ok(report)
    }

    /// Drops one item by id. Returns true if it was pending.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let mut items = self.load().await?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(false);
        }

        self.save(&items).await?;
        info!(id, "Removed pending operation");
        Ok(true)
    }

    /// Drops every pending item.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.save(&[]).await
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the backing document. A missing file is an empty queue.
    async fn load(&self) -> Result<Vec<QueueItem>> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&contents).map_err(|e| BulwarkError::QueueCorrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Writes the backing document atomically.
    async fn save(&self, items: &[QueueItem]) -> Result<()> {
        let serialized = serde_json::to_vec(items)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically (write to temp, then rename)
        let temp = temp_path(&self.path);
        let mut file = fs::File::create(&temp).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;

        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}
