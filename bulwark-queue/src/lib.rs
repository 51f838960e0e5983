//! # Bulwark Queue
//!
//! A durable, file-backed FIFO of pending write operations.
//!
//! Writes that cannot reach the backend right now are enqueued and replayed
//! later by a batch job. Items leave the queue only when the processor
//! confirms them, so delivery is at-least-once.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulwark_queue::DurableQueue;
//!
//! let queue = DurableQueue::new("pending.json");
//! queue.enqueue("upload_document", json!({"doc_id": 42})).await?;
//!
//! let report = queue
//!     .process(|item| async move { client.post(&url, Some(&item.payload), None).await.map(|_| true) }, None)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod queue;

pub use queue::DurableQueue;
