//! # Bulwark Core
//!
//! Core types, errors, and traits for the Bulwark remote-access layer.
//!
//! This crate provides the foundational building blocks used by all other Bulwark crates:
//!
//! - **Types**: Cache entries, queue items, transport-neutral HTTP messages
//! - **Errors**: One error enum with retry classification
//! - **Constants**: Built-in policy defaults
//! - **Traits**: Collaborator interfaces (HTTP transport, sleeping)
//! - **Config**: Optional policy file with silent fallback to defaults
//!
//! ## Example
//!
//! ```rust
//! use bulwark_core::{PolicyConfig, BulwarkError, ErrorClass};
//!
//! let config = PolicyConfig::default();
//! assert_eq!(config.retries.attempts, 3);
//!
//! let err = BulwarkError::HttpStatus { status: 503, url: "https://api.example.com".into() };
//! assert_eq!(err.class(), ErrorClass::ServerError);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod paths;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use config::{CacheSection, CircuitSection, PolicyConfig, RetrySection, TimeoutSection};
pub use constants::*;
pub use error::{BulwarkError, ErrorClass, Result};
pub use traits::*;
pub use types::*;
