//! Policy configuration.
//!
//! The policy file is optional JSON:
//!
//! ```json
//! {
//!   "timeouts": { "connect_seconds": 5, "read_seconds": 30 },
//!   "retries":  { "attempts": 3, "backoff_seconds": [1, 2, 5] },
//!   "circuit":  { "failure_threshold": 5, "cool_down_seconds": 300 },
//!   "cache":    { "ttl_seconds": 3600 }
//! }
//! ```
//!
//! Every field has a default. Loading never fails: a missing, unreadable or
//! malformed file yields [`PolicyConfig::default`] and a warning in the log.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::*;

/// Root policy configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Per-request deadlines
    pub timeouts: TimeoutSection,
    /// Attempt count and delays
    pub retries: RetrySection,
    /// Circuit breaker thresholds
    pub circuit: CircuitSection,
    /// Fallback cache lifetime
    pub cache: CacheSection,
}

/// Per-request deadlines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    /// Connect deadline in seconds
    pub connect_seconds: f64,
    /// Read deadline in seconds
    pub read_seconds: f64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            connect_seconds: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_seconds: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl TimeoutSection {
    /// Connect deadline.
    pub fn connect(&self) -> Duration {
        seconds(self.connect_seconds)
    }

    /// Read deadline.
    pub fn read(&self) -> Duration {
        seconds(self.read_seconds)
    }
}

/// Attempt count and delays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Total attempts per call (first try included)
    pub attempts: u32,
    /// Attempt-indexed delays in seconds; the last one repeats
    pub backoff_seconds: Vec<f64>,
    /// Upper bound of random jitter added to each delay, in seconds
    pub jitter_seconds: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff_seconds: DEFAULT_BACKOFF_SCHEDULE_SECS.to_vec(),
            jitter_seconds: 0.0,
        }
    }
}

impl RetrySection {
    /// Delay schedule as durations.
    pub fn schedule(&self) -> Vec<Duration> {
        self.backoff_seconds.iter().copied().map(seconds).collect()
    }

    /// Jitter bound as a duration.
    pub fn jitter(&self) -> Duration {
        seconds(self.jitter_seconds)
    }
}

/// Circuit breaker thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitSection {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open, in seconds
    pub cool_down_seconds: f64,
}

impl Default for CircuitSection {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cool_down_seconds: DEFAULT_COOL_DOWN_SECS as f64,
        }
    }
}

impl CircuitSection {
    /// Cool-down as a duration.
    pub fn cool_down(&self) -> Duration {
        seconds(self.cool_down_seconds)
    }
}

/// Fallback cache lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Entry lifetime in seconds
    pub ttl_seconds: f64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECS as f64,
        }
    }
}

impl CacheSection {
    /// Entry lifetime as a duration.
    pub fn ttl(&self) -> Duration {
        seconds(self.ttl_seconds)
    }
}

impl PolicyConfig {
    /// Loads the policy file, falling back to defaults on any problem.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "No policy file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Unreadable policy file, using defaults");
                return Self::default();
            }
        };

        match Self::from_json(&contents) {
            Some(config) => {
                debug!(path = ?path, "Policy file loaded");
                config
            }
            None => {
                warn!(path = ?path, "Malformed policy file, using defaults");
                Self::default()
            }
        }
    }

    /// Loads the policy file if one is given, else returns defaults.
    pub fn load_optional(path: Option<&Path>) -> Self {
        path.map(Self::load).unwrap_or_default()
    }

    /// Parses a policy document. Returns `None` if it is not valid.
    pub fn from_json(contents: &str) -> Option<Self> {
        serde_json::from_str::<Self>(contents)
            .ok()
            .map(Self::sanitized)
    }

    /// Replaces out-of-range numbers with their defaults.
    fn sanitized(mut self) -> Self {
        if self.retries.attempts == 0 {
            self.retries.attempts = 1;
        }
        if !is_duration(self.timeouts.connect_seconds) {
            self.timeouts.connect_seconds = DEFAULT_CONNECT_TIMEOUT_SECS;
        }
        if !is_duration(self.timeouts.read_seconds) {
            self.timeouts.read_seconds = DEFAULT_READ_TIMEOUT_SECS;
        }
        if !self.retries.backoff_seconds.iter().all(|s| is_duration(*s)) {
            self.retries.backoff_seconds = DEFAULT_BACKOFF_SCHEDULE_SECS.to_vec();
        }
        if !is_duration(self.retries.jitter_seconds) {
            self.retries.jitter_seconds = 0.0;
        }
        if self.circuit.failure_threshold == 0 {
            self.circuit.failure_threshold = DEFAULT_FAILURE_THRESHOLD;
        }
        if !is_duration(self.circuit.cool_down_seconds) {
            self.circuit.cool_down_seconds = DEFAULT_COOL_DOWN_SECS as f64;
        }
        self.circuit.cool_down_seconds = self.circuit.cool_down_seconds.min(MAX_COOL_DOWN_SECS as f64);
        if !is_duration(self.cache.ttl_seconds) {
            self.cache.ttl_seconds = DEFAULT_CACHE_TTL_SECS as f64;
        }
        self
    }
}

fn is_duration(secs: f64) -> bool {
    secs.is_finite() && secs >= 0.0 && secs < u64::MAX as f64
}

fn seconds(secs: f64) -> Duration {
    if is_duration(secs) {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}
