//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: calls pass through
//! - Open: calls are refused until the cool-down elapses
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= threshold   (open_until = now + cool_down)
//! Open → trial:  now >= open_until                   (next call goes through)
//! any → Closed:  one success                         (failures = 0, open_until = none)
//! ```
//!
//! There is no explicit half-open object: after the cool-down the failure
//! count is still at the threshold, so one failed trial call re-opens the
//! circuit immediately.
//!
//! One breaker per remote authority (`host[:port]`), held in a
//! [`CircuitRegistry`] owned by the caller. State is in memory only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use bulwark_core::config::CircuitSection;
use bulwark_core::constants::{DEFAULT_COOL_DOWN_SECS, DEFAULT_FAILURE_THRESHOLD, MAX_COOL_DOWN_SECS};
use bulwark_core::error::{BulwarkError, Result};

/// Breaker thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircuitConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long an open circuit refuses calls
    pub cool_down: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cool_down: Duration::from_secs(DEFAULT_COOL_DOWN_SECS),
        }
    }
}

impl From<&CircuitSection> for CircuitConfig {
    fn from(section: &CircuitSection) -> Self {
        Self {
            failure_threshold: section.failure_threshold.max(1),
            cool_down: section.cool_down(),
        }
    }
}

/// Snapshot of one host's breaker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CircuitState {
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Calls are refused until this instant; `None` if never opened
    pub open_until: Option<Instant>,
}

impl CircuitState {
    /// Returns true if the circuit refuses calls at `now`.
    pub fn is_open_at(&self, now: Instant) -> bool {
        self.open_until.is_some_and(|until| now < until)
    }
}

/// Failure tracker for one remote host.
#[derive(Debug)]
pub struct CircuitBreaker {
    host: String,
    config: CircuitConfig,
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// Cool-downs longer than [`MAX_COOL_DOWN_SECS`] are capped.
    pub fn new(host: impl Into<String>, config: CircuitConfig) -> Self {
        let config = CircuitConfig {
            cool_down: config.cool_down.min(Duration::from_secs(MAX_COOL_DOWN_SECS)),
            ..config
        };
        Self {
            host: host.into(),
            config,
            state: Mutex::new(CircuitState::default()),
        }
    }

    /// Returns true if a live call may be attempted now.
    pub fn allow(&self) -> bool {
        !self.state.lock().is_open_at(Instant::now())
    }

    /// Records the outcome of a call.
    pub fn report(&self, ok: bool) {
        if ok {
            self.record_success();
        } else {
            self.record_failure();
        }
    }

    /// Records a successful call; fully closes the circuit.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.open_until.is_some() {
            info!(host = %self.host, "Circuit closed after recovery");
        }
        *state = CircuitState::default();
    }

    /// Records a failed call; opens the circuit at the threshold.
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.consecutive_failures >= self.config.failure_threshold {
            state.open_until = Some(self.open_deadline());
            warn!(
                host = %self.host,
                failures = state.consecutive_failures,
                cool_down_secs = self.config.cool_down.as_secs(),
                "Circuit opened"
            );
        } else {
            debug!(host = %self.host, failures = state.consecutive_failures, "Call failed");
        }
    }

    /// Opens the circuit for one cool-down regardless of the failure count.
    pub fn trip(&self) {
        let mut state = self.state.lock();
        state.open_until = Some(self.open_deadline());
        warn!(host = %self.host, "Circuit tripped");
    }

    /// Returns the breaker to its initial closed state.
    pub fn reset(&self) {
        *self.state.lock() = CircuitState::default();
    }

    /// Returns true if calls are currently refused.
    pub fn is_open(&self) -> bool {
        !self.allow()
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> CircuitState {
        *self.state.lock()
    }

    /// Returns the host this breaker guards.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the breaker thresholds.
    pub fn config(&self) -> CircuitConfig {
        self.config
    }

    /// End of a cool-down starting now. Saturates instead of overflowing.
    fn open_deadline(&self) -> Instant {
        let now = Instant::now();
        let mut cool_down = self.config.cool_down;
        loop {
            if let Some(until) = now.checked_add(cool_down) {
                return until;
            }
            cool_down /= 2;
        }
    }
}

/// Per-host breakers, created on first use.
///
/// Owned by a client instance rather than shared globally, so independent
/// clients (and tests) never see each other's failures.
#[derive(Debug, Default)]
pub struct CircuitRegistry {
    config: CircuitConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitRegistry {
    /// Creates an empty registry.
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Creates a registry from the `circuit` section of the policy file.
    pub fn from_config(section: &CircuitSection) -> Self {
        Self::new(CircuitConfig::from(section))
    }

    /// Returns the breaker for the URL's authority.
    pub fn for_url(&self, url: &str) -> Result<Arc<CircuitBreaker>> {
        Ok(self.for_host(&Self::authority(url)?))
    }

    /// Returns the breaker for `host`, creating it if needed.
    pub fn for_host(&self, host: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(host) {
            return Arc::clone(breaker.value());
        }
        self.breakers
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(host, self.config)))
            .value()
            .clone()
    }

    /// Returns the breaker for `host` if one exists.
    pub fn get(&self, host: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(host).map(|b| Arc::clone(b.value()))
    }

    /// Returns the hosts whose circuit is currently open.
    pub fn open_hosts(&self) -> Vec<String> {
        self.breakers
            .iter()
            .filter(|entry| entry.value().is_open())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Returns the number of tracked hosts.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Returns true if no host has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Extracts the breaker key (`host[:port]`) from a URL.
    ///
    /// Default ports are omitted, so `https://a.com` and `https://a.com:443`
    /// share one breaker.
    pub fn authority(url: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| BulwarkError::InvalidUrl(format!("{url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| BulwarkError::InvalidUrl(format!("{url}: no host")))?;

        Ok(match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}
