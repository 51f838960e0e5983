//! Backend client with retry, per-host circuit breaking and cache fallback.
//!
//! # Priority
//! ```text
//! live data  >  stale cache  >  hard failure
//! ```
//!
//! 1. Circuit open: skip the network, serve the cache or fail with `CircuitOpen`
//! 2. Circuit closed: attempt the call up to `attempts` times
//! 3. Attempts exhausted: record the failure, serve the cache or the last error

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use bulwark_cache::TtlCache;
use bulwark_core::config::{PolicyConfig, TimeoutSection};
use bulwark_core::error::{BulwarkError, ErrorClass, Result};
use bulwark_core::traits::{HttpTransport, Sleeper};
use bulwark_core::types::{ClientResponse, HttpRequest};

use crate::circuit::{CircuitBreaker, CircuitRegistry};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::transport::ReqwestTransport;

/// Resilient GET/POST client.
///
/// Cheap to share behind an `Arc`; all state lives in the circuit registry
/// and the optional cache.
pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    circuits: Arc<CircuitRegistry>,
    cache: Option<Arc<TtlCache>>,
    policy: RetryPolicy,
    timeouts: TimeoutSection,
    executor: RetryExecutor,
}

impl ResilientClient {
    /// Creates a client over `transport` using the policy file settings.
    ///
    /// Every failed attempt is retried, client errors included.
    pub fn new(transport: Arc<dyn HttpTransport>, config: &PolicyConfig) -> Self {
        Self {
            transport,
            circuits: Arc::new(CircuitRegistry::from_config(&config.circuit)),
            cache: None,
            policy: RetryPolicy::from_config(&config.retries).retrying(ErrorClass::ClientError),
            timeouts: config.timeouts.clone(),
            executor: RetryExecutor::new(),
        }
    }

    /// Creates a client backed by [`ReqwestTransport`].
    pub fn with_reqwest(config: &PolicyConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config.timeouts)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Enables cache writes on success and cache fallback on failure.
    pub fn with_cache(mut self, cache: Arc<TtlCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the circuit registry, e.g. to share it between clients.
    pub fn with_circuits(mut self, circuits: Arc<CircuitRegistry>) -> Self {
        self.circuits = circuits;
        self
    }

    /// Replaces the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.executor = RetryExecutor::with_sleeper(sleeper);
        self
    }

    /// Replaces the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the circuit registry.
    pub fn circuits(&self) -> &Arc<CircuitRegistry> {
        &self.circuits
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the cache, if one is attached.
    pub fn cache(&self) -> Option<&Arc<TtlCache>> {
        self.cache.as_ref()
    }

    /// GET `url` with query `params`.
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        cache_key: Option<&str>,
    ) -> Result<ClientResponse> {
        let request = HttpRequest::get(url)
            .with_params(params.iter().copied())
            .with_timeouts(self.timeouts.connect(), self.timeouts.read());
        self.send(request, cache_key).await
    }

    /// POST `body` as JSON to `url`.
    pub async fn post(
        &self,
        url: &str,
        body: Option<&Value>,
        cache_key: Option<&str>,
    ) -> Result<ClientResponse> {
        let mut request =
            HttpRequest::post(url).with_timeouts(self.timeouts.connect(), self.timeouts.read());
        if let Some(body) = body {
            request = request.with_body(body.clone());
        }
        self.send(request, cache_key).await
    }

    /// Sends a prepared request through the circuit, retry and cache layers.
    ///
    /// The request's own timeouts are used as-is.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn send(&self, request: HttpRequest, cache_key: Option<&str>) -> Result<ClientResponse> {
        let breaker = self.circuits.for_url(&request.url)?;

        if !breaker.allow() {
            debug!(host = breaker.host(), "Circuit open, skipping network");
            return self
                .fallback(cache_key)
                .await
                .ok_or_else(|| circuit_open(&breaker));
        }

        match self.attempt(&request).await {
            Ok(data) => {
                breaker.report(true);
                if let Some(key) = cache_key {
                    self.cache_set(key, data.clone()).await;
                }
                Ok(ClientResponse::live(data))
            }
            Err(e) => {
                breaker.report(false);
                match self.fallback(cache_key).await {
                    Some(cached) => {
                        info!(error = %e, "Serving cached data after failure");
                        Ok(cached)
                    }
                    None => {
                        warn!(error = %e, "Request failed with no cached fallback");
                        Err(e)
                    }
                }
            }
        }
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<Value> {
        let transport = &self.transport;

        self.executor
            .execute(&self.policy, || async move {
                let response = transport.send(request.clone()).await?;
                if response.is_success() {
                    Ok(response.payload())
                } else {
                    Err(BulwarkError::HttpStatus {
                        status: response.status,
                        url: request.url.clone(),
                    })
                }
            })
            .await
    }

    async fn fallback(&self, cache_key: Option<&str>) -> Option<ClientResponse> {
        let cache = Arc::clone(self.cache.as_ref()?);
        let key = cache_key?.to_string();

        // Cache file I/O is blocking; keep it off the async workers
        match tokio::task::spawn_blocking(move || cache.get(&key)).await {
            Ok(cached) => cached.map(ClientResponse::cached),
            Err(e) => {
                warn!(error = %e, "Cache lookup task failed");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, data: Value) {
        let Some(cache) = self.cache.as_ref().map(Arc::clone) else {
            return;
        };
        let key = key.to_string();

        if let Err(e) = tokio::task::spawn_blocking(move || cache.set(&key, data)).await {
            warn!(error = %e, "Cache write task failed");
        }
    }
}

fn circuit_open(breaker: &CircuitBreaker) -> BulwarkError {
    BulwarkError::CircuitOpen {
        host: breaker.host().to_string(),
    }
}
