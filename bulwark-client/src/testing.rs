//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use bulwark_core::error::{BulwarkError, Result};
use bulwark_core::traits::{HttpTransport, Sleeper};
use bulwark_core::types::{HttpRequest, HttpResponse};

/// Transport that replays a script of outcomes and counts calls.
///
/// Once the script runs out, the last outcome repeats.
pub(crate) struct StubTransport {
    script: Mutex<VecDeque<Outcome>>,
    last: Mutex<Option<Outcome>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

#[derive(Clone)]
pub(crate) enum Outcome {
    Status(u16),
    Refused,
}

impl StubTransport {
    pub(crate) fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replays the given statuses.
    pub(crate) fn statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self::new(statuses.into_iter().map(Outcome::Status))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);

        let outcome = match self.script.lock().pop_front() {
            Some(outcome) => {
                *self.last.lock() = Some(outcome.clone());
                outcome
            }
            None => self.last.lock().clone().unwrap_or(Outcome::Refused),
        };

        match outcome {
            Outcome::Status(status) => Ok(HttpResponse::json(status, &json!({ "call": n, "status": status }))),
            Outcome::Refused => Err(BulwarkError::ConnectionFailed("connection refused".into())),
        }
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}
