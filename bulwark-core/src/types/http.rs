//! Transport-neutral HTTP messages.
//!
//! The resilient client builds [`HttpRequest`]s and any
//! [`HttpTransport`](crate::traits::HttpTransport) turns them into
//! [`HttpResponse`]s. Keeping these plain lets tests swap in stub transports.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};

/// HTTP method supported by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Read call, typically cached
    Get,
    /// Write call
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A request to send to the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Query parameters, appended in order
    pub params: Vec<(String, String)>,
    /// Optional JSON body
    pub body: Option<Value>,
    /// Deadline for establishing the connection
    pub connect_timeout: Duration,
    /// Deadline for receiving the response
    pub read_timeout: Duration,
}

impl HttpRequest {
    /// Creates a request with default timeouts.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Vec::new(),
            body: None,
            connect_timeout: Duration::from_secs_f64(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs_f64(DEFAULT_READ_TIMEOUT_SECS),
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Adds query parameters.
    pub fn with_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets connect and read deadlines.
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }
}

/// A response received from the backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers (names lowercased)
    pub headers: Vec<(String, String)>,
    /// Raw body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with a status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Creates a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response
            .headers
            .push(("content-type".into(), "application/json".into()));
        response
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decodes the body as a JSON payload.
    ///
    /// An empty body is `null`; a body that is not JSON becomes a JSON string.
    pub fn payload(&self) -> Value {
        if self.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

/// What the resilient client returns to its caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientResponse {
    /// Response payload
    pub data: Value,
    /// True when served from the cache instead of the network
    pub from_cache: bool,
}

impl ClientResponse {
    /// A payload fetched from the network.
    pub fn live(data: Value) -> Self {
        Self {
            data,
            from_cache: false,
        }
    }

    /// A payload served from the cache.
    pub fn cached(data: Value) -> Self {
        Self {
            data,
            from_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_decoding() {
        assert_eq!(HttpResponse::new(200, "").payload(), Value::Null);
        assert_eq!(HttpResponse::new(200, "  \n").payload(), Value::Null);
        assert_eq!(HttpResponse::new(200, r#"{"ok":true}"#).payload(), json!({"ok": true}));
        assert_eq!(HttpResponse::new(200, "plain text").payload(), json!("plain text"));
    }

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(199, "").is_success());
        assert!(!HttpResponse::new(300, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[test]
    fn test_header_lookup() {
        let response = HttpResponse::json(200, &json!({}));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::get("https://api.example.com/docs")
            .with_params([("page", "2"), ("size", "50")])
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(9));

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.params.len(), 2);
        assert_eq!(request.params[0], ("page".to_string(), "2".to_string()));
        assert_eq!(request.read_timeout, Duration::from_secs(9));
        assert!(request.body.is_none());
    }
}
