//! Default HTTP transport on top of reqwest.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use bulwark_core::config::TimeoutSection;
use bulwark_core::error::{BulwarkError, Result};
use bulwark_core::traits::HttpTransport;
use bulwark_core::types::{HttpRequest, HttpResponse, Method};

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
///
/// The connect timeout is fixed on the client. Each request gets an overall
/// deadline of its own connect plus read timeout.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| BulwarkError::ConfigError(format!("HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Builds a transport from the `timeouts` section of the policy file.
    pub fn from_config(timeouts: &TimeoutSection) -> Result<Self> {
        Self::new(timeouts.connect())
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let deadline = request.connect_timeout.saturating_add(request.read_timeout);
        let response = builder.timeout(deadline).send().await.map_err(map_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(map_error)?.to_vec();

        debug!(status, bytes = body.len(), "Response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_error(e: reqwest::Error) -> BulwarkError {
    if e.is_timeout() {
        BulwarkError::Timeout(e.to_string())
    } else if e.is_connect() {
        BulwarkError::ConnectionFailed(e.to_string())
    } else if e.is_builder() {
        BulwarkError::InvalidUrl(e.to_string())
    } else {
        BulwarkError::HttpError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitRegistry;
    use crate::client::ResilientClient;
    use crate::testing::RecordingSleeper;
    use bulwark_core::config::PolicyConfig;
    use bulwark_core::error::ErrorClass;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_get_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2]})))
            .expect(1)
            .mount(&server)
            .await;

        let request = HttpRequest::get(format!("{}/docs", server.uri())).with_params([("page", "1")]);
        let response = transport().send(request).await.unwrap();

        assert!(response.is_success());
        assert_eq!(response.payload(), json!({"items": [1, 2]}));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/docs"))
            .and(body_json(json!({"title": "draft"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let request = HttpRequest::post(format!("{}/docs", server.uri())).with_body(json!({"title": "draft"}));
        let response = transport().send(request).await.unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.payload(), serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let response = transport().send(HttpRequest::get(server.uri())).await.unwrap();

        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        assert_eq!(response.payload(), json!("maintenance"));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let request = HttpRequest::get(server.uri())
            .with_timeouts(Duration::from_millis(50), Duration::from_millis(100));
        let err = transport().send(request).await.unwrap_err();

        assert!(matches!(err, BulwarkError::Timeout(_)), "got {err:?}");
        assert_eq!(err.class(), ErrorClass::Timeout);
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = transport()
            .send(HttpRequest::get(format!("http://127.0.0.1:{port}/")))
            .await
            .unwrap_err();

        assert!(matches!(err, BulwarkError::ConnectionFailed(_)), "got {err:?}");
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_client_recovers_against_live_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let mut config = PolicyConfig::default();
        config.retries.attempts = 4;
        let client = ResilientClient::new(Arc::new(transport()), &config)
            .with_sleeper(Arc::new(RecordingSleeper::default()));

        let response = client
            .get(&format!("{}/status", server.uri()), &[], None)
            .await
            .unwrap();

        assert!(!response.from_cache);
        assert_eq!(response.data, json!({"ok": true}));
        assert_eq!(server.received_requests().await.map(|r| r.len()), Some(4));

        let host = CircuitRegistry::authority(&server.uri()).unwrap();
        assert_eq!(client.circuits().for_host(&host).state().consecutive_failures, 0);
    }
}
