//! HTTP transport: one envelope per `POST /rpc`

use std::time::Duration;

use async_trait::async_trait;
use hookline_core::{RpcError, RpcResult, Transport};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ClientResult;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error body returned by the daemon
#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// [`Transport`] that posts envelopes to a daemon
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Create a transport for the daemon at `base_url` (e.g. "http://localhost:7340")
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a transport with custom timeouts
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let endpoint = Url::parse(base_url)?.join("/rpc")?;

        Ok(Self { client, endpoint })
    }

    /// URL envelopes are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn extract_error(response: reqwest::Response, status: StatusCode) -> RpcError {
        let message = match response.json::<ErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => format!("HTTP {}", status),
        };
        RpcError::Transport(message)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, envelope), fields(endpoint = %self.endpoint))]
    async fn send(&self, envelope: Value) -> RpcResult<Value> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&envelope)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(%status, "Envelope answered");

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| RpcError::Decode(e.to_string()))
        } else {
            Err(Self::extract_error(response, status).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let transport = HttpTransport::new("http://localhost:7340").unwrap();
        assert_eq!(transport.endpoint().as_str(), "http://localhost:7340/rpc");

        let transport = HttpTransport::new("http://localhost:7340/ignored/").unwrap();
        assert_eq!(transport.endpoint().path(), "/rpc");
    }

    #[test]
    fn test_invalid_url() {
        assert!(HttpTransport::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = HttpTransport::with_config(
            "http://127.0.0.1:1",
            Duration::from_millis(500),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = transport.send(serde_json::json!({})).await.unwrap_err();
        assert!(err.is_transport());
    }
}
