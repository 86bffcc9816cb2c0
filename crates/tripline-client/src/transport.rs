//! # HTTP Transport
//!
//! Single-shot HTTP POSTs to the collector.
//!
//! ## Request Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Call = One Round Trip                       │
//! │                                                                         │
//! │   post(server, "/data/gps", Form[...], headers)                         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   POST http://{server}{path}                                            │
//! │        │                                                                │
//! │        ├── connected, any status ──► RawResponse { status, body }       │
//! │        │                                                                │
//! │        └── refused / DNS / timeout / read error ──► ClientError         │
//! │                                                                         │
//! │   No retries and no backoff at this layer. Status codes are NOT         │
//! │   interpreted here; the session protocol decides what a 500 means.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::debug;
use tripline_core::ServerAddress;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, TimeoutKind};

// =============================================================================
// Transport Configuration
// =============================================================================

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout, connect through body read.
    pub request_timeout: Duration,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Honour proxy settings from the environment.
    pub use_proxy: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            use_proxy: false,
        }
    }
}

impl From<&ClientConfig> for TransportConfig {
    fn from(config: &ClientConfig) -> Self {
        TransportConfig {
            request_timeout: config.request_timeout(),
            connect_timeout: config.connect_timeout(),
            use_proxy: config.collector.use_proxy,
        }
    }
}

// =============================================================================
// Request / Response
// =============================================================================

/// Body of an outgoing request.
#[derive(Debug, Clone, Copy)]
pub enum RequestBody<'a> {
    /// Zero-length body.
    Empty,
    /// `application/x-www-form-urlencoded` fields, in order.
    Form(&'a [(&'a str, String)]),
}

/// Status and body text of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    /// Returns true for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// Reusable HTTP client bound to transport settings.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Builds the HTTP client.
    pub fn new(config: TransportConfig) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout);

        if !config.use_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(|e| {
            ClientError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(HttpTransport { client, config })
    }

    /// Builds `http://{server}{path}`.
    pub fn endpoint(server: &ServerAddress, path: &str) -> ClientResult<Url> {
        Ok(Url::parse(&format!("http://{}{}", server, path))?)
    }

    /// Issues one POST and returns whatever the collector answered.
    pub async fn post(
        &self,
        server: &ServerAddress,
        path: &str,
        body: RequestBody<'_>,
        headers: HeaderMap,
    ) -> ClientResult<RawResponse> {
        let url = Self::endpoint(server, path)?;
        debug!(%url, "POST");

        let request = self.client.post(url).headers(headers);
        let request = match body {
            RequestBody::Empty => request.body(Vec::new()),
            RequestBody::Form(fields) => request.form(fields),
        };

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        debug!(path, status, bytes = body.len(), "Collector responded");
        Ok(RawResponse { status, body })
    }

    fn map_error(&self, err: reqwest::Error) -> ClientError {
        with_limit(ClientError::from(err), &self.config)
    }
}

/// Fills in the configured limit for whichever timeout fired.
fn with_limit(err: ClientError, config: &TransportConfig) -> ClientError {
    match err {
        ClientError::Timeout { kind, .. } => {
            let limit = match kind {
                TimeoutKind::Connect => config.connect_timeout,
                TimeoutKind::Request => config.request_timeout,
            };
            ClientError::Timeout {
                kind,
                limit: Some(limit),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GPS_PATH;
    use crate::test_support::FakeCollector;

    fn timeout_parts(err: &ClientError) -> Option<(TimeoutKind, Option<Duration>)> {
        match err {
            ClientError::Timeout { kind, limit } => Some((*kind, *limit)),
            _ => None,
        }
    }

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(!config.use_proxy);
    }

    #[test]
    fn test_transport_config_from_client_config() {
        let mut client = ClientConfig::default();
        client.collector.request_timeout_secs = 3;
        client.collector.use_proxy = true;

        let config = TransportConfig::from(&client);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(config.use_proxy);
    }

    #[test]
    fn test_endpoint_building() {
        let server: ServerAddress = "54.208.56.133:5000".parse().unwrap();
        let url = HttpTransport::endpoint(&server, "/data/start").unwrap();
        assert_eq!(url.as_str(), "http://54.208.56.133:5000/data/start");

        let v6: ServerAddress = "[::1]:8080".parse().unwrap();
        let url = HttpTransport::endpoint(&v6, "/data/end").unwrap();
        assert_eq!(url.host_str(), Some("[::1]"));
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_raw_response_success_range() {
        let ok = RawResponse { status: 204, body: String::new() };
        let redirect = RawResponse { status: 302, body: String::new() };
        let err = RawResponse { status: 500, body: String::new() };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
        assert!(!err.is_success());
    }

    #[test]
    fn test_timeout_limit_follows_kind() {
        let config = TransportConfig {
            request_timeout: Duration::from_secs(7),
            connect_timeout: Duration::from_secs(2),
            use_proxy: false,
        };

        let connect = ClientError::Timeout {
            kind: TimeoutKind::Connect,
            limit: None,
        };
        assert_eq!(
            timeout_parts(&with_limit(connect, &config)),
            Some((TimeoutKind::Connect, Some(Duration::from_secs(2))))
        );

        let request = ClientError::Timeout {
            kind: TimeoutKind::Request,
            limit: None,
        };
        assert_eq!(
            timeout_parts(&with_limit(request, &config)),
            Some((TimeoutKind::Request, Some(Duration::from_secs(7))))
        );

        let refused = ClientError::ConnectionFailed("refused".into());
        assert!(matches!(with_limit(refused, &config), ClientError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_slow_collector_reports_request_timeout() {
        let collector = FakeCollector::start().await;
        collector.set_gps_delay(Duration::from_secs(1));

        let transport = HttpTransport::new(TransportConfig {
            request_timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(1),
            use_proxy: false,
        })
        .unwrap();
        let err = transport
            .post(
                &collector.address(),
                GPS_PATH,
                RequestBody::Form(&[("route_id", "abc123".to_string())]),
                HeaderMap::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            timeout_parts(&err),
            Some((TimeoutKind::Request, Some(Duration::from_millis(200)))),
            "unexpected error: {err:?}"
        );
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Collector request timed out after 200ms");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = HttpTransport::new(TransportConfig::default()).unwrap();
        let server = ServerAddress::new("127.0.0.1", port).unwrap();
        let err = transport
            .post(&server, "/data/start", RequestBody::Empty, HeaderMap::new())
            .await
            .unwrap_err();

        assert!(err.is_transport_error(), "unexpected error: {err:?}");
    }
}
