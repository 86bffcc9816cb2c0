//! # Collector Session Protocol
//!
//! The three collector calls a trip is made of.
//!
//! ## Message Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Collector Session                                │
//! │                                                                         │
//! │   Client                                         Collector              │
//! │     │                                                │                  │
//! │     │  POST /data/start   (empty body)               │                  │
//! │     │ ─────────────────────────────────────────────► │                  │
//! │     │  200 {"route_id": "abc123"}                    │                  │
//! │     │ ◄───────────────────────────────────────────── │                  │
//! │     │                                                │                  │
//! │     │  POST /data/gps     route_id, latitude,        │  every tick      │
//! │     │                     longitude, timestamp       │                  │
//! │     │ ─────────────────────────────────────────────► │                  │
//! │     │  2xx (body ignored)                            │                  │
//! │     │ ◄───────────────────────────────────────────── │                  │
//! │     │                                                │                  │
//! │     │  POST /data/end     route_id                   │                  │
//! │     │ ─────────────────────────────────────────────► │                  │
//! │     │  2xx <confirmation text>                       │                  │
//! │     │ ◄───────────────────────────────────────────── │                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call returns a `ClientResult`. Transport faults, bad statuses and
//! unparseable bodies all come back as `Err`, never as a panic.

use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use std::sync::{Arc, RwLock};
use tracing::debug;
use tripline_core::{LocationSample, ServerAddress, TripId};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{HttpTransport, RequestBody, TransportConfig};

// =============================================================================
// Constants
// =============================================================================

/// Handshake endpoint.
pub const START_PATH: &str = "/data/start";

/// Sample endpoint.
pub const GPS_PATH: &str = "/data/gps";

/// Teardown endpoint.
pub const END_PATH: &str = "/data/end";

// =============================================================================
// Collector Client
// =============================================================================

/// Speaks the collector protocol over an [`HttpTransport`].
///
/// The server address is shared: [`CollectorClient::set_server`] takes effect
/// for the next request issued, including pushes from a running loop.
#[derive(Debug, Clone)]
pub struct CollectorClient {
    transport: HttpTransport,
    server: Arc<RwLock<ServerAddress>>,
}

impl CollectorClient {
    /// Creates a client for `server`.
    pub fn new(transport: HttpTransport, server: ServerAddress) -> Self {
        CollectorClient {
            transport,
            server: Arc::new(RwLock::new(server)),
        }
    }

    /// Creates a client from the full client configuration.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(TransportConfig::from(config))?;
        Ok(Self::new(transport, config.server().clone()))
    }

    /// Returns a snapshot of the current collector address.
    pub fn server(&self) -> ServerAddress {
        match self.server.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Points subsequent requests at `server`.
    pub fn set_server(&self, server: ServerAddress) {
        match self.server.write() {
            Ok(mut guard) => *guard = server,
            Err(poisoned) => *poisoned.into_inner() = server,
        }
    }

    /// Opens a trip and returns the collector-issued id.
    pub async fn begin(&self) -> ClientResult<TripId> {
        let server = self.server();
        let response = self
            .transport
            .post(&server, START_PATH, RequestBody::Empty, HeaderMap::new())
            .await?;

        if !response.is_success() {
            return Err(ClientError::UnexpectedStatus {
                path: START_PATH.to_string(),
                status: response.status,
            });
        }

        parse_begin_response(&response.body)
    }

    /// Sends one sample. The response body is logged and otherwise ignored.
    pub async fn push(&self, sample: &LocationSample) -> ClientResult<()> {
        let server = self.server();
        let fields = sample_form(sample);

        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let response = self
            .transport
            .post(&server, GPS_PATH, RequestBody::Form(&fields), headers)
            .await?;

        if !response.is_success() {
            return Err(ClientError::UnexpectedStatus {
                path: GPS_PATH.to_string(),
                status: response.status,
            });
        }

        debug!(trip_id = %sample.trip_id, body = %response.body, "Sample accepted");
        Ok(())
    }

    /// Closes a trip and returns the collector's confirmation text.
    pub async fn end(&self, trip_id: &TripId) -> ClientResult<String> {
        let server = self.server();
        let fields = [("route_id", trip_id.as_str().to_string())];

        let response = self
            .transport
            .post(&server, END_PATH, RequestBody::Form(&fields), HeaderMap::new())
            .await?;

        if !response.is_success() {
            return Err(ClientError::UnexpectedStatus {
                path: END_PATH.to_string(),
                status: response.status,
            });
        }

        Ok(response.body)
    }
}

// =============================================================================
// Encoding / Decoding
// =============================================================================

/// Extracts the trip id from a `/data/start` body.
///
/// The body must be a JSON object whose `route_id` is a non-empty string.
/// Extra fields are ignored.
pub fn parse_begin_response(body: &str) -> ClientResult<TripId> {
    let value: serde_json::Value = serde_json::from_str(body)?;

    let object = value.as_object().ok_or_else(|| {
        ClientError::MalformedResponse("expected a JSON object".to_string())
    })?;

    match object.get("route_id") {
        Some(serde_json::Value::String(token)) => {
            TripId::new(token.as_str()).map_err(|_| ClientError::MissingRouteId)
        }
        Some(other) => Err(ClientError::MalformedResponse(format!(
            "route_id must be a string, got {}",
            other
        ))),
        None => Err(ClientError::MissingRouteId),
    }
}

/// Form fields for `/data/gps`.
///
/// Coordinates use the shortest round-trip representation that always keeps
/// a decimal point (`127.0`, not `127`).
pub fn sample_form(sample: &LocationSample) -> [(&'static str, String); 4] {
    [
        ("route_id", sample.trip_id.as_str().to_string()),
        ("latitude", format!("{:?}", sample.latitude)),
        ("longitude", format!("{:?}", sample.longitude)),
        ("timestamp", sample.timestamp.to_string()),
    ]
}
