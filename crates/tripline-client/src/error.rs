//! # Client Error Types
//!
//! Error types for collector sessions and the trip controller.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Client Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  InvalidConfig  │  │  Connection     │  │  UnexpectedStatus       │  │
//! │  │  InvalidAddress │  │  Timeout        │  │  MalformedResponse      │  │
//! │  │  ConfigLoad/Save│  │  InvalidUrl     │  │  MissingRouteId         │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐   │
//! │  │    Location     │  │              Controller                     │   │
//! │  │                 │  │                                             │   │
//! │  │  Permission     │  │  NoActiveTrip   TripInProgress              │   │
//! │  │  Denied         │  │  HandshakeFailed   EndFailed                │   │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tripline_core::{TripId, TripState};

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error type covering every failure the library reports.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Collector address could not be parsed.
    #[error("Invalid collector address: {0}")]
    InvalidAddress(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Connection refused, DNS failure or I/O error while talking to the collector.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect or whole-request timeout fired.
    ///
    /// `limit` is the configured value when the transport knows it.
    #[error("Collector {kind} timed out{}", limit_suffix(.limit))]
    Timeout {
        kind: TimeoutKind,
        limit: Option<Duration>,
    },

    /// Endpoint URL could not be built from the address and path.
    #[error("Invalid collector URL: {0}")]
    InvalidUrl(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Collector answered with a non-2xx status.
    #[error("Collector returned HTTP {status} for {path}")]
    UnexpectedStatus { path: String, status: u16 },

    /// Response body is not the expected JSON object.
    #[error("Malformed collector response: {0}")]
    MalformedResponse(String),

    /// Handshake response lacks a usable `route_id`.
    #[error("Collector response has no route_id")]
    MissingRouteId,

    // =========================================================================
    // Location Errors
    // =========================================================================
    /// Positioning capability is not granted.
    #[error("Location permission denied")]
    PermissionDenied,

    // =========================================================================
    // Controller Errors
    // =========================================================================
    /// Operation needs a trip id, but none is held.
    #[error("No active trip (state: {0})")]
    NoActiveTrip(TripState),

    /// Begin was called while a trip is already held.
    #[error("Trip {0} is still active; end it before beginning a new one")]
    TripInProgress(TripId),

    /// Begin failed; no trip id was obtained.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(#[source] Box<ClientError>),

    /// End request failed; the trip was cleared anyway.
    #[error("End of trip {trip_id} was not confirmed: {source}")]
    EndFailed {
        trip_id: TripId,
        #[source]
        source: Box<ClientError>,
    },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Background task failed to join.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which of the two transport timeouts fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// TCP connect did not complete.
    Connect,
    /// The whole request, connect through body read, ran over.
    Request,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Connect => write!(f, "connect"),
            TimeoutKind::Request => write!(f, "request"),
        }
    }
}

fn limit_suffix(limit: &Option<Duration>) -> String {
    match limit {
        Some(limit) => format!(" after {:?}", limit),
        None => String::new(),
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            let kind = if err.is_connect() {
                TimeoutKind::Connect
            } else {
                TimeoutKind::Request
            };
            ClientError::Timeout { kind, limit: None }
        } else if err.is_builder() {
            ClientError::InvalidUrl(err.to_string())
        } else {
            ClientError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::MalformedResponse(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ClientError {
    /// Returns true if repeating the same call later might succeed.
    ///
    /// Nothing in this crate retries automatically; the caller decides.
    pub fn is_retryable(&self) -> bool {
        match self.cause() {
            ClientError::ConnectionFailed(_) | ClientError::Timeout { .. } => true,
            ClientError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the collector could not be reached at all.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self.cause(),
            ClientError::ConnectionFailed(_)
                | ClientError::Timeout { .. }
                | ClientError::InvalidUrl(_)
        )
    }

    /// Returns true if the collector answered with something unexpected.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self.cause(),
            ClientError::UnexpectedStatus { .. }
                | ClientError::MalformedResponse(_)
                | ClientError::MissingRouteId
        )
    }

    /// Unwraps controller errors down to the transport or protocol failure.
    fn cause(&self) -> &ClientError {
        match self {
            ClientError::HandshakeFailed(inner) => inner.cause(),
            ClientError::EndFailed { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidAddress(_)
                | ClientError::ConfigLoadFailed(_)
                | ClientError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::ConnectionFailed("refused".into()).is_retryable());
        assert!(ClientError::Timeout {
            kind: TimeoutKind::Connect,
            limit: None
        }
        .is_retryable());
        assert!(ClientError::UnexpectedStatus {
            path: "/data/start".into(),
            status: 503
        }
        .is_retryable());

        assert!(!ClientError::UnexpectedStatus {
            path: "/data/start".into(),
            status: 404
        }
        .is_retryable());
        assert!(!ClientError::MissingRouteId.is_retryable());
        assert!(!ClientError::PermissionDenied.is_retryable());
    }

    #[test]
    fn test_wrapped_errors_keep_category() {
        let err = ClientError::HandshakeFailed(Box::new(ClientError::Timeout {
            kind: TimeoutKind::Request,
            limit: Some(Duration::from_secs(5)),
        }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("timed out"));

        let err = ClientError::EndFailed {
            trip_id: TripId::new("abc123").unwrap(),
            source: Box::new(ClientError::MalformedResponse("eof".into())),
        };
        assert!(!err.is_retryable());
        assert!(err.is_protocol_error());
        assert!(!err.is_transport_error());
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_categories() {
        assert!(ClientError::ConnectionFailed("x".into()).is_transport_error());
        assert!(ClientError::MissingRouteId.is_protocol_error());
        assert!(ClientError::InvalidAddress("x".into()).is_config_error());
        assert!(!ClientError::NoActiveTrip(TripState::Idle).is_protocol_error());
    }

    #[test]
    fn test_timeout_display_names_kind_and_limit() {
        let err = ClientError::Timeout {
            kind: TimeoutKind::Connect,
            limit: Some(Duration::from_secs(5)),
        };
        assert_eq!(err.to_string(), "Collector connect timed out after 5s");
        assert!(err.is_transport_error());

        let err = ClientError::Timeout {
            kind: TimeoutKind::Request,
            limit: None,
        };
        assert_eq!(err.to_string(), "Collector request timed out");
    }

    #[test]
    fn test_controller_error_display() {
        let err = ClientError::NoActiveTrip(TripState::Idle);
        assert_eq!(err.to_string(), "No active trip (state: idle)");
    }
}
