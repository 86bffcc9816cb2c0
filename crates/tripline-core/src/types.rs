//! # Domain Types
//!
//! Core domain types used throughout Tripline.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │     TripId      │   │  ServerAddress  │   │    Position     │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  opaque token   │   │  host           │   │  latitude       │        │
//! │  │  from collector │   │  port           │   │  longitude      │        │
//! │  └────────┬────────┘   └─────────────────┘   └────────┬────────┘        │
//! │           │                                           │                 │
//! │           └──────────────┐         ┌──────────────────┘                 │
//! │                          ▼         ▼                                    │
//! │                   ┌─────────────────────┐   ┌─────────────────┐         │
//! │                   │   LocationSample    │   │    TripState    │         │
//! │                   │  ─────────────────  │   │  ─────────────  │         │
//! │                   │  trip_id            │   │  Idle           │         │
//! │                   │  timestamp (epoch s)│   │  Handshaking    │         │
//! │                   │  latitude/longitude │   │  Active         │         │
//! │                   └─────────────────────┘   │  Ending         │         │
//! │                                             └─────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::validation::{
    validate_host, validate_latitude, validate_longitude, validate_port, validate_trip_token,
};

// =============================================================================
// Trip Identifier
// =============================================================================

/// Opaque trip token issued by the collector on a successful handshake.
///
/// There is no `Default` and no `From<String>`: the only way to obtain one
/// outside tests is [`TripId::new`], which the session protocol calls with
/// the collector's `route_id`. Every push and end request needs one, so an
/// absent trip can never reach the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TripId(String);

impl TripId {
    /// Wraps a collector-issued token.
    pub fn new(token: impl Into<String>) -> CoreResult<Self> {
        let token = token.into();
        validate_trip_token(&token).map_err(|_| CoreError::EmptyTripId)?;
        Ok(TripId(token))
    }

    /// Returns the token as sent on the wire.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Server Address
// =============================================================================

/// Collector used when nothing else is configured.
pub const DEFAULT_SERVER_ADDRESS: &str = "54.208.56.133:5000";

/// `host:port` of the collector.
///
/// Serialized as the plain `host:port` string so it can live in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Creates an address from parts.
    pub fn new(host: impl Into<String>, port: u16) -> CoreResult<Self> {
        let host = host.into();
        validate_host(&host).map_err(|e| CoreError::InvalidServerAddress {
            address: format!("{}:{}", host, port),
            reason: e.to_string(),
        })?;
        Ok(ServerAddress { host, port })
    }

    /// Host name or IP literal (IPv6 keeps its brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        ServerAddress {
            host: "54.208.56.133".to_string(),
            port: 5000,
        }
    }
}

impl FromStr for ServerAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = |reason: String| CoreError::InvalidServerAddress {
            address: trimmed.to_string(),
            reason,
        };

        if trimmed.contains("://") {
            return Err(invalid("expected host:port without a scheme".to_string()));
        }

        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port".to_string()))?;

        validate_host(host).map_err(|e| invalid(e.to_string()))?;
        let port = validate_port(port).map_err(|e| invalid(e.to_string()))?;

        Ok(ServerAddress {
            host: host.to_string(),
            port,
        })
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServerAddress> for String {
    fn from(addr: ServerAddress) -> Self {
        addr.to_string()
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Position
// =============================================================================

/// A best-known device position in WGS84 decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Creates a validated position.
    ///
    /// Fails with [`CoreError::Validation`] naming the offending coordinate.
    pub fn new(latitude: f64, longitude: f64) -> CoreResult<Self> {
        validate_latitude(latitude)?;
        validate_longitude(longitude)?;
        Ok(Position {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

// =============================================================================
// Location Sample
// =============================================================================

/// One reading bound for the collector.
///
/// Built fresh on every tick and dropped once the push returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSample {
    pub trip_id: TripId,
    /// Whole seconds since the Unix epoch.
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationSample {
    /// Stamps a position for a trip.
    pub fn new(trip_id: TripId, position: Position, taken_at: DateTime<Utc>) -> Self {
        LocationSample {
            trip_id,
            timestamp: taken_at.timestamp(),
            latitude: position.latitude,
            longitude: position.longitude,
        }
    }

    /// Returns the position part of the sample.
    pub fn position(&self) -> Position {
        Position {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

// =============================================================================
// Trip State
// =============================================================================

/// Lifecycle of a trip as seen by the controller.
///
/// ```text
///   Idle ──begin()──► Handshaking ──ok──► Active ──end()──► Ending ──► Idle
///    ▲                    │
///    └──────failure───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripState {
    /// No trip id and no reporting loop.
    #[default]
    Idle,
    /// Begin request in flight.
    Handshaking,
    /// Trip id held; the reporting loop may or may not be running.
    Active,
    /// End request in flight.
    Ending,
}

impl TripState {
    /// Returns true if a trip id may be held in this state.
    pub fn holds_trip(&self) -> bool {
        matches!(self, TripState::Active | TripState::Ending)
    }
}

impl fmt::Display for TripState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripState::Idle => write!(f, "idle"),
            TripState::Handshaking => write!(f, "handshaking"),
            TripState::Active => write!(f, "active"),
            TripState::Ending => write!(f, "ending"),
        }
    }
}
