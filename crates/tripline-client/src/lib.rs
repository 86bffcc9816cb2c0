//! # tripline-client: Collector Client for Tripline
//!
//! This crate runs a trip against a location collector: it opens the trip,
//! pushes the device position on a fixed cadence, and closes the trip.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Trip Client Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                    TripController (State Machine)                │   │
//! │  │                                                                  │   │
//! │  │  Idle → Handshaking → Active → Ending → Idle                     │   │
//! │  │  Owns the TripId and at most one reporting loop                  │   │
//! │  └──────────┬──────────────────────┬──────────────────────┬─────────┘   │
//! │             ▼                      ▼                      ▼             │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌──────────────────┐   │
//! │  │  CollectorClient   │  │   PeriodicTask     │  │  LocationSource  │   │
//! │  │                    │  │                    │  │                  │   │
//! │  │  /data/start       │  │  Fixed interval    │  │  Last known      │   │
//! │  │  /data/gps         │  │  Cancellable       │  │  position or     │   │
//! │  │  /data/end         │  │  Panic-isolated    │  │  PermissionDenied│   │
//! │  └─────────┬──────────┘  └────────────────────┘  └──────────────────┘   │
//! │            ▼                                                            │
//! │  ┌────────────────────┐                                                 │
//! │  │  HttpTransport     │  One POST per call, configurable timeouts       │
//! │  └────────────────────┘                                                 │
//! │                                                                         │
//! │  EVENTS (to the caller via TripEventEmitter):                           │
//! │  • emit_state  - lifecycle transitions                                  │
//! │  • emit_notice - skipped ticks, reporting started/stopped               │
//! │  • emit_error  - failed begin/push/end                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Client configuration (collector address, cadence, timeouts)
//! - [`controller`] - `TripController` state machine and event emitter
//! - [`error`] - Client error types
//! - [`location`] - Location source contract
//! - [`protocol`] - Collector session protocol
//! - [`scheduler`] - Cancellable periodic task
//! - [`transport`] - HTTP transport
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tripline_client::{ClientConfig, ManualLocationSource, TripController};
//!
//! let config = ClientConfig::load_or_default(None);
//! let location = Arc::new(ManualLocationSource::new());
//! let mut controller = TripController::from_config(&config, location)?;
//!
//! let trip_id = controller.begin().await?;
//! controller.start_reporting().await?;
//! // ...
//! let confirmation = controller.end().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod protocol;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ClientConfig, CollectorSettings, ReportingSettings};
pub use controller::{NoOpEmitter, TripController, TripEventEmitter, TripStatus};
pub use error::{ClientError, ClientResult, TimeoutKind};
pub use location::{LocationSource, ManualLocationSource};
pub use protocol::CollectorClient;
pub use scheduler::{PeriodicTask, ReportingLoopHandle};
pub use transport::{HttpTransport, TransportConfig};
