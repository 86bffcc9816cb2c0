//! # tripline-core: Pure Domain Types for Tripline
//!
//! This crate holds the trip model shared by the client library and the
//! command-line front end. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tripline Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    tripline CLI (apps/)                         │    │
//! │  │    begin ──► start ──► stop ──► end       server / pos / status │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │          tripline-client (controller, loop, HTTP session)       │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ tripline-core (THIS CRATE) ★                    │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │     │
//! │  │   │   types   │  │   error   │  │ validation│                  │     │
//! │  │   │  TripId   │  │ CoreError │  │  ranges   │                  │     │
//! │  │   │  Sample   │  │           │  │  address  │                  │     │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │     │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO NETWORK • NO TIMERS                               │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use tripline_core::{LocationSample, Position, ServerAddress, TripId};
//!
//! let server: ServerAddress = "127.0.0.1:5000".parse().unwrap();
//! assert_eq!(server.port(), 5000);
//!
//! let trip = TripId::new("abc123").unwrap();
//! let here = Position::new(37.5, 127.0).unwrap();
//! let sample = LocationSample::new(trip, here, chrono::Utc::now());
//! assert_eq!(sample.trip_id.as_str(), "abc123");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;
