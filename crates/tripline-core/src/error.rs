//! # Error Types
//!
//! Domain-specific error types for tripline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tripline-core errors (this file)                                       │
//! │  ├── CoreError        - Domain rule violations                          │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  tripline-client errors (separate crate)                                │
//! │  └── ClientError      - Transport, protocol, controller failures        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CLI (anyhow) ◄── ClientError       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain errors raised while building trip values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The collector issued an empty trip identifier.
    #[error("Trip id must not be empty")]
    EmptyTripId,

    /// A server address could not be parsed.
    ///
    /// ## When This Occurs
    /// - The caller typed a URL (`http://...`) instead of `host:port`
    /// - The port is missing or not a number in `0..=65535`
    #[error("Invalid server address '{address}': {reason}")]
    InvalidServerAddress { address: String, reason: String },

    /// Validation error (wraps ValidationError).
    ///
    /// ## When This Occurs
    /// - A coordinate is outside the WGS84 ranges or not finite
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    /// Value is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
