//! # Validation Module
//!
//! Input validation for values that arrive from the caller or the collector.
//!
//! ## Validation Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Where Values Are Checked                           │
//! │                                                                         │
//! │  Caller (CLI / config)                                                  │
//! │  ├── server address  ──► validate_host, validate_port                   │
//! │  └── manual position ──► validate_latitude, validate_longitude          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Collector response                                                     │
//! │  └── route_id        ──► validate_trip_token                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Coordinate Validators
// =============================================================================

/// Validates a latitude in decimal degrees.
///
/// ## Example
/// ```rust
/// use tripline_core::validation::validate_latitude;
///
/// assert!(validate_latitude(37.5).is_ok());
/// assert!(validate_latitude(91.0).is_err());
/// assert!(validate_latitude(f64::NAN).is_err());
/// ```
pub fn validate_latitude(latitude: f64) -> ValidationResult<()> {
    validate_degrees("latitude", latitude, 90.0)
}

/// Validates a longitude in decimal degrees.
pub fn validate_longitude(longitude: f64) -> ValidationResult<()> {
    validate_degrees("longitude", longitude, 180.0)
}

fn validate_degrees(field: &str, value: f64, limit: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
        });
    }

    if !(-limit..=limit).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -limit,
            max: limit,
            value,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates the token the collector returns as `route_id`.
///
/// Whitespace-only tokens are rejected; the token itself is never trimmed.
pub fn validate_trip_token(token: &str) -> ValidationResult<()> {
    if token.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "route_id".to_string(),
        });
    }
    Ok(())
}

/// Validates the host part of a `host:port` address.
///
/// ## Rules
/// - Must not be empty
/// - Must not contain a scheme, path, query or whitespace
/// - IPv6 literals must be bracketed (`[::1]`)
pub fn validate_host(host: &str) -> ValidationResult<()> {
    if host.is_empty() {
        return Err(ValidationError::Required {
            field: "host".to_string(),
        });
    }

    if let Some(inner) = host.strip_prefix('[') {
        let Some(literal) = inner.strip_suffix(']') else {
            return Err(ValidationError::InvalidFormat {
                field: "host".to_string(),
                reason: "unterminated IPv6 literal".to_string(),
            });
        };
        if literal.parse::<std::net::Ipv6Addr>().is_err() {
            return Err(ValidationError::InvalidFormat {
                field: "host".to_string(),
                reason: format!("'{}' is not an IPv6 address", literal),
            });
        }
        return Ok(());
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "host".to_string(),
            reason: "must contain only letters, digits, '.', '-' and '_'".to_string(),
        });
    }

    Ok(())
}

/// Parses and validates a TCP port.
pub fn validate_port(port: &str) -> ValidationResult<u16> {
    if port.is_empty() {
        return Err(ValidationError::Required {
            field: "port".to_string(),
        });
    }

    port.parse::<u16>()
        .map_err(|_| ValidationError::InvalidFormat {
            field: "port".to_string(),
            reason: format!("'{}' is not a number between 0 and 65535", port),
        })
}
