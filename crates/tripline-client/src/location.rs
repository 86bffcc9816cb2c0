//! # Location Source
//!
//! The contract the reporting loop uses to read the device position.
//!
//! ## Per-Tick Outcomes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    last_known_position()                                │
//! │                                                                         │
//! │   Ok(Some(position))      ──► sample is built and pushed                │
//! │   Ok(None)                ──► tick skipped, notice emitted              │
//! │   Err(PermissionDenied)   ──► tick skipped, notice emitted              │
//! │                                                                         │
//! │   None of these stop the loop.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations must not block: the call happens on the reporting task.
//! Platform positioning services belong behind this trait; this crate ships
//! only [`ManualLocationSource`], which the CLI drives from user commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tripline_core::Position;

use crate::error::{ClientError, ClientResult};

// =============================================================================
// Location Source Trait
// =============================================================================

/// Provider of the best-known current position.
pub trait LocationSource: Send + Sync {
    /// Returns the last known position, `None` if there is none yet.
    ///
    /// Returns `Err(ClientError::PermissionDenied)` when the positioning
    /// capability is not granted.
    fn last_known_position(&self) -> ClientResult<Option<Position>>;
}

impl<F> LocationSource for F
where
    F: Fn() -> ClientResult<Option<Position>> + Send + Sync,
{
    fn last_known_position(&self) -> ClientResult<Option<Position>> {
        self()
    }
}

// =============================================================================
// Manual Location Source
// =============================================================================

/// Position and permission set explicitly by the caller.
///
/// Starts with permission granted. The permission flag is the capability
/// check: it is consulted before the position is read.
#[derive(Debug)]
pub struct ManualLocationSource {
    position: RwLock<Option<Position>>,
    permission: AtomicBool,
}

impl ManualLocationSource {
    /// Creates a source with no position yet.
    pub fn new() -> Self {
        ManualLocationSource {
            position: RwLock::new(None),
            permission: AtomicBool::new(true),
        }
    }

    /// Creates a source that always reports `position`.
    pub fn fixed(position: Position) -> Self {
        let source = Self::new();
        source.set_position(Some(position));
        source
    }

    /// Replaces the current position (`None` clears it).
    pub fn set_position(&self, position: Option<Position>) {
        match self.position.write() {
            Ok(mut guard) => *guard = position,
            Err(poisoned) => *poisoned.into_inner() = position,
        }
    }

    /// Grants or revokes the positioning capability.
    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    /// Returns true if the positioning capability is granted.
    pub fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }
}

impl Default for ManualLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationSource for ManualLocationSource {
    fn last_known_position(&self) -> ClientResult<Option<Position>> {
        if !self.has_permission() {
            return Err(ClientError::PermissionDenied);
        }

        Ok(match self.position.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        })
    }
}
