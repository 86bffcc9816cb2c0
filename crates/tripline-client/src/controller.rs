//! # Trip Controller
//!
//! Owns the trip id and the reporting loop, and sequences the collector calls.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Trip Lifecycle                                  │
//! │                                                                         │
//! │           begin()                ok                                     │
//! │   Idle ──────────► Handshaking ──────► Active ◄───┐                     │
//! │    ▲                   │                 │  │     │ start_reporting()   │
//! │    │      failure      │                 │  └─────┘ stop_reporting()    │
//! │    ├───────────────────┘                 │                              │
//! │    │                                     │ end()                        │
//! │    │        always (ok or failure)       ▼                              │
//! │    └──────────────────────────────── Ending                             │
//! │                                                                         │
//! │   shutdown(): any state ──► Idle, loop cancelled, no /data/end sent     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reporting Tick
//! ```text
//!   tick ──► last_known_position()
//!              ├── Ok(Some(p)) ──► sample(trip_id, now, p) ──► spawn push ──► log
//!              ├── Ok(None)    ──► notice, skip
//!              └── Err(..)     ──► notice, skip
//! ```
//!
//! All mutation goes through `&mut self`. The loop shares nothing with the
//! controller except its cancellation channel, so it cannot change the state
//! or the trip id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tripline_core::{LocationSample, ServerAddress, TripId, TripState};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::location::LocationSource;
use crate::protocol::CollectorClient;
use crate::scheduler::{PeriodicTask, ReportingLoopHandle};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receiver of user-facing trip notifications (console, UI toast, ...).
pub trait TripEventEmitter: Send + Sync {
    /// Emits a state transition.
    fn emit_state(&self, state: TripState, trip_id: Option<&TripId>);

    /// Emits a transient informational message.
    fn emit_notice(&self, message: &str);

    /// Emits an error message.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl TripEventEmitter for NoOpEmitter {
    fn emit_state(&self, _state: TripState, _trip_id: Option<&TripId>) {}
    fn emit_notice(&self, _message: &str) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Trip Status
// =============================================================================

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct TripStatus {
    pub state: TripState,
    pub trip_id: Option<TripId>,
    pub reporting: bool,
    pub server: ServerAddress,
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state={} ", self.state)?;
        match &self.trip_id {
            Some(trip_id) => write!(f, "trip={} ", trip_id)?,
            None => write!(f, "trip=- ")?,
        }
        write!(
            f,
            "reporting={} server={}",
            if self.reporting { "on" } else { "off" },
            self.server
        )
    }
}

// =============================================================================
// Trip Controller
// =============================================================================

/// Drives one trip at a time against a collector.
pub struct TripController {
    /// Session protocol client.
    collector: Arc<CollectorClient>,

    /// Position provider polled on every tick.
    location: Arc<dyn LocationSource>,

    /// Notification sink.
    emitter: Arc<dyn TripEventEmitter>,

    /// Reporting cadence.
    interval: Duration,

    state: TripState,

    /// Present only in `Active` and `Ending`.
    trip_id: Option<TripId>,

    /// At most one running loop.
    reporting: Option<ReportingLoopHandle>,
}

impl TripController {
    /// Creates a controller.
    pub fn new(
        collector: CollectorClient,
        location: Arc<dyn LocationSource>,
        interval: Duration,
    ) -> Self {
        TripController {
            collector: Arc::new(collector),
            location,
            emitter: Arc::new(NoOpEmitter),
            interval,
            state: TripState::Idle,
            trip_id: None,
            reporting: None,
        }
    }

    /// Creates a controller from the client configuration.
    pub fn from_config(
        config: &ClientConfig,
        location: Arc<dyn LocationSource>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let collector = CollectorClient::from_config(config)?;
        Ok(Self::new(collector, location, config.report_interval()))
    }

    /// Sets the notification sink.
    pub fn with_emitter(mut self, emitter: Arc<dyn TripEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens a trip with the collector.
    ///
    /// Rejected with `TripInProgress` while a trip is held. On failure the
    /// controller is back in `Idle` and nothing is retried.
    pub async fn begin(&mut self) -> ClientResult<TripId> {
        if let Some(trip_id) = &self.trip_id {
            return Err(ClientError::TripInProgress(trip_id.clone()));
        }

        self.set_state(TripState::Handshaking);
        info!(server = %self.collector.server(), "Beginning trip");

        match self.collector.begin().await {
            Ok(trip_id) => {
                info!(trip_id = %trip_id, "Trip started");
                self.trip_id = Some(trip_id.clone());
                self.set_state(TripState::Active);
                Ok(trip_id)
            }
            Err(e) => {
                warn!(error = %e, "Begin failed");
                self.set_state(TripState::Idle);
                self.emitter
                    .emit_error(&format!("Could not start trip: {}", e), e.is_retryable());
                Err(ClientError::HandshakeFailed(Box::new(e)))
            }
        }
    }

    /// Launches the reporting loop for the held trip.
    ///
    /// Any running loop is cancelled and awaited first, so at most one loop
    /// exists at a time. Calling this after [`stop_reporting`] resumes the
    /// same trip.
    ///
    /// [`stop_reporting`]: TripController::stop_reporting
    pub async fn start_reporting(&mut self) -> ClientResult<()> {
        let trip_id = match (&self.state, &self.trip_id) {
            (TripState::Active, Some(trip_id)) => trip_id.clone(),
            _ => return Err(ClientError::NoActiveTrip(self.state)),
        };

        self.cancel_reporting().await;

        let reporter = TickReporter::new(
            trip_id.clone(),
            self.collector.clone(),
            self.location.clone(),
            self.emitter.clone(),
        );
        self.reporting = Some(reporter.spawn(self.interval));

        info!(
            trip_id = %trip_id,
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Reporting started"
        );
        self.emitter.emit_notice("Location reporting started");
        Ok(())
    }

    /// Cancels the reporting loop. The trip stays `Active`.
    ///
    /// A no-op when no loop is running.
    pub async fn stop_reporting(&mut self) {
        if self.reporting.is_some() {
            self.cancel_reporting().await;
            info!("Reporting stopped");
            self.emitter.emit_notice("Location reporting stopped");
        }
    }

    /// Ends the held trip.
    ///
    /// The loop is cancelled, and pushes already in flight are awaited, before
    /// `/data/end` is sent. Whatever the
    /// collector answers, the controller finishes in `Idle` with no trip id;
    /// a failed end is reported as `EndFailed` after that transition.
    pub async fn end(&mut self) -> ClientResult<String> {
        let trip_id = match &self.trip_id {
            Some(trip_id) if self.state.holds_trip() => trip_id.clone(),
            _ => return Err(ClientError::NoActiveTrip(self.state)),
        };

        self.set_state(TripState::Ending);
        self.cancel_reporting().await;

        let result = self.collector.end(&trip_id).await;

        self.trip_id = None;
        self.set_state(TripState::Idle);

        match result {
            Ok(body) => {
                info!(trip_id = %trip_id, response = %body, "Trip ended");
                self.emitter
                    .emit_notice(&format!("Trip {} ended: {}", trip_id, body));
                Ok(body)
            }
            Err(e) => {
                warn!(trip_id = %trip_id, error = %e, "End was not confirmed");
                self.emitter.emit_error(
                    &format!("Trip {} end not confirmed: {}", trip_id, e),
                    e.is_retryable(),
                );
                Err(ClientError::EndFailed {
                    trip_id,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Cancels the loop and forgets the trip without notifying the collector.
    pub async fn shutdown(&mut self) {
        self.cancel_reporting().await;

        if let Some(trip_id) = self.trip_id.take() {
            info!(trip_id = %trip_id, "Discarding trip on shutdown");
        }

        if self.state != TripState::Idle {
            self.set_state(TripState::Idle);
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Points subsequent requests at another collector.
    ///
    /// A running loop picks the new address up on its next push.
    pub fn set_server_address(&self, server: ServerAddress) {
        info!(server = %server, "Collector address changed");
        self.collector.set_server(server);
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> TripState {
        self.state
    }

    /// Returns the held trip id, if any.
    pub fn trip_id(&self) -> Option<&TripId> {
        self.trip_id.as_ref()
    }

    /// Returns true while a reporting loop is owned.
    pub fn is_reporting(&self) -> bool {
        self.reporting.is_some()
    }

    /// Returns a status snapshot.
    pub fn status(&self) -> TripStatus {
        TripStatus {
            state: self.state,
            trip_id: self.trip_id.clone(),
            reporting: self.is_reporting(),
            server: self.collector.server(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn set_state(&mut self, state: TripState) {
        debug!(from = %self.state, to = %state, "Trip state change");
        self.state = state;
        self.emitter.emit_state(state, self.trip_id.as_ref());
    }

    async fn cancel_reporting(&mut self) {
        if let Some(handle) = self.reporting.take() {
            if let Err(e) = handle.stop().await {
                warn!(error = %e, "Reporting loop did not stop cleanly");
            }
        }
    }
}

impl fmt::Debug for TripController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripController")
            .field("state", &self.state)
            .field("trip_id", &self.trip_id)
            .field("reporting", &self.reporting)
            .field("interval", &self.interval)
            .finish()
    }
}

// =============================================================================
// Reporting Tick
// =============================================================================

/// Per-loop state for building and sending samples.
struct TickReporter {
    trip_id: TripId,
    collector: Arc<CollectorClient>,
    location: Arc<dyn LocationSource>,
    emitter: Arc<dyn TripEventEmitter>,

    /// Last timestamp sent by this loop; a clock stepping back is clamped to it.
    last_timestamp: Option<i64>,
}

impl TickReporter {
    fn new(
        trip_id: TripId,
        collector: Arc<CollectorClient>,
        location: Arc<dyn LocationSource>,
        emitter: Arc<dyn TripEventEmitter>,
    ) -> Self {
        TickReporter {
            trip_id,
            collector,
            location,
            emitter,
            last_timestamp: None,
        }
    }

    fn spawn(mut self, interval: Duration) -> ReportingLoopHandle {
        PeriodicTask::spawn("location-report", interval, move || {
            let sample = self.next_sample(Utc::now());
            let collector = self.collector.clone();
            let emitter = self.emitter.clone();

            // Runs detached from the tick. push_sample logs and emits its own
            // failure; the task result itself is ignored.
            async move {
                if let Some(sample) = sample {
                    push_sample(&collector, emitter.as_ref(), &sample).await;
                }
            }
        })
    }

    /// Reads the position and stamps it, or returns `None` to skip the tick.
    fn next_sample(&mut self, now: DateTime<Utc>) -> Option<LocationSample> {
        let position = match self.location.last_known_position() {
            Ok(Some(position)) => position,
            Ok(None) => {
                debug!("No position yet, skipping tick");
                self.emitter.emit_notice("Waiting for a location fix");
                return None;
            }
            Err(ClientError::PermissionDenied) => {
                debug!("Location permission denied, skipping tick");
                self.emitter.emit_notice("Location permission is not granted");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Location source failed, skipping tick");
                self.emitter
                    .emit_error(&format!("Location unavailable: {}", e), false);
                return None;
            }
        };

        let mut sample = LocationSample::new(self.trip_id.clone(), position, now);
        if let Some(last) = self.last_timestamp {
            if sample.timestamp < last {
                debug!(now = sample.timestamp, last, "Clock went backwards, clamping");
                sample.timestamp = last;
            }
        }
        self.last_timestamp = Some(sample.timestamp);

        Some(sample)
    }
}

/// Sends one sample. The outcome ends here: failures are logged and
/// surfaced, never retried or queued.
async fn push_sample(
    collector: &CollectorClient,
    emitter: &dyn TripEventEmitter,
    sample: &LocationSample,
) {
    match collector.push(sample).await {
        Ok(()) => {
            debug!(
                trip_id = %sample.trip_id,
                timestamp = sample.timestamp,
                position = %sample.position(),
                "Sample sent"
            );
        }
        Err(e) => {
            warn!(trip_id = %sample.trip_id, error = %e, "Sample push failed");
            emitter.emit_error(&format!("Failed to send location: {}", e), e.is_retryable());
        }
    }
}
