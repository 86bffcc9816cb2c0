//! Console rendering of controller events.

use tracing::debug;
use tripline_client::TripEventEmitter;
use tripline_core::{TripId, TripState};

/// Prints trip events for a person at a terminal.
///
/// State changes and notices go to stdout, errors to stderr.
pub struct ConsoleEmitter;

impl TripEventEmitter for ConsoleEmitter {
    fn emit_state(&self, state: TripState, trip_id: Option<&TripId>) {
        match trip_id {
            Some(trip_id) => println!("[{}] trip {}", state, trip_id),
            None => println!("[{}]", state),
        }
        debug!(%state, "Printed state change");
    }

    fn emit_notice(&self, message: &str) {
        println!("  {}", message);
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        if retryable {
            eprintln!("! {} (try again)", message);
        } else {
            eprintln!("! {}", message);
        }
    }
}
