//! # Interactive Commands
//!
//! One command per stdin line, dispatched against the trip controller.
//!
//! ```text
//! begin                     open a trip           (/data/start)
//! start                     start reporting       (every interval)
//! stop                      stop reporting        (trip stays open)
//! end                       close the trip        (/data/end)
//! server <host:port>        switch collector
//! pos <lat> <lon>           set the current position
//! pos none                  forget the position
//! permission grant|revoke   toggle location permission
//! status                    show the controller state
//! help                      show this list
//! quit                      leave (the open trip is not ended)
//! ```

use anyhow::{anyhow, bail, Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use tripline_client::{ClientError, ManualLocationSource, TripController};
use tripline_core::{Position, ServerAddress};

pub const HELP: &str = "\
Commands:
  begin                     open a trip with the collector
  start                     start sending the position every interval
  stop                      stop sending (the trip stays open)
  end                       close the trip
  server <host:port>        switch collector
  pos <lat> <lon>           set the current position
  pos none                  forget the current position
  permission grant|revoke   toggle location permission
  status                    show trip state
  help                      show this list
  quit                      leave without ending the trip";

// =============================================================================
// Command
// =============================================================================

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Begin,
    Start,
    Stop,
    End,
    Server(ServerAddress),
    Position(Option<Position>),
    Permission(bool),
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match (name.as_str(), args.as_slice()) {
            ("begin", []) => Command::Begin,
            ("start", []) => Command::Start,
            ("stop", []) => Command::Stop,
            ("end", []) => Command::End,
            ("status", []) => Command::Status,
            ("help" | "?", []) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,

            ("server", [address]) => Command::Server(
                address
                    .parse()
                    .with_context(|| format!("invalid collector address '{}'", address))?,
            ),

            ("pos", ["none"]) => Command::Position(None),
            ("pos", [lat, lon]) => {
                let latitude: f64 = lat
                    .parse()
                    .with_context(|| format!("latitude '{}' is not a number", lat))?;
                let longitude: f64 = lon
                    .parse()
                    .with_context(|| format!("longitude '{}' is not a number", lon))?;
                Command::Position(Some(Position::new(latitude, longitude)?))
            }

            ("permission", ["grant"]) => Command::Permission(true),
            ("permission", ["revoke"]) => Command::Permission(false),

            ("server" | "pos" | "permission", _) => {
                bail!("wrong arguments for '{}', see 'help'", name)
            }
            (
                "begin" | "start" | "stop" | "end" | "status" | "help" | "?" | "quit" | "exit",
                _,
            ) => bail!("'{}' takes no arguments", name),
            _ => bail!("unknown command '{}', see 'help'", name),
        };

        Ok(command)
    }
}

// =============================================================================
// Session
// =============================================================================

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The controller plus the location source the user drives.
pub struct Session {
    pub controller: TripController,
    pub location: Arc<ManualLocationSource>,
}

impl Session {
    /// Runs one command.
    ///
    /// Begin and end failures have already been shown by the console
    /// emitter, so they are not returned again.
    pub async fn execute(&mut self, command: Command) -> Result<Flow> {
        debug!(?command, "Executing command");

        match command {
            Command::Begin => match self.controller.begin().await {
                Ok(trip_id) => println!("route_id = {}", trip_id),
                Err(ClientError::HandshakeFailed(_)) => {}
                Err(e) => return Err(e.into()),
            },

            Command::Start => self.controller.start_reporting().await?,

            Command::Stop => self.controller.stop_reporting().await,

            Command::End => match self.controller.end().await {
                Ok(_) | Err(ClientError::EndFailed { .. }) => {}
                Err(e) => return Err(e.into()),
            },

            Command::Server(server) => {
                self.controller.set_server_address(server.clone());
                println!("collector = {}", server);
            }

            Command::Position(position) => {
                self.location.set_position(position);
                match position {
                    Some(position) => println!("position = {}", position),
                    None => println!("position cleared"),
                }
            }

            Command::Permission(granted) => {
                self.location.set_permission(granted);
                println!(
                    "location permission {}",
                    if granted { "granted" } else { "revoked" }
                );
            }

            Command::Status => println!("{}", self.controller.status()),

            Command::Help => println!("{}", HELP),

            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }
}
