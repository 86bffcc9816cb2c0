//! # Tripline CLI
//!
//! Interactive trip recorder on top of `tripline-client`.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CLI Startup                                      │
//! │                                                                         │
//! │  1. Parse flags ─────────────────────────────────────────────────────►  │
//! │  2. Initialize logging (stderr, RUST_LOG or -v) ─────────────────────►  │
//! │  3. Load config (file → env → flags) ────────────────────────────────►  │
//! │  4. Build TripController with ConsoleEmitter ────────────────────────►  │
//! │  5. --auto: begin + start ───────────────────────────────────────────►  │
//! │  6. Read commands until quit, EOF or Ctrl-C ─────────────────────────►  │
//! │     (stdin is read on its own thread, lines arrive over a channel)      │
//! │  7. controller.shutdown() (loop cancelled, trip not ended) ──────────►  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod console;

use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tripline_client::{ClientConfig, ManualLocationSource, TripController};
use tripline_core::{Position, ServerAddress};

use crate::commands::{Command, Flow, Session, HELP};
use crate::console::ConsoleEmitter;

/// Records a trip by pushing the current position to a collector.
#[derive(Parser, Debug)]
#[command(name = "tripline")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Collector address, overrides config and TRIPLINE_SERVER
    #[arg(long, value_name = "HOST:PORT")]
    server: Option<ServerAddress>,

    /// Initial latitude
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Initial longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Reporting interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Begin a trip and start reporting right away
    #[arg(long)]
    auto: bool,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    info!(
        server = %config.server(),
        interval_ms = config.reporting.interval_ms,
        "Configuration loaded"
    );

    let location = Arc::new(ManualLocationSource::new());
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        location.set_position(Some(Position::new(lat, lon)?));
    }

    let controller = TripController::from_config(&config, location.clone())
        .context("Failed to create trip controller")?
        .with_emitter(Arc::new(ConsoleEmitter));

    let mut session = Session {
        controller,
        location,
    };

    println!("tripline, collector {}. Type 'help' for commands.", config.server());

    if args.auto {
        session.execute(Command::Begin).await?;
        if session.controller.trip_id().is_some() {
            session.execute(Command::Start).await?;
        }
    }

    let lines = spawn_line_reader(BufReader::new(io::stdin()))
        .context("Failed to start input reader")?;
    let result = run(&mut session, lines, shutdown_signal()).await;

    session.controller.shutdown().await;
    info!("Shutdown complete");
    result
}

/// Reads lines on a dedicated thread and forwards them over a channel.
///
/// A blocking read cannot be cancelled, so it must not live on the runtime.
/// The thread ends at end of input, after a read error, or once the receiver
/// is gone; a thread still parked in `read` is left behind at process exit.
fn spawn_line_reader<R>(reader: R) -> io::Result<mpsc::Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);

    std::thread::Builder::new()
        .name("tripline-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            debug!("Input reader finished");
        })?;

    Ok(rx)
}

/// Runs commands until `quit`, end of input, or `shutdown` resolves.
async fn run(
    session: &mut Session,
    mut lines: mpsc::Receiver<io::Result<String>>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => break,
            line = lines.recv() => line.transpose().context("Failed to read stdin")?,
        };

        let Some(line) = line else {
            info!("End of input");
            break;
        };

        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match session.execute(command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("{:#}", e),
        }
    }

    Ok(())
}

/// Builds the effective config: file, then environment, then flags.
fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(args.config.clone()).context("Failed to load config")?;

    if let Some(server) = &args.server {
        config.collector.server = server.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.reporting.interval_ms = interval_ms;
    }

    config.validate()?;
    Ok(config)
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `-v` - info for tripline crates, `-vv` - debug
/// - Default: warnings only, so the console stays readable
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,tripline=info,tripline_client=info",
        _ => "info,tripline=debug,tripline_client=debug,tripline_core=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(?e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
