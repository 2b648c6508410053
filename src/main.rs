//! CLI Entry Point for the telemetry monitor
//!
//! Provides a command-line interface for:
//! - Monitoring a running simulation (connect, optionally start it, print periodic summaries)
//! - Decoding one captured frame offline
//!
//! # Usage
//!
//! Follow a local simulation and start it:
//! ```bash
//! telemetry-monitor monitor --start --summary-every 50
//! ```
//!
//! Decode a captured binary frame:
//! ```bash
//! telemetry-monitor decode frame.bin
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use rocket_telemetry::config::TelemetryConfig;
use rocket_telemetry::data::landing_stats::LandingStats;
use rocket_telemetry::logging;
use rocket_telemetry::network::protocol::{BinaryMessageType, Command, RawFrame};
use rocket_telemetry::network::reconnect::ConnectionStatus;
use rocket_telemetry::network::{resolve_address, FrameDecoder, WsConnector};
use rocket_telemetry::projector::SimulationSnapshot;
use rocket_telemetry::session::{SessionRequest, TelemetrySession};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "telemetry-monitor")]
#[command(about = "Rocket landing simulator telemetry monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the simulation server and follow its telemetry
    Monitor {
        /// WebSocket URL (overrides configuration)
        #[arg(long)]
        url: Option<String>,

        /// Configuration file (default: config/telemetry.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Send `start` once connected
        #[arg(long)]
        start: bool,

        /// Print a summary every N ticks (0 disables)
        #[arg(long, default_value = "100")]
        summary_every: u64,
    },

    /// Decode one captured frame and print it as JSON
    Decode {
        /// Frame file: binary if the first byte is 1, JSON text otherwise
        file: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            url,
            config,
            start,
            summary_every,
        } => monitor(url, config, start, summary_every).await,
        Commands::Decode { file } => decode_file(file).await,
    }
}

async fn monitor(
    url: Option<String>,
    config_path: Option<PathBuf>,
    start: bool,
    summary_every: u64,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => TelemetryConfig::load_from(path)?,
        None => TelemetryConfig::load()?,
    };
    logging::init_from_config(&config)?;

    let address = resolve_address(url.as_deref(), &config.connection)?;
    println!("🛰️  Rocket telemetry monitor");
    println!("   Endpoint: {} ({})", address, address.source().label());
    println!("   History: {} samples per metric", config.history.capacity);
    println!();

    let (connector, events) = WsConnector::new(address);
    let mut session = TelemetrySession::new(connector, events, &config);
    let mut states = session.subscribe_state();
    let mut snapshots = session.subscribe_snapshot();
    let landing = session.subscribe_landing_stats();

    let (requests, rx) = mpsc::unbounded_channel();
    requests.send(SessionRequest::Connect)?;
    let worker = tokio::spawn(async move {
        session.run(rx).await;
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_status = ConnectionStatus::Disconnected;
    let mut started = false;
    let mut last_summary = 0u64;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                println!();
                println!("🛑 Shutting down");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if state.status != last_status {
                    last_status = state.status;
                    println!("🔌 {}", state.status.label());
                }
                if start && !started && state.is_connected() {
                    requests.send(SessionRequest::Command(Command::Start))?;
                    started = true;
                    println!("▶️  Sent start");
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = Arc::clone(&snapshots.borrow_and_update());
                // Restart resets the tick counter.
                if snapshot.tick < last_summary {
                    last_summary = 0;
                }
                if summary_every > 0 && snapshot.tick >= last_summary + summary_every {
                    last_summary = snapshot.tick;
                    print_summary(&snapshot, &landing.borrow());
                }
            }
        }
    }

    drop(requests);
    worker.await?;
    Ok(())
}

fn print_summary(snapshot: &SimulationSnapshot, landing: &LandingStats) {
    println!(
        "📊 tick {} | {} active / {} slots | landings {} ok, {} failed ({:.0}% success)",
        snapshot.tick,
        snapshot.active_count(),
        snapshot.entity_count(),
        landing.success(),
        landing.failure(),
        landing.success_rate(),
    );

    for (index, state) in snapshot.states.iter().enumerate() {
        let reward = snapshot
            .rewards
            .get(index)
            .copied()
            .flatten()
            .map_or_else(|| "-".to_string(), |r| format!("{r:.2}"));
        let outcome = snapshot
            .landing
            .get(index)
            .copied()
            .flatten()
            .map_or("-", |status| status.as_str());

        match state {
            Some(s) => println!(
                "   #{index}: y={:.1} vy={:.2} speed={:.2} angle={:.3} fuel={:.1} reward={reward}",
                s.y, s.vy, s.speed, s.angle, s.fuel_mass
            ),
            None => println!("   #{index}: inactive, landing={outcome} reward={reward}"),
        }
    }
}

async fn decode_file(path: PathBuf) -> Result<()> {
    let bytes = tokio::fs::read(&path).await?;
    let frame = if bytes.first() == Some(&(BinaryMessageType::Telemetry as u8)) {
        RawFrame::Binary(bytes)
    } else {
        RawFrame::Text(String::from_utf8(bytes)?)
    };

    match FrameDecoder::new().decode(&frame) {
        Ok(decoded) => {
            println!("{}", serde_json::to_string_pretty(&decoded)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}
