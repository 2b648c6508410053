//! The telemetry session: one event loop that owns the connection, the decoder, the
//! projector and the history store.
//!
//! Every inbound frame is decoded and projected synchronously inside the loop, in
//! arrival order. Read-only consumers never touch the projector; they watch the
//! published [`ConnectionState`], [`SimulationSnapshot`] and [`LandingStats`] through
//! `tokio::sync::watch` receivers.
//!
//! ```no_run
//! use rocket_telemetry::config::TelemetryConfig;
//! use rocket_telemetry::network::{resolve_address, WsConnector};
//! use rocket_telemetry::session::{SessionRequest, TelemetrySession};
//! use rocket_telemetry::network::protocol::Command;
//!
//! # async fn demo() -> rocket_telemetry::error::TelemetryResult<()> {
//! let config = TelemetryConfig::load()?;
//! let address = resolve_address(None, &config.connection)?;
//! let (connector, events) = WsConnector::new(address);
//! let mut session = TelemetrySession::new(connector, events, &config);
//!
//! let (requests, rx) = tokio::sync::mpsc::unbounded_channel();
//! requests.send(SessionRequest::Connect).ok();
//! requests.send(SessionRequest::Command(Command::Start)).ok();
//! session.run(rx).await;
//! # Ok(())
//! # }
//! ```

use crate::config::TelemetryConfig;
use crate::data::history::TelemetryHistoryStore;
use crate::data::landing_stats::LandingStats;
use crate::network::decoder::FrameDecoder;
use crate::network::protocol::{Action, ClientMessage, Command, RawFrame};
use crate::network::reconnect::{ConnectionManager, ConnectionState};
use crate::network::transport::{Connector, TransportEvent, TransportEventKind};
use crate::projector::{SimulationSnapshot, StateProjector};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

/// User-side requests accepted by [`TelemetrySession::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionRequest {
    /// Send a simulation command
    Command(Command),
    /// Send a manual actuation for one entity slot
    Action {
        /// Requested input, clamped before sending
        action: Action,
        /// Target entity slot
        index: usize,
    },
    /// Change the simulation speed
    Speed(f64),
    /// (Re)connect; no-op while connecting or connected
    Connect,
    /// Close the connection and stop reconnecting
    Disconnect,
}

enum Wakeup {
    Transport(Option<TransportEvent>),
    Request(Option<SessionRequest>),
    Timer,
}

/// Current time on the tokio clock, which tests can pause and advance.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Wires transport events through the decoder into the projector, and user requests
/// into outbound messages.
pub struct TelemetrySession<C: Connector> {
    manager: ConnectionManager<C>,
    decoder: FrameDecoder,
    projector: StateProjector,
    landing_stats: LandingStats,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
    snapshot_tx: watch::Sender<Arc<SimulationSnapshot>>,
    landing_tx: watch::Sender<LandingStats>,
    dropped_frames: u64,
}

impl<C: Connector> TelemetrySession<C> {
    /// Create a session reading transport events from `events`.
    ///
    /// `events` must be the receiver the connector's links report into.
    pub fn new(
        connector: C,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        config: &TelemetryConfig,
    ) -> Self {
        let manager = ConnectionManager::new(connector, &config.connection);
        let history = TelemetryHistoryStore::new(config.history.capacity);
        let (state_tx, _) = watch::channel(manager.state().clone());
        let (snapshot_tx, _) = watch::channel(Arc::new(SimulationSnapshot::default()));
        let (landing_tx, _) = watch::channel(LandingStats::default());

        Self {
            manager,
            decoder: FrameDecoder::new(),
            projector: StateProjector::new(history),
            landing_stats: LandingStats::new(),
            events,
            state_tx,
            snapshot_tx,
            landing_tx,
            dropped_frames: 0,
        }
    }

    /// Watch connection status and mirrored server flags.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Watch the snapshot. A new value is published after every projected update.
    #[must_use]
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Arc<SimulationSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Watch the landing tally.
    #[must_use]
    pub fn subscribe_landing_stats(&self) -> watch::Receiver<LandingStats> {
        self.landing_tx.subscribe()
    }

    /// Connection status as of the last processed event.
    #[must_use]
    pub fn connection_state(&self) -> &ConnectionState {
        self.manager.state()
    }

    #[must_use]
    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    /// Latest merged simulation snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &SimulationSnapshot {
        self.projector.snapshot()
    }

    /// Per-entity metric history.
    #[must_use]
    pub fn history(&self) -> &TelemetryHistoryStore {
        self.projector.history()
    }

    #[must_use]
    pub fn landing_stats(&self) -> &LandingStats {
        &self.landing_stats
    }

    /// Frames that failed to decode and were discarded.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Start connecting. See [`ConnectionManager::connect`].
    pub fn connect(&mut self, now: Instant) -> bool {
        let started = self.manager.connect(now);
        self.publish_state();
        started
    }

    /// Close the connection and cancel every pending timer.
    pub fn disconnect(&mut self) {
        self.manager.disconnect();
        self.publish_state();
    }

    /// Process one transport event.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) {
        let TransportEvent { generation, kind } = event;
        match kind {
            TransportEventKind::Opened => {
                self.manager.handle_open(generation, now);
            }
            TransportEventKind::Frame(frame) => {
                if !self.manager.is_current(generation) {
                    tracing::trace!(generation, "Dropped frame from stale link");
                    return;
                }
                self.handle_frame(&frame, now);
            }
            TransportEventKind::Closed { clean } => {
                self.manager.handle_close(generation, clean, now);
            }
        }
        self.publish_state();
    }

    /// Decode and apply one inbound frame.
    ///
    /// Returns `false` if the frame could not be decoded. Such a frame is logged and
    /// discarded without touching any state.
    pub fn handle_frame(&mut self, frame: &RawFrame, now: Instant) -> bool {
        let decoded = match self.decoder.decode(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.dropped_frames += 1;
                tracing::warn!(error = %e, dropped = self.dropped_frames, "Discarded malformed frame");
                return false;
            }
        };

        let control = decoded.control;
        if control.pong {
            self.manager.handle_pong(now);
            self.publish_state();
            return true;
        }

        self.manager.apply_signals(&control);
        if control.initial {
            tracing::debug!("Received initial frame");
        }
        if control.restart {
            tracing::info!("Server restarted the episode");
            self.reset();
        }

        let update = decoded.update;
        if update.has_payload() {
            let landing_changed = update.landing.is_some();
            let tick = self.projector.apply(update);
            if landing_changed {
                self.landing_stats.observe(&self.projector.snapshot().landing);
                self.landing_tx.send_replace(self.landing_stats.clone());
            }
            tracing::trace!(tick, "Applied frame");
            self.publish_snapshot();
        }

        self.publish_state();
        true
    }

    /// Clear history, the tick counter and the landing tally. Idempotent.
    pub fn reset(&mut self) {
        self.projector.reset();
        self.landing_stats.reset();
        self.landing_tx.send_replace(self.landing_stats.clone());
        self.publish_snapshot();
    }

    /// Send a command. `Restart` clears local history first, before the server
    /// confirms it.
    pub fn send_command(&mut self, command: Command) -> bool {
        if command == Command::Restart {
            self.reset();
        }
        self.manager.send(&ClientMessage::command(command))
    }

    /// Send a manual actuation for one slot.
    pub fn send_action(&mut self, action: Action, index: usize) -> bool {
        self.manager.send(&ClientMessage::action(action, index))
    }

    /// Request a new simulation speed.
    pub fn set_speed(&mut self, speed: f64) -> bool {
        self.manager.send(&ClientMessage::speed(speed))
    }

    /// Fire due timers.
    pub fn handle_timers(&mut self, now: Instant) {
        self.manager.handle_timers(now);
        self.publish_state();
    }

    /// Apply one user request.
    pub fn handle_request(&mut self, request: SessionRequest, now: Instant) {
        let sent = match request {
            SessionRequest::Command(command) => self.send_command(command),
            SessionRequest::Action { action, index } => self.send_action(action, index),
            SessionRequest::Speed(speed) => self.set_speed(speed),
            SessionRequest::Connect => {
                self.connect(now);
                return;
            }
            SessionRequest::Disconnect => {
                self.disconnect();
                return;
            }
        };
        if !sent {
            tracing::debug!(status = ?self.manager.status(), "Request not sent");
        }
    }

    /// Run until the request channel closes or the transport event channel closes.
    pub async fn run(&mut self, mut requests: mpsc::UnboundedReceiver<SessionRequest>) {
        self.publish_state();
        loop {
            let deadline = self.manager.next_deadline();
            let wakeup = tokio::select! {
                event = self.events.recv() => Wakeup::Transport(event),
                request = requests.recv() => Wakeup::Request(request),
                () = wait_until(deadline) => Wakeup::Timer,
            };

            match wakeup {
                Wakeup::Transport(Some(event)) => self.handle_event(event, now()),
                Wakeup::Request(Some(request)) => self.handle_request(request, now()),
                Wakeup::Timer => self.handle_timers(now()),
                Wakeup::Transport(None) => {
                    tracing::debug!("Transport event channel closed");
                    break;
                }
                Wakeup::Request(None) => {
                    tracing::debug!("Request channel closed");
                    break;
                }
            }
        }
        self.disconnect();
    }

    fn publish_state(&self) {
        let state = self.manager.state();
        self.state_tx.send_if_modified(|current| {
            if current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx
            .send_replace(Arc::new(self.projector.snapshot().clone()));
    }
}
