//! Connection state machine, retry policy and latency sampling.
//!
//! # State Machine
//!
//! ```text
//! Disconnected | Error ──connect()──────────> Connecting
//! Connecting ──────────transport open───────> Connected
//! Connecting ──────────grace timer fires────> Error (reconnect scheduled)
//! Connected ───────────clean close──────────> Disconnected
//! Connected|Connecting ─abnormal close──────> Error (reconnect scheduled)
//! Error ───────────────reconnect timer──────> Connecting
//! any ─────────────────disconnect()─────────> Disconnected
//! ```
//!
//! [`ConnectionManager`] does no I/O and reads no clock. The caller passes the current
//! [`Instant`] into every method, feeds it transport events, and calls
//! [`ConnectionManager::handle_timers`] whenever [`ConnectionManager::next_deadline`]
//! passes. Every timer is a plain deadline field, so superseding a timer is a matter of
//! overwriting or clearing that field.
//!
//! Links are numbered by a generation counter. Any event whose generation is not the
//! current one belongs to an abandoned link and is ignored.

use crate::config::ConnectionConfig;
use crate::network::protocol::{ClientMessage, Command, ControlSignals, SimStatus};
use crate::network::transport::{Connector, Link};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Connection lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Initial, and terminal after an explicit disconnect
    Disconnected,
    /// A link is opening and the grace timer is running
    Connecting,
    /// The handshake completed
    Connected,
    /// Attempt failed or the link dropped; a reconnect may be pending
    Error,
}

impl ConnectionStatus {
    /// Returns a short status label for display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Error => "Error",
        }
    }
}

/// Connection status plus the server-side flags mirrored from inbound frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionState {
    /// Lifecycle status
    pub status: ConnectionStatus,
    /// Round-trip time of the last answered ping
    pub latency_ms: Option<f64>,
    /// Simulation speed multiplier
    pub speed: f64,
    /// Server reports the simulation as playing
    pub sim_playing: bool,
    /// Server reports the agent as driving the entities
    pub agent_enabled: bool,
    /// Consecutive failed attempts since the last successful open
    pub reconnect_attempt: u32,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            latency_ms: None,
            speed: 1.0,
            sim_playing: false,
            agent_enabled: true,
            reconnect_attempt: 0,
        }
    }
}

impl ConnectionState {
    /// Returns true once the handshake has completed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Returns true while a link is opening.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }
}

/// Decides how long to wait before each reconnect attempt.
pub trait RetryPolicy: fmt::Debug + Send + Sync {
    /// Delay before attempt `attempt` (1-based), or `None` to stop retrying.
    fn delay_for_attempt(&self, attempt: u32) -> Option<Duration>;
}

/// The same delay for every attempt, forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    /// Wait before every attempt
    pub delay: Duration,
}

impl FixedDelay {
    /// Retry every `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl RetryPolicy for FixedDelay {
    fn delay_for_attempt(&self, _attempt: u32) -> Option<Duration> {
        Some(self.delay)
    }
}

/// Exponential backoff with a delay cap and an optional attempt cap.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for doubling).
    pub backoff_multiplier: f64,
    /// Maximum number of attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: 0,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts != 0 && attempt > self.max_attempts {
            return None;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped.max(0.0)))
    }
}

/// Owns the single live link and every connection timer.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    link: Option<C::Link>,
    generation: u64,
    state: ConnectionState,
    grace_period: Duration,
    ping_interval: Duration,
    retry: Box<dyn RetryPolicy>,
    grace_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
    next_ping_at: Option<Instant>,
    last_ping_sent: Option<Instant>,
    explicitly_disconnected: bool,
}

impl<C: Connector> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("has_link", &self.link.is_some())
            .field("grace_deadline", &self.grace_deadline)
            .field("reconnect_at", &self.reconnect_at)
            .field("next_ping_at", &self.next_ping_at)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a disconnected manager using the timers and retry policy in `config`.
    pub fn new(connector: C, config: &ConnectionConfig) -> Self {
        Self {
            connector,
            link: None,
            generation: 0,
            state: ConnectionState::default(),
            grace_period: config.grace_period(),
            ping_interval: config.ping_interval(),
            retry: config.retry_policy(),
            grace_deadline: None,
            reconnect_at: None,
            next_ping_at: None,
            last_ping_sent: None,
            explicitly_disconnected: false,
        }
    }

    /// Replace the retry policy. Takes effect at the next scheduled reconnect.
    pub fn set_retry_policy(&mut self, policy: Box<dyn RetryPolicy>) {
        self.retry = policy;
    }

    /// Current status and mirrored server flags.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.state.status
    }

    /// Generation of the current (or most recent) link.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if `generation` belongs to the current link.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.link.is_some() && generation == self.generation
    }

    /// The connector, for inspection.
    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// When the pending reconnect will fire, if one is scheduled.
    #[must_use]
    pub fn reconnect_at(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Start a connection attempt.
    ///
    /// No-op (returning `false`) while already connecting or connected, so at most one
    /// link is ever live. From `Error` this cancels any pending reconnect and connects
    /// immediately. The attempt counter restarts, so the retry policy applies afresh.
    pub fn connect(&mut self, now: Instant) -> bool {
        if self.link.is_some()
            && matches!(
                self.state.status,
                ConnectionStatus::Connecting | ConnectionStatus::Connected
            )
        {
            tracing::debug!(status = ?self.state.status, "connect() ignored, link already active");
            return false;
        }

        self.explicitly_disconnected = false;
        self.reconnect_at = None;
        // A manual connect gets a fresh retry budget.
        self.state.reconnect_attempt = 0;
        self.open_link(now);
        true
    }

    fn open_link(&mut self, now: Instant) {
        self.drop_link();
        self.generation += 1;
        self.link = Some(self.connector.open(self.generation));
        self.state.status = ConnectionStatus::Connecting;
        self.grace_deadline = Some(now + self.grace_period);
        tracing::info!(
            generation = self.generation,
            attempt = self.state.reconnect_attempt,
            "Connecting"
        );
    }

    fn drop_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.next_ping_at = None;
        self.last_ping_sent = None;
    }

    /// The link of `generation` finished its handshake.
    ///
    /// Returns `false` for a stale generation.
    pub fn handle_open(&mut self, generation: u64, now: Instant) -> bool {
        if !self.is_current(generation) || !self.state.is_connecting() {
            tracing::debug!(
                generation,
                current = self.generation,
                "Ignored open from stale link"
            );
            return false;
        }

        self.state.status = ConnectionStatus::Connected;
        self.state.reconnect_attempt = 0;
        self.grace_deadline = None;
        self.reconnect_at = None;
        self.next_ping_at = Some(now + self.ping_interval);
        self.last_ping_sent = None;
        tracing::info!(generation, "Connected");
        true
    }

    /// The link of `generation` closed.
    ///
    /// A clean close of a connected link ends in `Disconnected`. Anything else (an
    /// error, or a close before the handshake finished) ends in `Error` with a
    /// reconnect scheduled according to the retry policy.
    pub fn handle_close(&mut self, generation: u64, clean: bool, now: Instant) {
        if !self.is_current(generation) {
            tracing::debug!(generation, current = self.generation, "Ignored close from stale link");
            return;
        }

        let was_connected = self.state.is_connected();
        self.link = None;
        self.next_ping_at = None;
        self.last_ping_sent = None;
        self.grace_deadline = None;

        if clean && was_connected {
            self.state.status = ConnectionStatus::Disconnected;
            self.state.reconnect_attempt = 0;
            tracing::info!(generation, "Connection closed by server");
        } else {
            tracing::warn!(generation, clean, was_connected, "Connection lost");
            self.schedule_reconnect(now);
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        self.state.status = ConnectionStatus::Error;
        self.state.reconnect_attempt = self.state.reconnect_attempt.saturating_add(1);
        let attempt = self.state.reconnect_attempt;

        match self.retry.delay_for_attempt(attempt) {
            Some(delay) => {
                self.reconnect_at = Some(now + delay);
                tracing::info!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Reconnect scheduled"
                );
            }
            None => {
                self.reconnect_at = None;
                tracing::warn!(attempt, "Retry policy exhausted, giving up");
            }
        }
    }

    /// Fire every timer whose deadline is at or before `now`.
    pub fn handle_timers(&mut self, now: Instant) {
        if self.grace_deadline.is_some_and(|deadline| deadline <= now) {
            self.grace_deadline = None;
            if self.state.is_connecting() {
                tracing::warn!(
                    generation = self.generation,
                    grace_ms = u64::try_from(self.grace_period.as_millis()).unwrap_or(u64::MAX),
                    "Connection attempt timed out"
                );
                self.drop_link();
                self.schedule_reconnect(now);
            }
        }

        if self.reconnect_at.is_some_and(|deadline| deadline <= now) {
            self.reconnect_at = None;
            if !self.explicitly_disconnected && self.link.is_none() {
                self.open_link(now);
            }
        }

        if self.next_ping_at.is_some_and(|deadline| deadline <= now) {
            self.next_ping_at = Some(now + self.ping_interval);
            if self.send(&ClientMessage::command(Command::Ping)) {
                self.last_ping_sent = Some(now);
            }
        }
    }

    /// Earliest pending timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.grace_deadline, self.reconnect_at, self.next_ping_at]
            .into_iter()
            .flatten()
            .min()
    }

    /// A pong arrived. Returns the measured round-trip time in milliseconds, or `None`
    /// if no ping was outstanding.
    pub fn handle_pong(&mut self, now: Instant) -> Option<f64> {
        let sent = self.last_ping_sent.take()?;
        let latency_ms = now.saturating_duration_since(sent).as_secs_f64() * 1000.0;
        self.state.latency_ms = Some(latency_ms);
        tracing::trace!(latency_ms, "Latency sample");
        Some(latency_ms)
    }

    /// Mirror server-reported flags into the connection state.
    pub fn apply_signals(&mut self, signals: &ControlSignals) {
        if let Some(status) = signals.sim_status {
            self.state.sim_playing = status == SimStatus::Playing;
        }
        if let Some(speed) = signals.speed {
            self.state.speed = speed;
        }
        if let Some(enabled) = signals.agent_enabled {
            self.state.agent_enabled = enabled;
        }
    }

    /// Encode and send one message.
    ///
    /// Returns `false` and drops the message when not connected. Nothing is queued.
    pub fn send(&mut self, message: &ClientMessage) -> bool {
        if !self.state.is_connected() {
            tracing::trace!(status = ?self.state.status, "Dropped outbound message, not connected");
            return false;
        }
        let Some(link) = self.link.as_mut() else {
            return false;
        };
        match message.encode() {
            Ok(text) => link.send_text(text),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode outbound message");
                false
            }
        }
    }

    /// Close the link and cancel every timer. No reconnect follows until the next
    /// [`ConnectionManager::connect`].
    pub fn disconnect(&mut self) {
        self.explicitly_disconnected = true;
        self.drop_link();
        self.grace_deadline = None;
        self.reconnect_at = None;
        self.state.status = ConnectionStatus::Disconnected;
        self.state.reconnect_attempt = 0;
        tracing::info!(generation = self.generation, "Disconnected");
    }
}
