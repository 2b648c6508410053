//! Wire and domain types shared by the decoder, the projector and the session.
//!
//! Inbound frames arrive either as JSON text (control and legacy state messages) or as
//! a binary telemetry frame. Both are normalized into [`DecodedFrame`] before anything
//! downstream sees them. Outbound traffic is always JSON, see [`ClientMessage`].

use crate::error::TelemetryResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One inbound transport message, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFrame {
    /// A WebSocket text message.
    Text(String),
    /// A WebSocket binary message.
    Binary(Vec<u8>),
}

/// Message type carried in the first byte of a binary frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BinaryMessageType {
    /// Per-entity telemetry records follow the header.
    Telemetry = 1,
}

impl BinaryMessageType {
    /// Map a header byte to a known message type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(BinaryMessageType::Telemetry),
            _ => None,
        }
    }
}

/// Kinematic snapshot of one entity for one tick.
///
/// `speed` and `relative_angle` are derived when the state is built and are never
/// read from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireState", rename_all = "camelCase")]
pub struct EntityState {
    /// Horizontal position
    pub x: f64,
    /// Vertical position (altitude)
    pub y: f64,
    /// Horizontal velocity
    pub vx: f64,
    /// Vertical velocity
    pub vy: f64,
    /// Horizontal acceleration
    pub ax: f64,
    /// Vertical acceleration
    pub ay: f64,
    /// Attitude in radians, 0 is upright
    pub angle: f64,
    /// Rate of change of `angle`
    pub angular_velocity: f64,
    /// Rate of change of `angular_velocity`
    pub angular_acceleration: f64,
    /// Dry mass
    pub mass: f64,
    /// Remaining propellant mass
    pub fuel_mass: f64,
    /// `hypot(vx, vy)`
    pub speed: f64,
    /// `|angle|`
    pub relative_angle: f64,
}

impl EntityState {
    /// Dry mass plus remaining fuel.
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.mass + self.fuel_mass
    }
}

/// Transmitted subset of [`EntityState`]. Missing fields read as zero.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub ax: f64,
    pub ay: f64,
    pub angle: f64,
    pub angular_velocity: f64,
    pub angular_acceleration: f64,
    pub mass: f64,
    pub fuel_mass: f64,
}

impl From<WireState> for EntityState {
    fn from(w: WireState) -> Self {
        Self {
            x: w.x,
            y: w.y,
            vx: w.vx,
            vy: w.vy,
            ax: w.ax,
            ay: w.ay,
            angle: w.angle,
            angular_velocity: w.angular_velocity,
            angular_acceleration: w.angular_acceleration,
            mass: w.mass,
            fuel_mass: w.fuel_mass,
            speed: w.vx.hypot(w.vy),
            relative_angle: w.angle.abs(),
        }
    }
}

/// Last known actuation of one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Main engine throttle in `[0, 1]`
    #[serde(default)]
    pub throttle: f64,
    /// Cold gas thruster command in `[-1, 1]`
    #[serde(default)]
    pub cold_gas: f64,
}

impl Action {
    /// Create an action, clamping both channels into their legal ranges.
    #[must_use]
    pub fn clamped(throttle: f64, cold_gas: f64) -> Self {
        Self {
            throttle: throttle.clamp(0.0, 1.0),
            cold_gas: cold_gas.clamp(-1.0, 1.0),
        }
    }
}

/// Terminal landing outcome of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandingStatus {
    /// Touched down within safe limits (code 1)
    Safe,
    /// Clean touchdown (code 2)
    Good,
    /// Survivable but rough touchdown (code 3)
    Ok,
    /// Crashed or destroyed (code 4 and above)
    Unsafe,
}

impl LandingStatus {
    /// Decode the binary landing code.
    ///
    /// Codes are matched on half-open bands around the integers the server writes:
    /// `(0.5, 1.5)` safe, `(1.5, 2.5)` good, `(2.5, 3.5)` ok, `(3.5, ∞)` unsafe.
    /// Anything else (including NaN and the exact band edges) means no landing yet.
    pub fn from_code(code: f32) -> Option<Self> {
        if code > 0.5 && code < 1.5 {
            Some(LandingStatus::Safe)
        } else if code > 1.5 && code < 2.5 {
            Some(LandingStatus::Good)
        } else if code > 2.5 && code < 3.5 {
            Some(LandingStatus::Ok)
        } else if code > 3.5 {
            Some(LandingStatus::Unsafe)
        } else {
            None
        }
    }

    /// Parse a textual landing label, accepting the server's aliases.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "safe" | "landed" => Some(LandingStatus::Safe),
            "good" | "perfect" => Some(LandingStatus::Good),
            "ok" => Some(LandingStatus::Ok),
            "unsafe" | "crash" | "destroy" | "failed" => Some(LandingStatus::Unsafe),
            _ => None,
        }
    }

    /// Label used on the wire and in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LandingStatus::Safe => "safe",
            LandingStatus::Good => "good",
            LandingStatus::Ok => "ok",
            LandingStatus::Unsafe => "unsafe",
        }
    }

    /// Returns true for every outcome except `Unsafe`.
    #[must_use]
    pub fn is_success(self) -> bool {
        !matches!(self, LandingStatus::Unsafe)
    }
}

/// Playback state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimStatus {
    /// Simulation is advancing
    Playing,
    /// Simulation is halted
    Paused,
}

/// Normalized simulation payload of one frame.
///
/// Every field follows the same rule: `None` means the frame did not mention it and
/// the current value must be kept, `Some(vec![])` is a real update that clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationUpdate {
    /// Per-slot state, `None` entries are inactive this frame
    pub states: Option<Vec<Option<EntityState>>>,
    /// Per-slot last actuation
    pub actions: Option<Vec<Action>>,
    /// Per-slot reward, `None` entries carry no new reward
    pub rewards: Option<Vec<Option<f64>>>,
    /// Per-slot landing outcome
    pub landing: Option<Vec<Option<LandingStatus>>>,
    /// Per-slot episode completion
    pub done: Option<Vec<bool>>,
}

impl SimulationUpdate {
    /// Returns true if the frame carried at least one simulation array.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.states.is_some()
            || self.actions.is_some()
            || self.rewards.is_some()
            || self.landing.is_some()
            || self.done.is_some()
    }

    /// Number of entity slots described by this update, taken from the state array.
    #[must_use]
    pub fn entity_count(&self) -> Option<usize> {
        self.states.as_ref().map(Vec::len)
    }
}

/// Connection-level signals that ride along with (or instead of) simulation data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlSignals {
    /// Reply to our latency ping
    pub pong: bool,
    /// Playback state change
    pub sim_status: Option<SimStatus>,
    /// Simulation speed multiplier
    pub speed: Option<f64>,
    /// Whether the RL agent drives the entities
    pub agent_enabled: Option<bool>,
    /// Server restarted the episode; history must be cleared
    pub restart: bool,
    /// First frame after the server accepted the connection
    pub initial: bool,
}

/// Result of decoding one [`RawFrame`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedFrame {
    /// Connection-level flags carried by the frame
    pub control: ControlSignals,
    /// Per-entity simulation payload
    pub update: SimulationUpdate,
}

/// Commands understood by the simulation server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Resume or start playback
    Start,
    /// Halt playback
    Pause,
    /// Begin a new episode
    Restart,
    /// Switch between agent and manual control
    ToggleAgent,
    /// Latency check; the server answers with `pong`
    Ping,
}

impl Command {
    /// Wire name of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Restart => "restart",
            Command::ToggleAgent => "toggle_agent",
            Command::Ping => "ping",
        }
    }
}

/// Lowest speed multiplier the server accepts.
pub const MIN_SPEED: f64 = 0.01;

/// Outbound JSON messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    /// `{command, ...extra}`
    Command {
        /// Command to run
        command: Command,
        /// Extra fields merged into the top-level object
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// `{action: {throttle, coldGas}, rocket_index}`
    Action {
        /// Control input to apply
        action: Action,
        /// Entity the input is addressed to
        rocket_index: usize,
    },
    /// `{speed}`
    Speed {
        /// Playback multiplier, at least [`MIN_SPEED`]
        speed: f64,
    },
}

impl ClientMessage {
    /// A bare command with no extra fields.
    #[must_use]
    pub fn command(command: Command) -> Self {
        ClientMessage::Command {
            command,
            extra: Map::new(),
        }
    }

    /// An actuation request for one entity slot, clamped into legal ranges.
    #[must_use]
    pub fn action(action: Action, rocket_index: usize) -> Self {
        ClientMessage::Action {
            action: Action::clamped(action.throttle, action.cold_gas),
            rocket_index,
        }
    }

    /// A speed change request, floored at [`MIN_SPEED`].
    #[must_use]
    pub fn speed(speed: f64) -> Self {
        let speed = if speed.is_finite() { speed.max(MIN_SPEED) } else { 1.0 };
        ClientMessage::Speed { speed }
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn encode(&self) -> TelemetryResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
