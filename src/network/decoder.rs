//! Decoding of inbound frames into [`DecodedFrame`].
//!
//! Two wire formats share the socket:
//!
//! - **JSON text** for control messages (pong, speed, agent flag, restart, playback
//!   status) and the legacy state payload, which comes either flat
//!   (`state`/`action`/`reward`/`landing`/`done`) or nested under `step`.
//! - **Binary telemetry** for the high-frequency feed:
//!
//! ```text
//! [u8 msg_type = 1] [record 0] [record 1] ... [record n-1]
//!
//! record = 16 x f32 little-endian (64 bytes):
//!   0 x      1 y      2 vx     3 vy     4 ax      5 ay       6 angle    7 angularVelocity
//!   8 angAcc 9 mass  10 fuel  11 reward 12 thrtl 13 coldGas 14 landing 15 isActive
//! ```
//!
//! Decoding is all-or-nothing: a frame that fails any check is rejected whole and the
//! caller keeps its current state.

use crate::error::DecodeError;
use crate::network::protocol::{
    Action, BinaryMessageType, ControlSignals, DecodedFrame, EntityState, LandingStatus,
    RawFrame, SimStatus, SimulationUpdate, WireState,
};
use serde::Deserialize;

/// Floats per entity record in a binary telemetry frame.
pub const FLOATS_PER_ENTITY: usize = 16;

/// Bytes per entity record in a binary telemetry frame.
pub const BYTES_PER_ENTITY: usize = FLOATS_PER_ENTITY * 4;

/// Length of the binary frame header.
pub const HEADER_LEN: usize = 1;

/// One 64-byte entity record of a binary telemetry frame, as transmitted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryRecord {
    /// Horizontal position
    pub x: f32,
    /// Vertical position
    pub y: f32,
    /// Horizontal velocity
    pub vx: f32,
    /// Vertical velocity
    pub vy: f32,
    /// Horizontal acceleration
    pub ax: f32,
    /// Vertical acceleration
    pub ay: f32,
    /// Attitude in radians
    pub angle: f32,
    /// Angular velocity
    pub angular_velocity: f32,
    /// Angular acceleration
    pub angular_acceleration: f32,
    /// Dry mass
    pub mass: f32,
    /// Remaining propellant mass
    pub fuel_mass: f32,
    /// NaN when the server has no new reward for this slot
    pub reward: f32,
    /// Main engine input, `0..=1`
    pub throttle: f32,
    /// Attitude thruster input, `-1..=1`
    pub cold_gas: f32,
    /// Landing band code, see [`LandingStatus::from_code`]
    pub landing_code: f32,
    /// `> 0.5` means the slot carries a live state
    pub is_active: f32,
}

impl TelemetryRecord {
    /// Parse one record. `chunk` must be exactly [`BYTES_PER_ENTITY`] long.
    fn parse(chunk: &[u8]) -> Self {
        let mut f = [0f32; FLOATS_PER_ENTITY];
        for (slot, bytes) in f.iter_mut().zip(chunk.chunks_exact(4)) {
            *slot = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        Self {
            x: f[0],
            y: f[1],
            vx: f[2],
            vy: f[3],
            ax: f[4],
            ay: f[5],
            angle: f[6],
            angular_velocity: f[7],
            angular_acceleration: f[8],
            mass: f[9],
            fuel_mass: f[10],
            reward: f[11],
            throttle: f[12],
            cold_gas: f[13],
            landing_code: f[14],
            is_active: f[15],
        }
    }

    /// Serialize in wire order. Used to build frames in tests and tooling.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; BYTES_PER_ENTITY] {
        let fields = [
            self.x,
            self.y,
            self.vx,
            self.vy,
            self.ax,
            self.ay,
            self.angle,
            self.angular_velocity,
            self.angular_acceleration,
            self.mass,
            self.fuel_mass,
            self.reward,
            self.throttle,
            self.cold_gas,
            self.landing_code,
            self.is_active,
        ];

        let mut out = [0u8; BYTES_PER_ENTITY];
        for (dst, value) in out.chunks_exact_mut(4).zip(fields) {
            dst.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    fn state(&self) -> Option<EntityState> {
        if self.is_active <= 0.5 || self.is_active.is_nan() {
            return None;
        }

        Some(EntityState::from(WireState {
            x: f64::from(self.x),
            y: f64::from(self.y),
            vx: f64::from(self.vx),
            vy: f64::from(self.vy),
            ax: f64::from(self.ax),
            ay: f64::from(self.ay),
            angle: f64::from(self.angle),
            angular_velocity: f64::from(self.angular_velocity),
            angular_acceleration: f64::from(self.angular_acceleration),
            mass: f64::from(self.mass),
            fuel_mass: f64::from(self.fuel_mass),
        }))
    }

    fn action(&self) -> Action {
        Action {
            throttle: f64::from(self.throttle),
            cold_gas: f64::from(self.cold_gas),
        }
    }

    fn reward(&self) -> Option<f64> {
        if self.reward.is_nan() {
            None
        } else {
            Some(f64::from(self.reward))
        }
    }
}

/// Build a binary telemetry frame from records.
#[must_use]
pub fn encode_telemetry_frame(records: &[TelemetryRecord]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + records.len() * BYTES_PER_ENTITY);
    buf.push(BinaryMessageType::Telemetry as u8);
    for record in records {
        buf.extend_from_slice(&record.to_bytes());
    }
    buf
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireMessage {
    status: Option<String>,
    speed: Option<f64>,
    agent_enabled: Option<bool>,
    restart: Option<bool>,
    initial: Option<bool>,
    state: Option<Vec<Option<EntityState>>>,
    action: Option<Vec<Action>>,
    landing: Option<Vec<Option<String>>>,
    reward: Option<Vec<Option<f64>>>,
    done: Option<DoneField>,
    step: Option<WireStep>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireStep {
    state: Option<Vec<Option<EntityState>>>,
    reward: Option<Vec<Option<f64>>>,
    done: Option<DoneField>,
    prev_action_taken: Option<Vec<Action>>,
}

/// `done` arrives per entity, or as one flag for the whole fleet.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DoneField {
    All(bool),
    PerEntity(Vec<bool>),
}

/// Stateless decoder for inbound frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a decoder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode one transport frame.
    pub fn decode(&self, frame: &RawFrame) -> Result<DecodedFrame, DecodeError> {
        match frame {
            RawFrame::Text(text) => self.decode_json(text),
            RawFrame::Binary(bytes) => self.decode_binary(bytes),
        }
    }

    /// Decode a JSON control/state message.
    pub fn decode_json(&self, text: &str) -> Result<DecodedFrame, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let msg: WireMessage = serde_json::from_value(value)?;

        let mut control = ControlSignals::default();
        match msg.status.as_deref() {
            Some("pong") => {
                control.pong = true;
                return Ok(DecodedFrame {
                    control,
                    update: SimulationUpdate::default(),
                });
            }
            Some("playing") => control.sim_status = Some(SimStatus::Playing),
            Some("paused") => control.sim_status = Some(SimStatus::Paused),
            Some(other) => tracing::debug!(status = other, "Ignoring unknown status"),
            None => {}
        }
        control.speed = msg.speed;
        control.agent_enabled = msg.agent_enabled;
        control.restart = msg.restart.unwrap_or(false);
        control.initial = msg.initial.unwrap_or(false);

        // Both shapes converge here; the nested step wins when present.
        let (states, rewards, done, actions) = match msg.step {
            Some(step) => (
                step.state,
                step.reward,
                step.done,
                step.prev_action_taken.or(msg.action),
            ),
            None => (msg.state, msg.reward, msg.done, msg.action),
        };

        let done = match done {
            Some(DoneField::PerEntity(flags)) => Some(flags),
            Some(DoneField::All(flag)) => states.as_ref().map(|s| vec![flag; s.len()]),
            None => None,
        };

        let landing = msg.landing.map(|labels| {
            labels
                .into_iter()
                .map(|label| {
                    label.and_then(|l| {
                        let status = LandingStatus::from_label(&l);
                        if status.is_none() {
                            tracing::debug!(label = %l, "Unknown landing label");
                        }
                        status
                    })
                })
                .collect()
        });

        let update = SimulationUpdate {
            states,
            actions,
            rewards,
            landing,
            done,
        };
        check_lengths(&update)?;

        Ok(DecodedFrame { control, update })
    }

    /// Decode a binary telemetry frame.
    pub fn decode_binary(&self, bytes: &[u8]) -> Result<DecodedFrame, DecodeError> {
        let (&header, body) = bytes.split_first().ok_or(DecodeError::EmptyFrame)?;

        match BinaryMessageType::from_u8(header) {
            Some(BinaryMessageType::Telemetry) => {}
            None => return Err(DecodeError::UnknownMessageType(header)),
        }

        if body.len() % BYTES_PER_ENTITY != 0 {
            return Err(DecodeError::MisalignedFrame { len: bytes.len() });
        }

        let count = body.len() / BYTES_PER_ENTITY;
        let mut states = Vec::with_capacity(count);
        let mut actions = Vec::with_capacity(count);
        let mut rewards = Vec::with_capacity(count);
        let mut landing = Vec::with_capacity(count);

        for chunk in body.chunks_exact(BYTES_PER_ENTITY) {
            let record = TelemetryRecord::parse(chunk);
            // Inactive slots still report their last action, reward and landing.
            states.push(record.state());
            actions.push(record.action());
            rewards.push(record.reward());
            landing.push(LandingStatus::from_code(record.landing_code));
        }

        Ok(DecodedFrame {
            control: ControlSignals::default(),
            update: SimulationUpdate {
                states: Some(states),
                actions: Some(actions),
                rewards: Some(rewards),
                landing: Some(landing),
                done: None,
            },
        })
    }
}

/// Every array present in one frame must describe the same number of slots.
fn check_lengths(update: &SimulationUpdate) -> Result<(), DecodeError> {
    let lengths = [
        ("state", update.states.as_ref().map(Vec::len)),
        ("action", update.actions.as_ref().map(Vec::len)),
        ("reward", update.rewards.as_ref().map(Vec::len)),
        ("landing", update.landing.as_ref().map(Vec::len)),
        ("done", update.done.as_ref().map(Vec::len)),
    ];

    let mut expected: Option<usize> = None;
    for (field, len) in lengths {
        let Some(actual) = len else { continue };
        match expected {
            None => expected = Some(actual),
            Some(expected) if expected != actual => {
                return Err(DecodeError::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}
