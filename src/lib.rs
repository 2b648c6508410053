//! # Rocket Telemetry
//!
//! Real-time telemetry ingestion and client-side state synchronization for the rocket
//! landing simulator. The crate connects to the simulation server over a WebSocket,
//! decodes its JSON control messages and binary per-entity telemetry frames, and keeps
//! a current snapshot plus bounded per-entity history for dashboards to read.
//!
//! ## Crate Structure
//!
//! - **`data`**: Fixed-capacity `RingBuffer`, the per-entity `TelemetryHistoryStore`, and the
//!   `LandingStats` tally.
//! - **`network`**: Wire types (`protocol`), the `FrameDecoder`, endpoint resolution
//!   (`address`), the `ConnectionManager` state machine (`reconnect`) and the WebSocket
//!   transport (`transport`).
//! - **`projector`**: `StateProjector`, which merges decoded updates into the snapshot and
//!   history.
//! - **`session`**: `TelemetrySession`, the single event loop wiring all of the above.
//! - **`config`**: Figment-based `TelemetryConfig` (TOML file plus environment).
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`error`**: `TelemetryError` and `DecodeError`.
//!
//! ## Data Flow
//!
//! ```text
//! transport frame ─> FrameDecoder ─> SimulationUpdate ─> StateProjector ─┬─> snapshot
//!                                                                        └─> history
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod network;
pub mod projector;
pub mod session;

pub use config::TelemetryConfig;
pub use error::{DecodeError, TelemetryError, TelemetryResult};
pub use projector::{SimulationSnapshot, StateProjector};
pub use session::{SessionRequest, TelemetrySession};
