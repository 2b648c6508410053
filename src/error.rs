//! Custom error types for the telemetry client.
//!
//! This module defines the primary error type, `TelemetryError`, and the narrower
//! `DecodeError` produced by the frame decoder. Both use `thiserror`.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically a malformed TOML file or an
//!   environment override of the wrong type.
//! - **`Configuration`**: Semantic errors in a configuration that parsed fine but holds
//!   values the client cannot use (zero history capacity, unknown log level, ...).
//! - **`InvalidAddress`**: The WebSocket URL could not be normalized.
//! - **`Encode`**: An outbound message could not be serialized. Connection failures
//!   are never surfaced as errors; they show up as connection status transitions.
//! - **`Decode`**: An inbound frame could not be decoded. The session logs and drops these.
//!
//! By using `#[from]`, `TelemetryError` can be created from the underlying error types
//! with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the client error type.
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Invalid WebSocket address: {0}")]
    InvalidAddress(String),

    #[error("Frame decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl From<figment::Error> for TelemetryError {
    fn from(value: figment::Error) -> Self {
        TelemetryError::Config(Box::new(value))
    }
}

/// Reasons an inbound frame is rejected.
///
/// A rejected frame is discarded whole; none of its fields reach the snapshot.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON frame is not an object")]
    NotAnObject,

    #[error("empty binary frame")]
    EmptyFrame,

    #[error("unknown binary message type {0}")]
    UnknownMessageType(u8),

    #[error("binary frame of {len} bytes is not a header plus whole 64-byte records")]
    MisalignedFrame { len: usize },

    #[error("`{field}` carries {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_converts_into_telemetry_error() {
        let err: TelemetryError = DecodeError::UnknownMessageType(7).into();
        match err {
            TelemetryError::Decode(DecodeError::UnknownMessageType(code)) => assert_eq!(code, 7),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn length_mismatch_message_names_the_field() {
        let err = DecodeError::LengthMismatch {
            field: "action",
            expected: 3,
            actual: 2,
        };
        let message = err.to_string();
        assert!(message.contains("action"));
        assert!(message.contains('3'));
        assert!(message.contains('2'));
    }
}
