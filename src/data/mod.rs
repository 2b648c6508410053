//! History storage for the telemetry feed.
pub mod history;
pub mod landing_stats;
pub mod ring_buffer;
