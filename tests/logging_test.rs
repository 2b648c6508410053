//! Subscriber installation. Kept out of the library's unit tests, which install their
//! own capturing subscriber.

use rocket_telemetry::config::TelemetryConfig;
use rocket_telemetry::logging::{self, LoggingConfig, OutputFormat};
use tracing::Level;

#[test]
fn test_init_is_idempotent() {
    let config = LoggingConfig::new(Level::WARN).with_format(OutputFormat::Compact);
    assert!(logging::init(config.clone()).is_ok());
    assert!(logging::init(config).is_ok());

    // A later call from configuration is still accepted.
    assert!(logging::init_from_config(&TelemetryConfig::default()).is_ok());
}

#[test]
fn test_invalid_configured_format_is_rejected_before_install() {
    let mut config = TelemetryConfig::default();
    config.application.log_format = "xml".to_string();
    assert!(logging::init_from_config(&config).is_err());
}
