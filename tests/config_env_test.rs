//! Environment overrides live in their own test binary: variables set inside a
//! `figment::Jail` are process-wide and would leak into the file-based tests.

use figment::Jail;
use rocket_telemetry::config::TelemetryConfig;

#[test]
fn test_environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "telemetry.toml",
            r#"
            [application]
            log_level = "warn"

            [history]
            capacity = 200
            "#,
        )?;
        jail.set_env("ROCKET_TELEMETRY_HISTORY__CAPACITY", "75");
        jail.set_env("ROCKET_TELEMETRY_CONNECTION__HOST", "sim.local");

        let config = TelemetryConfig::load_from("telemetry.toml")
            .map_err(|e| figment::Error::from(e.to_string()))?;
        assert_eq!(config.history.capacity, 75);
        assert_eq!(config.connection.host, "sim.local");
        assert_eq!(config.application.log_level, "warn");
        Ok(())
    });
}

#[test]
fn test_invalid_environment_value_fails_validation() {
    Jail::expect_with(|jail| {
        jail.set_env("ROCKET_TELEMETRY_APPLICATION__LOG_FORMAT", "xml");
        assert!(TelemetryConfig::load_from("missing.toml").is_err());
        Ok(())
    });
}
