//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. `config/telemetry.toml` (base configuration, optional)
//! 2. Environment variables prefixed with `ROCKET_TELEMETRY_`, nested keys separated by
//!    a double underscore
//!
//! Every field has a default, so a missing file yields a working configuration.
//!
//! # Example
//! ```no_run
//! use rocket_telemetry::config::TelemetryConfig;
//!
//! let config = TelemetryConfig::load()?;
//! println!("History capacity: {}", config.history.capacity);
//! # Ok::<(), rocket_telemetry::error::TelemetryError>(())
//! ```

use crate::data::history::DEFAULT_HISTORY_CAPACITY;
use crate::error::{TelemetryError, TelemetryResult};
use crate::network::address::{DEFAULT_WS_PATH, DEFAULT_WS_PORT};
use crate::network::reconnect::{ExponentialBackoff, FixedDelay, RetryPolicy};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/telemetry.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "ROCKET_TELEMETRY_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// WebSocket connection settings
    pub connection: ConnectionConfig,
    /// History buffer settings
    pub history: HistoryConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// WebSocket connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Full endpoint URL; overrides host, port, path and secure
    pub url: Option<String>,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// WebSocket path
    pub path: String,
    /// Use `wss://`
    pub secure: bool,
    /// How long a connection attempt may stay pending before it is declared failed
    pub grace_period_ms: u64,
    /// Delay before reconnecting after an abnormal close
    pub reconnect_delay_ms: u64,
    /// Latency ping interval while connected
    pub ping_interval_ms: u64,
    /// Reconnect delay policy
    pub retry: RetryStrategy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_WS_PORT,
            path: DEFAULT_WS_PATH.to_string(),
            secure: false,
            grace_period_ms: 3000,
            reconnect_delay_ms: 3000,
            ping_interval_ms: 2000,
            retry: RetryStrategy::Fixed,
        }
    }
}

impl ConnectionConfig {
    /// Grace period as a [`Duration`].
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Ping interval as a [`Duration`].
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Build the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> Box<dyn RetryPolicy> {
        let base = Duration::from_millis(self.reconnect_delay_ms);
        match &self.retry {
            RetryStrategy::Fixed => Box::new(FixedDelay::new(base)),
            RetryStrategy::Exponential {
                max_delay_ms,
                multiplier,
                max_attempts,
            } => Box::new(ExponentialBackoff {
                initial_delay: base,
                max_delay: Duration::from_millis(*max_delay_ms),
                backoff_multiplier: *multiplier,
                max_attempts: *max_attempts,
            }),
        }
    }
}

/// Reconnect delay strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Same delay forever
    Fixed,
    /// Growing delay, optionally capped in attempts (0 = unlimited)
    Exponential {
        /// Upper bound on a single delay
        #[serde(default = "default_max_delay_ms")]
        max_delay_ms: u64,
        /// Growth factor between attempts, at least 1
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        /// Attempts before giving up, 0 for unlimited
        #[serde(default)]
        max_attempts: u32,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Fixed
    }
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// History buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples retained per entity and metric
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from `config/telemetry.toml` and environment variables
    ///
    /// Environment variables override the file, e.g.
    /// `ROCKET_TELEMETRY_APPLICATION__LOG_LEVEL=debug`.
    pub fn load() -> TelemetryResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> TelemetryResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The provider chain: defaults, then the TOML file, then the environment.
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(TelemetryConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> TelemetryResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(TelemetryError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(TelemetryError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.history.capacity == 0 {
            return Err(TelemetryError::Configuration(
                "history.capacity must be at least 1".to_string(),
            ));
        }

        if self.connection.grace_period_ms == 0 {
            return Err(TelemetryError::Configuration(
                "connection.grace_period_ms must be greater than 0".to_string(),
            ));
        }

        if self.connection.ping_interval_ms == 0 {
            return Err(TelemetryError::Configuration(
                "connection.ping_interval_ms must be greater than 0".to_string(),
            ));
        }

        if let RetryStrategy::Exponential { multiplier, .. } = self.connection.retry {
            if !(multiplier >= 1.0) {
                return Err(TelemetryError::Configuration(format!(
                    "connection.retry.multiplier must be >= 1.0, got {multiplier}"
                )));
            }
        }

        Ok(())
    }
}
