//! WebSocket endpoint resolution and URL normalization.
//!
//! # Address Resolution Precedence
//!
//! Addresses are resolved in this order (highest priority first):
//! 1. Command-line `--url`
//! 2. `connection.url` from the configuration file or `ROCKET_TELEMETRY_CONNECTION__URL`
//! 3. `ws(s)://{host}:{port}{path}` built from the `connection` section
//!    (default `ws://127.0.0.1:9000/ws`)
//!
//! # URL Normalization
//!
//! The [`normalize_url`] function handles common input formats:
//! - Bare host:port (e.g., `10.0.0.5:9000` → `ws://10.0.0.5:9000/ws`)
//! - Bare host (e.g., `localhost` → `ws://localhost:9000/ws`)
//! - HTTP schemes (e.g., `https://sim.example.com/ws` → `wss://sim.example.com/ws`)

use crate::config::ConnectionConfig;
use crate::error::{TelemetryError, TelemetryResult};
use std::fmt;
use url::Url;

/// Default port of the simulation WebSocket server.
pub const DEFAULT_WS_PORT: u16 = 9000;

/// Default WebSocket path.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Where the endpoint configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// `--url` on the command line
    CommandLine,
    /// `connection.url` in config or environment
    Configured,
    /// Assembled from host, port and path
    HostPort,
}

impl AddressSource {
    /// Returns a short label for logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::CommandLine => "cli",
            Self::Configured => "config",
            Self::HostPort => "host/port",
        }
    }
}

/// Normalized WebSocket endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsAddress {
    url: Url,
    source: AddressSource,
}

impl WsAddress {
    /// Parse and normalize an endpoint.
    pub fn parse(input: &str, source: AddressSource) -> TelemetryResult<Self> {
        Ok(Self {
            url: normalize_url(input)?,
            source,
        })
    }

    /// The normalized URL string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns where this address came from.
    #[must_use]
    pub fn source(&self) -> AddressSource {
        self.source
    }

    /// Returns `true` if the endpoint uses TLS.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl fmt::Display for WsAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Normalize a WebSocket URL string.
///
/// - Adds `ws://`, the default port and the default path to bare hosts
/// - Maps `http` to `ws` and `https` to `wss`
/// - Fills in the default path when none is given
/// - Rejects every other scheme
///
/// # Examples
///
/// ```
/// use rocket_telemetry::network::address::normalize_url;
///
/// let url = normalize_url("192.168.1.100:9001")?;
/// assert_eq!(url.as_str(), "ws://192.168.1.100:9001/ws");
///
/// let url = normalize_url("https://sim.example.com")?;
/// assert_eq!(url.as_str(), "wss://sim.example.com/ws");
/// # Ok::<(), rocket_telemetry::error::TelemetryError>(())
/// ```
pub fn normalize_url(input: &str) -> TelemetryResult<Url> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TelemetryError::InvalidAddress(
            "address cannot be empty".to_string(),
        ));
    }

    let bare = !input.contains("://");
    let with_scheme = if bare {
        format!("ws://{input}")
    } else {
        input.to_string()
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| TelemetryError::InvalidAddress(format!("{with_scheme}: {e}")))?;

    let scheme = match url.scheme().to_ascii_lowercase().as_str() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(TelemetryError::InvalidAddress(format!(
                "unsupported scheme '{other}' (use ws or wss)"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| TelemetryError::InvalidAddress(format!("cannot use scheme {scheme}")))?;

    if url.host().is_none() {
        return Err(TelemetryError::InvalidAddress(
            "URL must include a host".to_string(),
        ));
    }

    if bare && url.port().is_none() {
        url.set_port(Some(DEFAULT_WS_PORT))
            .map_err(|()| TelemetryError::InvalidAddress("cannot set port".to_string()))?;
    }

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(DEFAULT_WS_PATH);
    }

    Ok(url)
}

/// Resolve the endpoint from the command line and configuration.
pub fn resolve_address(
    cli_url: Option<&str>,
    config: &ConnectionConfig,
) -> TelemetryResult<WsAddress> {
    if let Some(input) = cli_url.filter(|s| !s.trim().is_empty()) {
        return WsAddress::parse(input, AddressSource::CommandLine);
    }

    if let Some(input) = config.url.as_deref().filter(|s| !s.trim().is_empty()) {
        return WsAddress::parse(input, AddressSource::Configured);
    }

    let scheme = if config.secure { "wss" } else { "ws" };
    let path = if config.path.starts_with('/') {
        config.path.clone()
    } else {
        format!("/{}", config.path)
    };
    WsAddress::parse(
        &format!("{scheme}://{}:{}{path}", config.host, config.port),
        AddressSource::HostPort,
    )
}
