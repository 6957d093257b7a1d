//! Stream Client Configuration Settings
//!
//! Configuration types for the price stream client, loaded from environment
//! variables. Only the access token is required.

use std::time::Duration;

use crate::infrastructure::finnhub::endpoint::{DEFAULT_STREAM_URL, Endpoint, EndpointError};
use crate::infrastructure::finnhub::reconnect::DEFAULT_RECONNECT_DELAY;
use crate::infrastructure::finnhub::transport::DEFAULT_CONNECT_TIMEOUT;

/// Instruments tracked when `PRICE_STREAM_SYMBOLS` is unset.
pub const DEFAULT_INSTRUMENTS: [&str; 4] = [
    "BINANCE:BTCUSDT",
    "OANDA:EUR_USD",
    "OANDA:GBP_USD",
    "OANDA:USD_JPY",
];

/// Access token for the quote stream.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    /// Wrap a token.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Raw token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSocketSettings {
    /// Delay before the first reconnect attempt.
    pub reconnect_delay: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_delay_max: Duration,
    /// Reconnect delay multiplier (1.0 = fixed delay).
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Reconnect when no frame arrives for this long (`None` = never).
    pub idle_timeout: Option<Duration>,
    /// Handshake timeout.
    pub connect_timeout: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_delay_max: DEFAULT_RECONNECT_DELAY,
            reconnect_delay_multiplier: 1.0,
            max_reconnect_attempts: 0,
            idle_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Base WebSocket URL, without the token.
    pub endpoint: String,
    /// Access token.
    pub token: ApiToken,
    /// Instruments to subscribe to, in order.
    pub instruments: Vec<String>,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl StreamConfig {
    /// Configuration with defaults for everything but the token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_STREAM_URL.to_string(),
            token: ApiToken::new(token.into()),
            instruments: DEFAULT_INSTRUMENTS.iter().map(ToString::to_string).collect(),
            websocket: WebSocketSettings::default(),
            server: ServerSettings::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `FINNHUB_TOKEN` is missing or empty, or the
    /// instrument list is empty.
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("FINNHUB_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("FINNHUB_TOKEN".to_string()))?;

        if token.trim().is_empty() {
            return Err(ConfigError::EmptyValue("FINNHUB_TOKEN".to_string()));
        }

        let mut config = Self::new(token.trim());

        if let Some(url) = lookup("FINNHUB_WS_URL").filter(|v| !v.trim().is_empty()) {
            config.endpoint = url.trim().to_string();
        }

        if let Some(symbols) = lookup("PRICE_STREAM_SYMBOLS") {
            config.instruments = symbols
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();

            if config.instruments.is_empty() {
                return Err(ConfigError::EmptyValue("PRICE_STREAM_SYMBOLS".to_string()));
            }
        }

        let defaults = WebSocketSettings::default();
        config.websocket = WebSocketSettings {
            reconnect_delay: parse_env_duration_secs(
                &lookup,
                "PRICE_STREAM_RECONNECT_DELAY_SECS",
                defaults.reconnect_delay,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                &lookup,
                "PRICE_STREAM_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env(
                &lookup,
                "PRICE_STREAM_RECONNECT_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env(
                &lookup,
                "PRICE_STREAM_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            idle_timeout: Some(parse_env_duration_secs(
                &lookup,
                "PRICE_STREAM_IDLE_TIMEOUT_SECS",
                Duration::ZERO,
            ))
            .filter(|d| !d.is_zero()),
            connect_timeout: parse_env_duration_secs(
                &lookup,
                "PRICE_STREAM_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            ),
        };

        config.server = ServerSettings {
            health_port: parse_env(
                &lookup,
                "PRICE_STREAM_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        Ok(config)
    }

    /// Build the validated endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or token is invalid.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        Ok(Endpoint::new(&self.endpoint, self.token.expose())?)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Endpoint URL or token is invalid.
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
