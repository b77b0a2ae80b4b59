//! Gateway configuration.

use std::time::Duration;

use crate::error::AlpacaError;

/// Environment for the Alpaca API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpacaEnvironment {
    /// Paper trading (simulated).
    Paper,
    /// Live trading (real money).
    Live,
}

impl AlpacaEnvironment {
    /// Get the base URL for the trading API.
    #[must_use]
    pub const fn trading_base_url(&self) -> &'static str {
        match self {
            Self::Paper => "https://paper-api.alpaca.markets",
            Self::Live => "https://api.alpaca.markets",
        }
    }

    /// Get the base URL for the market data API.
    #[must_use]
    pub const fn data_base_url(&self) -> &'static str {
        "https://data.alpaca.markets"
    }

    /// Get the trade updates WebSocket URL.
    #[must_use]
    pub const fn stream_url(&self) -> &'static str {
        match self {
            Self::Paper => "wss://paper-api.alpaca.markets/stream",
            Self::Live => "wss://api.alpaca.markets/stream",
        }
    }

    /// Check if this is live trading.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl std::fmt::Display for AlpacaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "PAPER"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}

/// Configuration for the trading gateway.
#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    /// API key.
    pub api_key: String,
    /// API secret.
    pub api_secret: String,
    /// Trading environment.
    pub environment: AlpacaEnvironment,
    /// HTTP request timeout.
    pub http_timeout: Duration,
    /// Bound on how long a submit/replace/cancel call waits for its
    /// acknowledgement event.
    pub ack_timeout: Duration,
    /// REST retry policy.
    pub retry: RetryConfig,
    /// Trade updates stream settings.
    pub stream: StreamConfig,
}

impl AlpacaConfig {
    /// Create a new configuration with default timeouts.
    #[must_use]
    pub fn new(api_key: String, api_secret: String, environment: AlpacaEnvironment) -> Self {
        Self {
            api_key,
            api_secret,
            environment,
            http_timeout: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            stream: StreamConfig::default(),
        }
    }

    /// Create a configuration from `APCA_API_KEY_ID` / `APCA_API_SECRET_KEY`.
    pub fn from_env(environment: AlpacaEnvironment) -> Result<Self, AlpacaError> {
        let api_key =
            std::env::var("APCA_API_KEY_ID").map_err(|_| AlpacaError::AuthenticationFailed)?;
        let api_secret =
            std::env::var("APCA_API_SECRET_KEY").map_err(|_| AlpacaError::AuthenticationFailed)?;
        Ok(Self::new(api_key, api_secret, environment))
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the acknowledgement wait bound.
    #[must_use]
    pub const fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the retry configuration.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Get the trading API base URL.
    #[must_use]
    pub const fn trading_base_url(&self) -> &'static str {
        self.environment.trading_base_url()
    }

    /// Get the data API base URL.
    #[must_use]
    pub const fn data_base_url(&self) -> &'static str {
        self.environment.data_base_url()
    }

    /// Get the trade updates stream URL.
    #[must_use]
    pub const fn stream_url(&self) -> &'static str {
        self.environment.stream_url()
    }
}

/// REST retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Trade updates stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Timeout for the authenticate-then-listen handshake.
    pub auth_timeout: Duration,
    /// Initial reconnect backoff duration.
    pub initial_backoff: Duration,
    /// Maximum reconnect backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Maximum reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            max_reconnect_attempts: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: AlpacaEnvironment) -> AlpacaConfig {
        AlpacaConfig::new("key".to_string(), "secret".to_string(), environment)
    }

    #[test]
    fn paper_environment_urls() {
        let env = AlpacaEnvironment::Paper;
        assert!(env.trading_base_url().contains("paper"));
        assert!(env.stream_url().contains("paper"));
        assert!(!env.is_live());
    }

    #[test]
    fn live_environment_urls() {
        let env = AlpacaEnvironment::Live;
        assert!(!env.trading_base_url().contains("paper"));
        assert!(!env.stream_url().contains("paper"));
        assert!(env.is_live());
    }

    #[test]
    fn default_ack_timeout_is_ten_seconds() {
        let config = config(AlpacaEnvironment::Paper);
        assert_eq!(config.ack_timeout, Duration::from_secs(10));
    }

    #[test]
    fn config_with_ack_timeout() {
        let config = config(AlpacaEnvironment::Paper).with_ack_timeout(Duration::from_millis(250));
        assert_eq!(config.ack_timeout, Duration::from_millis(250));
    }

    #[test]
    fn config_data_base_url() {
        let config = config(AlpacaEnvironment::Paper);
        assert!(config.data_base_url().contains("data.alpaca"));
    }

    #[test]
    fn environment_display() {
        assert_eq!(format!("{}", AlpacaEnvironment::Paper), "PAPER");
        assert_eq!(format!("{}", AlpacaEnvironment::Live), "LIVE");
    }

    #[test]
    fn retry_config_default() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_backoff, Duration::from_millis(100));
    }
}
