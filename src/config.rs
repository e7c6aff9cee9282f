use std::time::Duration;
use url::Url;

/// Configuration for a channel client.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint of the server hub (`ws://` or `wss://`).
    pub url: String,
    /// Reconnection settings.
    pub reconnect: ReconnectConfig,
    /// Interval between liveness pings while the connection is open.
    pub ping_interval: Duration,
    /// Timeout for establishing a single connection attempt.
    pub connect_timeout: Duration,
}

/// Reconnection settings.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base backoff unit; the delay before scheduled attempt `n` is
    /// `base_delay * 1.5^(n-1)`, capped at 30 seconds.
    pub base_delay: Duration,
    /// Automatic attempts allowed per session (reset on every successful open).
    pub session_attempts_limit: u32,
    /// Absolute attempt ceiling for the lifetime of the client instance.
    pub lifetime_attempts_limit: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(3000),
            session_attempts_limit: 5,
            lifetime_attempts_limit: 10,
        }
    }
}

impl ChannelConfig {
    /// Create a new builder for the given endpoint.
    pub fn builder(url: impl Into<String>) -> ChannelConfigBuilder {
        ChannelConfigBuilder {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
            ping_interval: Duration::from_millis(30_000),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Builder for [`ChannelConfig`].
#[derive(Debug, Clone)]
pub struct ChannelConfigBuilder {
    url: String,
    reconnect: ReconnectConfig,
    ping_interval: Duration,
    connect_timeout: Duration,
}

impl ChannelConfigBuilder {
    /// Set the base backoff unit (default 3000 ms).
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect.base_delay = delay;
        self
    }

    /// Set the per-session automatic attempt cap (default 5).
    pub fn reconnect_attempts_limit(mut self, limit: u32) -> Self {
        self.reconnect.session_attempts_limit = limit;
        self
    }

    /// Set the absolute attempt cap (default 10).
    pub fn max_lifetime_attempts(mut self, limit: u32) -> Self {
        self.reconnect.lifetime_attempts_limit = limit;
        self
    }

    /// Set the liveness ping cadence (default 30 000 ms).
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the per-attempt connection timeout (default 10 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the configuration with validation.
    pub fn build(self) -> Result<ChannelConfig, ConfigError> {
        let parsed = Url::parse(&self.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {e}", self.url)))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(ConfigError::InvalidUrl(format!(
                "unsupported scheme '{}', expected ws or wss",
                parsed.scheme()
            )));
        }

        if self.reconnect.base_delay.is_zero() {
            return Err(ConfigError::InvalidReconnect(
                "base delay must be > 0".to_string(),
            ));
        }
        if self.reconnect.session_attempts_limit == 0 {
            return Err(ConfigError::InvalidReconnect(
                "session attempts limit must be >= 1".to_string(),
            ));
        }
        if self.reconnect.lifetime_attempts_limit < self.reconnect.session_attempts_limit {
            return Err(ConfigError::InvalidReconnect(
                "lifetime attempts limit must be >= session attempts limit".to_string(),
            ));
        }

        if self.ping_interval.is_zero() {
            return Err(ConfigError::InvalidLiveness(
                "ping interval must be > 0".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidLiveness(
                "connect timeout must be > 0".to_string(),
            ));
        }

        Ok(ChannelConfig {
            url: self.url,
            reconnect: self.reconnect,
            ping_interval: self.ping_interval,
            connect_timeout: self.connect_timeout,
        })
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Endpoint is not a valid ws/wss URL
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
    /// Invalid reconnection settings
    #[error("invalid reconnect configuration: {0}")]
    InvalidReconnect(String),
    /// Invalid liveness/timing settings
    #[error("invalid liveness configuration: {0}")]
    InvalidLiveness(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::builder("ws://localhost:8080/feed")
            .build()
            .expect("valid config");

        assert_eq!(config.reconnect.base_delay, Duration::from_millis(3000));
        assert_eq!(config.reconnect.session_attempts_limit, 5);
        assert_eq!(config.reconnect.lifetime_attempts_limit, 10);
        assert_eq!(config.ping_interval, Duration::from_millis(30_000));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_overrides() {
        let config = ChannelConfig::builder("wss://hub.example.com/ws")
            .reconnect_delay(Duration::from_millis(500))
            .reconnect_attempts_limit(3)
            .max_lifetime_attempts(6)
            .ping_interval(Duration::from_secs(5))
            .build()
            .expect("valid config");

        assert_eq!(config.reconnect.base_delay, Duration::from_millis(500));
        assert_eq!(config.reconnect.session_attempts_limit, 3);
        assert_eq!(config.reconnect.lifetime_attempts_limit, 6);
        assert_eq!(config.ping_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(ChannelConfig::builder("not a url").build().is_err());
        assert!(ChannelConfig::builder("http://example.com").build().is_err());
    }

    #[test]
    fn test_rejects_zero_limits() {
        assert!(ChannelConfig::builder("ws://localhost/feed")
            .reconnect_attempts_limit(0)
            .build()
            .is_err());
        assert!(ChannelConfig::builder("ws://localhost/feed")
            .reconnect_delay(Duration::ZERO)
            .build()
            .is_err());
        assert!(ChannelConfig::builder("ws://localhost/feed")
            .ping_interval(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_rejects_lifetime_below_session() {
        assert!(ChannelConfig::builder("ws://localhost/feed")
            .reconnect_attempts_limit(5)
            .max_lifetime_attempts(4)
            .build()
            .is_err());
    }
}
