//! Channel configuration.

use std::{fmt, time::Duration};

/// Origin used when none is configured.
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Upgrade path appended to the origin.
pub const DEFAULT_PATH: &str = "/ws";

/// Base delay of the exponential backoff.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3_000);

/// Consecutive automatic retries before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Channel configuration, captured when the channel is constructed.
#[derive(Clone)]
pub struct ChannelConfig {
    /// Origin (or any page URL) the endpoint is derived from.
    pub origin: String,
    /// Upgrade path on the origin.
    pub path: String,
    /// Opaque credential forwarded to the server on upgrade.
    pub credential: Option<String>,
    /// Whether abnormal closes schedule automatic retries.
    pub reconnect: bool,
    /// Base delay for exponential backoff.
    pub reconnect_interval: Duration,
    /// Attempt bound for automatic retries.
    pub max_attempts: u32,
    /// Ping interval while open. `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            path: DEFAULT_PATH.to_string(),
            credential: None,
            reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            heartbeat_interval: None,
        }
    }
}

impl ChannelConfig {
    /// Configuration for the given origin with default settings.
    pub fn new(origin: impl Into<String>) -> Self {
        Self { origin: origin.into(), ..Self::default() }
    }

    /// Override the upgrade path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Forward a credential on every upgrade request.
    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Enable or disable automatic retries.
    #[must_use]
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Set the backoff base delay.
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the attempt bound.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Send a ping at this interval while open.
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("origin", &self.origin)
            .field("path", &self.path)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("reconnect", &self.reconnect)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("max_attempts", &self.max_attempts)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ChannelConfig::default();
        assert_eq!(config.path, "/ws");
        assert!(config.reconnect);
        assert_eq!(config.reconnect_interval, Duration::from_millis(3_000));
        assert_eq!(config.max_attempts, 5);
        assert!(config.heartbeat_interval.is_none());
    }

    #[test]
    fn debug_output_redacts_credential() {
        let config = ChannelConfig::new("https://app.example.com").with_credential("s3cret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
