//! Session configuration and RON config files

use std::path::Path;
use std::time::Duration;

use rg_proto::Codec;
use rg_units::{Dimension, Quantity, Unit, UnitSystem};
use serde::{Deserialize, Serialize};

/// Default server port
pub const DEFAULT_PORT: u16 = 50051;

/// Where the geometry server listens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionTarget {
    Tcp { host: String, port: u16 },
}

impl ConnectionTarget {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        ConnectionTarget::Tcp {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form for socket connects
    pub fn address(&self) -> String {
        match self {
            ConnectionTarget::Tcp { host, port } => format!("{host}:{port}"),
        }
    }
}

impl Default for ConnectionTarget {
    fn default() -> Self {
        Self::tcp("127.0.0.1", DEFAULT_PORT)
    }
}

/// Bounded exponential backoff for connection establishment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before giving up (including the first)
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }
}

/// Configuration for a geometry session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub target: ConnectionTarget,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Per-call timeout in milliseconds
    pub call_timeout_ms: u64,
    /// Canonical unit system of the server
    #[serde(default)]
    pub units: UnitSystem,
    #[serde(default)]
    pub codec: Codec,
    /// Chordal tolerance requested for tessellations (a length)
    pub tessellation_tolerance: Quantity,
    /// Issue queries on a second connection so they never wait behind
    /// long-running mutations
    #[serde(default)]
    pub dedicated_query_channel: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target: ConnectionTarget::default(),
            retry: RetryPolicy::default(),
            call_timeout_ms: 30_000,
            units: UnitSystem::si(),
            codec: Codec::default(),
            tessellation_tolerance: Quantity::new(1.0, Unit::Millimeter),
            dedicated_query_channel: false,
        }
    }
}

impl SessionConfig {
    /// Create a config targeting a TCP server with default settings
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            target: ConnectionTarget::tcp(host, port),
            ..Self::default()
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Check the config for values a session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid("retry.multiplier must be >= 1".into()));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("call_timeout_ms must be > 0".into()));
        }
        self.units
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("units: {e}")))?;
        self.tessellation_tolerance
            .expect_dimension(Dimension::Length)
            .map_err(|e| ConfigError::Invalid(format!("tessellation_tolerance: {e}")))?;
        if self.tessellation_tolerance.value() <= 0.0 {
            return Err(ConfigError::Invalid(
                "tessellation_tolerance must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Save config to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = self.to_ron_string()?;
        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Serialize config to a RON string
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Load and validate config from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Parse and validate config from a RON string
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig =
            ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Config-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(20), Duration::from_millis(5_000));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.ron");

        let mut config = SessionConfig::tcp("geometry.local", 6000);
        config.units = UnitSystem::millimeter();
        config.dedicated_query_channel = true;
        config.save(&path).unwrap();

        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.target.address(), "geometry.local:6000");
    }

    #[test]
    fn test_rejects_angle_tolerance() {
        let mut config = SessionConfig::default();
        config.tessellation_tolerance = Quantity::new(1.0, Unit::Degree);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = SessionConfig::default();
        config.retry.max_attempts = 0;
        let text = config.to_ron_string().unwrap();
        assert!(SessionConfig::from_ron_str(&text).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = SessionConfig::load("/nonexistent/session.ron");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
