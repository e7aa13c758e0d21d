//! Runtime Configuration
//!
//! Tunables for the update scheduler, the garbage collector and the async
//! debounce wrapper. Every field has a default, so a partial JSON document
//! (or an empty object) is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`RuntimeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_settle_rounds must be at least 1")]
    ZeroRounds,

    #[error("debounce_ms must be at least 1")]
    ZeroDebounce,
}

/// Configuration for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on derived-signal settle rounds per flush. Hitting it is
    /// treated as a runaway dependency chain.
    pub max_settle_rounds: usize,

    /// Delay between the first new subscription and the GC sweep.
    pub gc_interval_ms: u64,

    /// Debounce window applied by [`Runtime::wrap_async`](crate::reactive::Runtime::wrap_async).
    pub debounce_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_settle_rounds: 100,
            gc_interval_ms: 1000,
            debounce_ms: 100,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_settle_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::ZeroDebounce);
        }
        Ok(())
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_settle_rounds, 100);
        assert_eq!(config.gc_interval(), Duration::from_secs(1));
        assert_eq!(config.debounce(), Duration::from_millis(100));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "debounce_ms": 25 }"#).unwrap();
        assert_eq!(config.debounce_ms, 25);
        assert_eq!(config.max_settle_rounds, 100);
        assert_eq!(config.gc_interval_ms, 1000);
    }

    #[test]
    fn rejects_zero_rounds() {
        let err = RuntimeConfig::from_json(r#"{ "max_settle_rounds": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroRounds));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = RuntimeConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn round_trips_through_json() {
        let config = RuntimeConfig {
            max_settle_rounds: 8,
            gc_interval_ms: 250,
            debounce_ms: 10,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(RuntimeConfig::from_json(&json).unwrap(), config);
    }
}
