//! Engine configuration options.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_events must be positive")]
    ZeroMaxEvents,
    #[error("twap lookback window must be positive, got {0}ms")]
    NonPositiveLookback(i64),
    #[error("funding epoch id must not be empty")]
    EmptyEpochId,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Echo every event through `tracing::info!`.
    pub verbose: bool,
    /// Funding epoch for markets created without one.
    pub default_funding_epoch_id: String,
    /// TWAP lookback for markets created without one.
    pub default_twap_lookback_window_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
            default_funding_epoch_id: "30 min".to_string(),
            default_twap_lookback_window_ms: 30 * 60 * 1000,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events == 0 {
            return Err(ConfigError::ZeroMaxEvents);
        }
        if self.default_twap_lookback_window_ms <= 0 {
            return Err(ConfigError::NonPositiveLookback(
                self.default_twap_lookback_window_ms,
            ));
        }
        if self.default_funding_epoch_id.is_empty() {
            return Err(ConfigError::EmptyEpochId);
        }
        Ok(())
    }

    pub fn default_twap_lookback_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.default_twap_lookback_window_ms)
    }
}
