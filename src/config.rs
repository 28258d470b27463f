use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timer: TimerConfig,
    pub liveness: LivenessConfig,
    pub settlement: SettlementConfig,
    pub bot: BotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            liveness: LivenessConfig::default(),
            settlement: SettlementConfig::default(),
            bot: BotConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Bidding countdown window in seconds. Reset in full on every
    /// accepted bid, never merely extended.
    pub bid_window_secs: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            bid_window_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Client heartbeat interval in seconds. The offline threshold is
    /// derived from this (1.5x), never configured independently.
    pub heartbeat_interval_secs: u64,
    /// Entries older than this many intervals are evicted on prune.
    pub eviction_intervals: u32,
}

impl LivenessConfig {
    /// Timeout window after which a member is considered offline.
    pub fn offline_after_ms(&self) -> u64 {
        self.heartbeat_interval_secs * 1500
    }

    pub fn eviction_after_secs(&self) -> u64 {
        self.heartbeat_interval_secs * self.eviction_intervals as u64
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 10,
            eviction_intervals: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Seconds before re-arming the clock after a ledger failure.
    pub retry_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { retry_secs: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Maximum raise above current price a simulated bot will offer.
    pub max_raise: u32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self { max_raise: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (overridden by RUST_LOG)
    pub level: String,
    /// Emit JSON-formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file with GAVEL_* environment overrides.
    ///
    /// Environment variables use `__` as the nesting separator, e.g.
    /// `GAVEL__TIMER__BID_WINDOW_SECS=30`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("GAVEL").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from environment only (defaults otherwise).
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("GAVEL").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.timer.bid_window_secs, 20);
        assert_eq!(cfg.liveness.heartbeat_interval_secs, 10);
        assert_eq!(cfg.settlement.retry_secs, 5);
    }

    #[test]
    fn test_offline_window_is_one_and_a_half_intervals() {
        let liveness = LivenessConfig {
            heartbeat_interval_secs: 10,
            eviction_intervals: 30,
        };
        assert_eq!(liveness.offline_after_ms(), 15_000);

        let liveness = LivenessConfig {
            heartbeat_interval_secs: 4,
            eviction_intervals: 30,
        };
        assert_eq!(liveness.offline_after_ms(), 6_000);
    }

    #[test]
    fn test_from_env_uses_defaults() {
        let cfg = EngineConfig::from_env().unwrap();
        assert_eq!(cfg.timer.bid_window_secs, 20);
    }
}
