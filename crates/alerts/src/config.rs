//! Alert configuration types.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use volume_core::{default_thresholds, AlertThresholds, Threshold, ThresholdError};

/// Invalid configuration. Fatal at startup, never defaulted.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
    #[error("cooldown_secs must be positive and at most {max}, got {got}")]
    Cooldown { got: u64, max: u64 },
    #[error("retention_secs ({retention}) must not be shorter than cooldown_secs ({cooldown})")]
    RetentionShorterThanCooldown { retention: u64, cooldown: u64 },
    #[error("retention_secs must be at most {max}, got {retention}")]
    RetentionTooLong { retention: u64, max: u64 },
    #[error("{0} must be positive")]
    Zero(&'static str),
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Largest accepted cooldown or retention: ten years.
const MAX_WINDOW_SECS: u64 = 10 * 365 * 24 * 3600;

/// Alert configuration as read from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum seconds between two sends of the same (symbol, level).
    pub cooldown_secs: u64,
    /// Ascending (multiplier, level) tiers.
    pub thresholds: Vec<Threshold>,
    /// State file path.
    pub state_file: PathBuf,
    /// Symbols to monitor (empty = all discovered).
    pub symbols: Vec<String>,
    /// Symbols never alerted on.
    pub excluded_symbols: Vec<String>,
    /// Maximum concurrent observation fetches.
    pub fetch_concurrency: usize,
    /// Per-symbol fetch timeout.
    pub fetch_timeout_secs: u64,
    /// Per-message delivery timeout.
    pub delivery_timeout_secs: u64,
    /// Also require current volume above the last closed candle's.
    pub require_rising_volume: bool,
    /// Drop state records older than this (unset = keep forever).
    pub retention_secs: Option<u64>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 4 * 3600,
            thresholds: default_thresholds(),
            state_file: PathBuf::from("alert_state.json"),
            symbols: Vec::new(),
            excluded_symbols: Vec::new(),
            fetch_concurrency: 8,
            fetch_timeout_secs: 5,
            delivery_timeout_secs: 5,
            require_rising_volume: true,
            retention_secs: None,
        }
    }
}

impl AlertConfig {
    pub fn symbol_filter(&self) -> SymbolFilter {
        SymbolFilter {
            symbols: self.symbols.clone(),
            excluded: self.excluded_symbols.clone(),
        }
    }

    /// Validate into runtime settings.
    pub fn validate(&self) -> Result<AlertSettings, ConfigError> {
        let thresholds = AlertThresholds::new(self.thresholds.clone())?;

        if self.cooldown_secs == 0 || self.cooldown_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::Cooldown {
                got: self.cooldown_secs,
                max: MAX_WINDOW_SECS,
            });
        }
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::Zero("fetch_concurrency"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Zero("fetch_timeout_secs"));
        }
        if self.delivery_timeout_secs == 0 {
            return Err(ConfigError::Zero("delivery_timeout_secs"));
        }

        let retention = match self.retention_secs {
            None => None,
            Some(retention) if retention > MAX_WINDOW_SECS => {
                return Err(ConfigError::RetentionTooLong {
                    retention,
                    max: MAX_WINDOW_SECS,
                });
            }
            Some(retention) if retention < self.cooldown_secs => {
                return Err(ConfigError::RetentionShorterThanCooldown {
                    retention,
                    cooldown: self.cooldown_secs,
                });
            }
            Some(retention) => Some(TimeDelta::seconds(retention as i64)),
        };

        Ok(AlertSettings {
            thresholds,
            cooldown: TimeDelta::seconds(self.cooldown_secs as i64),
            state_file: self.state_file.clone(),
            fetch_concurrency: self.fetch_concurrency,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
            require_rising_volume: self.require_rising_volume,
            retention,
            filter: self.symbol_filter(),
        })
    }
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub thresholds: AlertThresholds,
    pub cooldown: TimeDelta,
    pub state_file: PathBuf,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    pub delivery_timeout: Duration,
    pub require_rising_volume: bool,
    pub retention: Option<TimeDelta>,
    pub filter: SymbolFilter,
}

/// Allow-list and exclusion list, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolFilter {
    /// Empty means every symbol is allowed.
    pub symbols: Vec<String>,
    pub excluded: Vec<String>,
}

impl SymbolFilter {
    pub fn allows(&self, symbol: &str) -> bool {
        if self.excluded.iter().any(|s| s.eq_ignore_ascii_case(symbol)) {
            return false;
        }
        self.symbols.is_empty() || self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }
}
