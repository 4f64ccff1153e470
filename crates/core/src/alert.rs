//! Cooldown slot identity and the record persisted for it.

use crate::AlertLevel;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between symbol and level in the persisted key form.
pub const KEY_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("missing '|' separator in key {0:?}")]
    MissingSeparator(String),
    #[error("empty symbol or level in key {0:?}")]
    EmptyPart(String),
}

/// Identity of one cooldown slot: a `(symbol, level)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertKey {
    symbol: CompactString,
    level: CompactString,
}

impl AlertKey {
    pub fn new(symbol: impl Into<CompactString>, level: impl Into<CompactString>) -> Self {
        Self {
            symbol: symbol.into(),
            level: level.into(),
        }
    }

    /// Key for a classified alert on `symbol`.
    pub fn for_level(symbol: &str, level: &AlertLevel) -> Self {
        Self::new(symbol, level.id.clone())
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Persisted string form, `SYMBOL|level`.
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.symbol, KEY_SEPARATOR, self.level)
    }

    /// Parse the persisted string form. The symbol never contains the
    /// separator, so the split happens on the first occurrence.
    pub fn parse(raw: &str) -> Result<Self, KeyParseError> {
        let (symbol, level) = raw
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyParseError::MissingSeparator(raw.to_string()))?;
        if symbol.is_empty() || level.is_empty() {
            return Err(KeyParseError::EmptyPart(raw.to_string()));
        }
        Ok(Self::new(symbol, level))
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.symbol, KEY_SEPARATOR, self.level)
    }
}

/// Last successful notification for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub key: AlertKey,
    pub last_sent_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(key: AlertKey, last_sent_at: DateTime<Utc>) -> Self {
        Self { key, last_sent_at }
    }
}
