//! Alert tiers and the threshold table that produces them.

use crate::alert::KEY_SEPARATOR;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while building a threshold table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("threshold table is empty")]
    Empty,

    #[error("too many tiers: {0}")]
    TooManyTiers(usize),

    #[error("level id must not be empty")]
    EmptyLevel,

    #[error("level id {0:?} contains the reserved separator '|'")]
    ReservedCharacter(String),

    #[error("duplicate level id {0:?}")]
    DuplicateLevel(String),

    #[error("multiplier for level {level:?} must be finite and positive, got {multiplier}")]
    InvalidMultiplier { level: String, multiplier: f64 },

    #[error("multipliers must be strictly ascending: {previous} is followed by {next}")]
    NotAscending { previous: f64, next: f64 },
}

/// A discrete alert tier.
///
/// Ordering follows `rank`: a higher rank is a more severe alert.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertLevel {
    /// Position in the threshold table, 0 being the mildest tier.
    pub rank: u8,
    /// Stable identifier, used in persisted keys and messages (e.g. "500%+").
    pub id: CompactString,
}

impl AlertLevel {
    pub fn new(rank: u8, id: impl Into<CompactString>) -> Self {
        Self {
            rank,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// One row of the threshold table: fire `level` once volume exceeds
/// `multiplier` times the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub multiplier: f64,
    pub level: CompactString,
}

impl Threshold {
    pub fn new(multiplier: f64, level: impl Into<CompactString>) -> Self {
        Self {
            multiplier,
            level: level.into(),
        }
    }
}

/// Validated, strictly ascending threshold table.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    tiers: Vec<Threshold>,
}

impl AlertThresholds {
    /// Validate and build a threshold table.
    pub fn new(tiers: Vec<Threshold>) -> Result<Self, ThresholdError> {
        if tiers.is_empty() {
            return Err(ThresholdError::Empty);
        }
        if tiers.len() > u8::MAX as usize {
            return Err(ThresholdError::TooManyTiers(tiers.len()));
        }

        let mut seen = HashSet::new();
        let mut previous: Option<f64> = None;
        for tier in &tiers {
            if tier.level.trim().is_empty() {
                return Err(ThresholdError::EmptyLevel);
            }
            if tier.level.contains(KEY_SEPARATOR) {
                return Err(ThresholdError::ReservedCharacter(tier.level.to_string()));
            }
            if !seen.insert(tier.level.clone()) {
                return Err(ThresholdError::DuplicateLevel(tier.level.to_string()));
            }
            if !tier.multiplier.is_finite() || tier.multiplier <= 0.0 {
                return Err(ThresholdError::InvalidMultiplier {
                    level: tier.level.to_string(),
                    multiplier: tier.multiplier,
                });
            }
            if let Some(prev) = previous {
                if tier.multiplier <= prev {
                    return Err(ThresholdError::NotAscending {
                        previous: prev,
                        next: tier.multiplier,
                    });
                }
            }
            previous = Some(tier.multiplier);
        }

        Ok(Self { tiers })
    }

    /// Most severe tier whose multiplier the ratio exceeds.
    ///
    /// The comparison is strict: a ratio exactly equal to a multiplier does
    /// not reach that tier.
    pub fn select(&self, ratio: f64) -> Option<AlertLevel> {
        self.tiers
            .iter()
            .enumerate()
            .rev()
            .find(|(_, tier)| ratio > tier.multiplier)
            .map(|(rank, tier)| AlertLevel::new(rank as u8, tier.level.clone()))
    }

    /// Look up a tier by its identifier.
    pub fn level(&self, id: &str) -> Option<AlertLevel> {
        self.tiers
            .iter()
            .position(|tier| tier.level == id)
            .map(|rank| AlertLevel::new(rank as u8, self.tiers[rank].level.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Raw rows, in ascending order.
    pub fn tiers(&self) -> &[Threshold] {
        &self.tiers
    }
}

/// Default tiers: 5x, 7x, 10x and 15x the baseline.
pub fn default_thresholds() -> Vec<Threshold> {
    vec![
        Threshold::new(5.0, "500%+"),
        Threshold::new(7.0, "700%+"),
        Threshold::new(10.0, "1000%+"),
        Threshold::new(15.0, "1500%+"),
    ]
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            tiers: default_thresholds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_tier() -> AlertThresholds {
        AlertThresholds::new(vec![Threshold::new(2.0, "L1"), Threshold::new(5.0, "L2")]).unwrap()
    }

    #[test]
    fn test_select_highest_tier() {
        let thresholds = two_tier();
        assert_eq!(thresholds.select(3.0), Some(AlertLevel::new(0, "L1")));
        assert_eq!(thresholds.select(6.0), Some(AlertLevel::new(1, "L2")));
        assert_eq!(thresholds.select(1.5), None);
    }

    #[test]
    fn test_select_is_strict_at_boundary() {
        let thresholds = two_tier();
        assert_eq!(thresholds.select(2.0), None);
        assert_eq!(thresholds.select(5.0), Some(AlertLevel::new(0, "L1")));
    }

    #[test]
    fn test_level_ordering_follows_rank() {
        let mild = AlertLevel::new(0, "zzz");
        let severe = AlertLevel::new(1, "aaa");
        assert!(severe > mild);
    }

    #[test]
    fn test_rejects_empty_table() {
        assert_eq!(AlertThresholds::new(vec![]), Err(ThresholdError::Empty));
    }

    #[test]
    fn test_rejects_unordered_multipliers() {
        let result =
            AlertThresholds::new(vec![Threshold::new(5.0, "L2"), Threshold::new(2.0, "L1")]);
        assert_eq!(
            result,
            Err(ThresholdError::NotAscending {
                previous: 5.0,
                next: 2.0
            })
        );
    }

    #[test]
    fn test_rejects_bad_levels() {
        let duplicate =
            AlertThresholds::new(vec![Threshold::new(2.0, "L1"), Threshold::new(3.0, "L1")]);
        assert_eq!(duplicate, Err(ThresholdError::DuplicateLevel("L1".into())));

        let separator = AlertThresholds::new(vec![Threshold::new(2.0, "a|b")]);
        assert_eq!(
            separator,
            Err(ThresholdError::ReservedCharacter("a|b".into()))
        );

        let blank = AlertThresholds::new(vec![Threshold::new(2.0, " ")]);
        assert_eq!(blank, Err(ThresholdError::EmptyLevel));
    }

    #[test]
    fn test_rejects_non_positive_multiplier() {
        let zero = AlertThresholds::new(vec![Threshold::new(0.0, "L0")]);
        assert!(matches!(zero, Err(ThresholdError::InvalidMultiplier { .. })));

        let nan = AlertThresholds::new(vec![Threshold::new(f64::NAN, "L0")]);
        assert!(matches!(nan, Err(ThresholdError::InvalidMultiplier { .. })));
    }

    #[test]
    fn test_default_thresholds_are_valid() {
        let thresholds = AlertThresholds::new(default_thresholds()).unwrap();
        assert_eq!(thresholds, AlertThresholds::default());
        assert_eq!(thresholds.len(), 4);
        assert_eq!(thresholds.select(12.0).unwrap().id, "1000%+");
        assert_eq!(thresholds.level("700%+"), Some(AlertLevel::new(1, "700%+")));
    }
}
