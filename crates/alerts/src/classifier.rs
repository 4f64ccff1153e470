//! Volume ratio classification into alert tiers.

use volume_core::{AlertLevel, AlertThresholds, VolumeObservation};

/// Maps a volume ratio and candle direction to at most one alert tier.
///
/// Pure: no state beyond the threshold table.
#[derive(Debug, Clone, Default)]
pub struct AlertClassifier {
    thresholds: AlertThresholds,
}

impl AlertClassifier {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Highest tier reached by `current_volume / baseline_mean_volume`,
    /// only for bullish candles (close strictly above open). A zero,
    /// negative or non-finite baseline never alerts.
    pub fn classify(
        &self,
        current_volume: f64,
        baseline_mean_volume: f64,
        open_price: f64,
        close_price: f64,
    ) -> Option<AlertLevel> {
        if baseline_mean_volume <= 0.0 || !baseline_mean_volume.is_finite() {
            return None;
        }
        if !(close_price > open_price) {
            return None;
        }
        let ratio = current_volume / baseline_mean_volume;
        if !ratio.is_finite() {
            return None;
        }
        self.thresholds.select(ratio)
    }

    /// Classify a full observation. With `require_rising_volume`, the
    /// current volume must also exceed the last closed candle's volume when
    /// that is known.
    pub fn classify_observation(
        &self,
        observation: &VolumeObservation,
        require_rising_volume: bool,
    ) -> Option<AlertLevel> {
        if require_rising_volume {
            if let Some(recent) = observation.recent {
                if !(observation.current_volume > recent.last_1h) {
                    return None;
                }
            }
        }
        self.classify(
            observation.current_volume,
            observation.baseline_mean_volume,
            observation.open_price,
            observation.close_price,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use volume_core::{RecentVolume, Threshold};

    fn classifier() -> AlertClassifier {
        AlertClassifier::new(
            AlertThresholds::new(vec![Threshold::new(2.0, "L1"), Threshold::new(5.0, "L2")])
                .unwrap(),
        )
    }

    #[test]
    fn test_ratio_three_is_first_tier() {
        let level = classifier().classify(1_200_000.0, 400_000.0, 10.0, 11.0);
        assert_eq!(level, Some(AlertLevel::new(0, "L1")));
    }

    #[test]
    fn test_highest_tier_wins() {
        let level = classifier().classify(600.0, 100.0, 10.0, 11.0);
        assert_eq!(level, Some(AlertLevel::new(1, "L2")));
    }

    #[test]
    fn test_bearish_never_alerts() {
        let c = classifier();
        for (current, baseline) in [(1e9, 1.0), (300.0, 100.0), (1.0, 1e9)] {
            assert_eq!(c.classify(current, baseline, 100.0, 99.0), None);
        }
    }

    #[test]
    fn test_flat_candle_never_alerts() {
        assert_eq!(classifier().classify(1e9, 1.0, 100.0, 100.0), None);
    }

    #[test]
    fn test_bad_baseline_never_alerts() {
        let c = classifier();
        assert_eq!(c.classify(1000.0, 0.0, 10.0, 11.0), None);
        assert_eq!(c.classify(1000.0, -5.0, 10.0, 11.0), None);
        assert_eq!(c.classify(1000.0, f64::NAN, 10.0, 11.0), None);
        assert_eq!(c.classify(1000.0, f64::INFINITY, 10.0, 11.0), None);
    }

    #[test]
    fn test_below_all_tiers() {
        assert_eq!(classifier().classify(150.0, 100.0, 10.0, 11.0), None);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let first = c.classify(700.0, 100.0, 1.0, 2.0);
        for _ in 0..10 {
            assert_eq!(c.classify(700.0, 100.0, 1.0, 2.0), first);
        }
    }

    #[test]
    fn test_rising_volume_gate() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap();
        let recent = RecentVolume {
            last_1h: 500.0,
            last_2h: 600.0,
            last_4h: 800.0,
        };
        let obs = VolumeObservation::new("SYM", 300.0, 100.0, 1.0, 2.0, now).with_recent(recent);
        let c = classifier();

        assert_eq!(c.classify_observation(&obs, false), Some(AlertLevel::new(0, "L1")));
        assert_eq!(c.classify_observation(&obs, true), None);

        // without closed-candle context the gate does not apply
        let bare = VolumeObservation::new("SYM", 300.0, 100.0, 1.0, 2.0, now);
        assert_eq!(c.classify_observation(&bare, true), Some(AlertLevel::new(0, "L1")));
    }
}
