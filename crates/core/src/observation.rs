//! Volume observations and the candles they are derived from.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A single OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Volume traded in the closed candles just before the current one.
///
/// A window longer than the available closed history reports `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecentVolume {
    /// Last closed candle.
    pub last_1h: f64,
    /// Last two closed candles, summed.
    pub last_2h: f64,
    /// Last four closed candles, summed.
    pub last_4h: f64,
}

/// Volume snapshot for one symbol, taken once per poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeObservation {
    pub symbol: CompactString,
    pub current_volume: f64,
    pub baseline_mean_volume: f64,
    pub open_price: f64,
    pub close_price: f64,
    pub observed_at: DateTime<Utc>,
    /// Closed-candle context, present when built from klines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent: Option<RecentVolume>,
}

impl VolumeObservation {
    pub fn new(
        symbol: impl Into<CompactString>,
        current_volume: f64,
        baseline_mean_volume: f64,
        open_price: f64,
        close_price: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            current_volume,
            baseline_mean_volume,
            open_price,
            close_price,
            observed_at,
            recent: None,
        }
    }

    pub fn with_recent(mut self, recent: RecentVolume) -> Self {
        self.recent = Some(recent);
        self
    }

    /// Build an observation from candles ordered oldest first.
    ///
    /// The newest candle is the one still forming and supplies the current
    /// volume and prices. The candle before it is the last closed one, and
    /// the `baseline_candles` candles before that form the baseline mean.
    /// Returns `None` when there are not enough candles.
    pub fn from_klines(
        symbol: impl Into<CompactString>,
        klines: &[Kline],
        baseline_candles: usize,
    ) -> Option<Self> {
        if baseline_candles == 0 || klines.len() < baseline_candles + 2 {
            return None;
        }

        let n = klines.len();
        let current = &klines[n - 1];
        let closed = &klines[..n - 1];
        let baseline = &closed[closed.len() - 1 - baseline_candles..closed.len() - 1];
        let baseline_mean =
            baseline.iter().map(|k| k.volume).sum::<f64>() / baseline_candles as f64;

        let trailing_sum = |count: usize| -> f64 {
            if closed.len() < count {
                return 0.0;
            }
            closed.iter().rev().take(count).map(|k| k.volume).sum()
        };

        let recent = RecentVolume {
            last_1h: trailing_sum(1),
            last_2h: trailing_sum(2),
            last_4h: trailing_sum(4),
        };

        Some(
            Self::new(
                symbol,
                current.volume,
                baseline_mean,
                current.open,
                current.close,
                current.open_time,
            )
            .with_recent(recent),
        )
    }

    /// Current volume over baseline, if the baseline is usable.
    pub fn ratio(&self) -> Option<f64> {
        if self.baseline_mean_volume > 0.0 && self.baseline_mean_volume.is_finite() {
            Some(self.current_volume / self.baseline_mean_volume)
        } else {
            None
        }
    }

    /// Close strictly above open.
    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close_price > self.open_price
    }
}
