//! OHLCV candlestick bars as handed to the charting library.

use serde::{Deserialize, Serialize};

/// A single candlestick.
///
/// `time` is the bucket start in milliseconds. Every constructor keeps
/// `low <= open, close <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// A zero-volume bar with all four prices equal to `price`.
    #[must_use]
    pub fn flat(time: i64, price: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }

    /// The first bar of a bucket, opened and closed by a single trade.
    #[must_use]
    pub fn from_trade(time: i64, price: f64, volume: f64) -> Self {
        Self {
            volume,
            ..Self::flat(time, price)
        }
    }

    /// Opens a new bucket continuing from `previous_close`.
    #[must_use]
    pub fn roll(time: i64, previous_close: f64, price: f64, volume: f64) -> Self {
        Self {
            time,
            open: previous_close,
            high: previous_close.max(price),
            low: previous_close.min(price),
            close: price,
            volume,
        }
    }

    /// Folds another trade into this bar.
    pub fn extend(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
    }

    /// Returns `true` when all prices are finite and properly ordered.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.volume >= 0.0
    }

    /// Widens `high`/`low` so they enclose `open` and `close`, and clamps
    /// negative volume to zero.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.high = self.high.max(self.open).max(self.close);
        self.low = self.low.min(self.open).min(self.close);
        if self.volume < 0.0 || !self.volume.is_finite() {
            self.volume = 0.0;
        }
        self
    }
}
