//! Live bar synthesis from swap prints.
//!
//! One [`LiveState`] is kept per timeframe. Each swap either seeds the
//! state, extends the bar of its bucket, or rolls over into a new bucket
//! that opens at the previous close. Skipped buckets are back-filled with
//! flat placeholder bars that are recorded internally but never emitted.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::bucket::align_floor_ms;
use crate::models::{Bar, ParsedSwap, TfKey};

/// Number of superseded bars retained per timeframe.
///
/// Gap filling never materializes more placeholders than this, so a long
/// outage on a short timeframe costs a bounded amount of work.
pub const TRAIL_CAPACITY: usize = 64;

/// Thresholds for discarding implausible price jumps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseFilter {
    /// Largest accepted `max(price/close, close/price)` for a swap with volume.
    pub max_ratio: f64,
    /// Largest accepted relative deviation for a zero-volume swap.
    pub zero_volume_max_deviation: f64,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self {
            max_ratio: 8.0,
            zero_volume_max_deviation: 0.05,
        }
    }
}

impl NoiseFilter {
    /// Returns `true` if `price` is too far from `last_close` to be trusted.
    pub fn is_noise(&self, last_close: f64, price: f64, volume: f64) -> bool {
        if !(last_close.is_finite() && last_close > 0.0) {
            return false;
        }
        if volume > 0.0 {
            let ratio = (price / last_close).max(last_close / price);
            ratio > self.max_ratio
        } else {
            (price - last_close).abs() / last_close > self.zero_volume_max_deviation
        }
    }
}

/// Live bookkeeping for one timeframe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveState {
    /// Bar of the most recent bucket, real or placeholder.
    pub last_bar: Option<Bar>,
    /// Bucket start of `last_bar`, in milliseconds.
    pub last_timestamp: Option<i64>,
    pub last_close: Option<f64>,
    trail: VecDeque<Bar>,
}

impl LiveState {
    /// Makes `bar` the current bar, retiring the previous one to the trail.
    fn advance_to(&mut self, bar: Bar) {
        if let Some(previous) = self.last_bar.replace(bar) {
            if self.trail.len() == TRAIL_CAPACITY {
                self.trail.pop_front();
            }
            self.trail.push_back(previous);
        }
        self.last_timestamp = Some(bar.time);
        self.last_close = Some(bar.close);
    }

    /// Appends flat bars at `close` for every bucket in `(last, until]`.
    ///
    /// Returns how many placeholders were created.
    fn fill_through(&mut self, until: i64, step_ms: i64, close: f64) -> usize {
        let Some(last) = self.last_timestamp else {
            return 0;
        };
        let cap = step_ms * TRAIL_CAPACITY as i64;
        let mut bucket = (last + step_ms).max(until - cap);
        let mut created = 0;
        while bucket <= until {
            self.advance_to(Bar::flat(bucket, close));
            bucket += step_ms;
            created += 1;
        }
        created
    }

    /// Bars superseded by later buckets, oldest first.
    pub fn trail(&self) -> impl Iterator<Item = &Bar> {
        self.trail.iter()
    }

    pub fn is_seeded(&self) -> bool {
        self.last_bar.is_some()
    }
}

/// Per-timeframe live bar state machine.
#[derive(Debug, Default)]
pub struct BarSynthesizer {
    filter: NoiseFilter,
    states: HashMap<TfKey, LiveState>,
}

impl BarSynthesizer {
    #[must_use]
    pub fn new(filter: NoiseFilter) -> Self {
        Self {
            filter,
            states: HashMap::new(),
        }
    }

    pub fn state(&self, tf: TfKey) -> Option<&LiveState> {
        self.states.get(&tf)
    }

    /// Drops all live state for `tf`.
    pub fn forget(&mut self, tf: TfKey) {
        self.states.remove(&tf);
    }

    /// Re-seeds `tf` from freshly loaded history.
    ///
    /// The anchor is the most recent bar whose bucket is not after the
    /// bucket containing `now_ms`. When the anchor is older than that
    /// bucket, a placeholder is opened for the current bucket so the next
    /// live trade extends a bar that opens at the anchor's close. Returns
    /// the anchor, or `None` (leaving `tf` unseeded) if history is empty.
    pub fn seed(&mut self, tf: TfKey, history: &[Bar], now_ms: i64) -> Option<Bar> {
        let step = tf.step_secs();
        let now_bucket = align_floor_ms(now_ms, step);

        let anchor = history
            .iter()
            .map(|bar| Bar {
                time: align_floor_ms(bar.time, step),
                ..*bar
            })
            .filter(|bar| bar.time <= now_bucket)
            .max_by_key(|bar| bar.time);

        let Some(anchor) = anchor else {
            self.states.remove(&tf);
            return None;
        };

        let mut state = LiveState::default();
        state.advance_to(anchor);
        if anchor.time < now_bucket {
            state.advance_to(Bar::flat(now_bucket, anchor.close));
        }
        self.states.insert(tf, state);

        debug!(%tf, anchor_time = anchor.time, close = anchor.close, "Seeded live state");
        Some(anchor)
    }

    /// Applies a swap to every timeframe in `timeframes`.
    ///
    /// Returns the bars that should be pushed to subscribers.
    pub fn apply(&mut self, swap: &ParsedSwap, timeframes: &[TfKey]) -> Vec<(TfKey, Bar)> {
        if !(swap.price.is_finite() && swap.price > 0.0) {
            return Vec::new();
        }
        timeframes
            .iter()
            .filter_map(|&tf| self.apply_one(tf, swap).map(|bar| (tf, bar)))
            .collect()
    }

    fn apply_one(&mut self, tf: TfKey, swap: &ParsedSwap) -> Option<Bar> {
        let step_ms = tf.step_ms();
        let target = align_floor_ms(swap.timestamp_ms, tf.step_secs());
        let volume = swap.volume.max(0.0);
        let state = self.states.entry(tf).or_default();

        let (Some(last), Some(last_close)) = (state.last_bar, state.last_close) else {
            let bar = Bar::from_trade(target, swap.price, volume);
            state.advance_to(bar);
            return Some(bar);
        };

        if self.filter.is_noise(last_close, swap.price, volume) {
            debug!(%tf, price = swap.price, last_close, volume, "Rejected implausible swap price");
            return None;
        }

        if target < last.time {
            debug!(%tf, target, last = last.time, "Dropping swap older than the live bar");
            return None;
        }

        if target == last.time {
            let bar = state.last_bar.as_mut()?;
            bar.extend(swap.price, volume);
            let bar = *bar;
            state.last_close = Some(bar.close);
            return Some(bar);
        }

        state.fill_through(target - step_ms, step_ms, last_close);
        let bar = Bar::roll(target, last_close, swap.price, volume);
        state.advance_to(bar);
        Some(bar)
    }

    /// Opens internal placeholders for buckets that wall-clock time has
    /// entered without any trade.
    ///
    /// Nothing is emitted. Returns the number of placeholders created.
    pub fn maintain(&mut self, now_ms: i64, timeframes: &[TfKey]) -> usize {
        let mut created = 0;
        for &tf in timeframes {
            let Some(state) = self.states.get_mut(&tf) else {
                continue;
            };
            let (Some(last), Some(close)) = (state.last_timestamp, state.last_close) else {
                continue;
            };
            let now_bucket = align_floor_ms(now_ms, tf.step_secs());
            if now_bucket > last {
                created += state.fill_through(now_bucket, tf.step_ms(), close);
            }
        }
        if created > 0 {
            debug!(created, "Opened boundary placeholders");
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    fn swap(ts_secs: i64, price: f64, volume: f64) -> ParsedSwap {
        ParsedSwap {
            price,
            volume,
            direction: Direction::Buy,
            timestamp_ms: ts_secs * 1000,
        }
    }

    #[test]
    fn first_swap_seeds_flat_bar() {
        let mut synth = BarSynthesizer::default();
        let out = synth.apply(&swap(125, 3.0, 1.0), &[TfKey::M1]);
        assert_eq!(out, vec![(TfKey::M1, Bar::from_trade(120_000, 3.0, 1.0))]);
        assert_eq!(synth.state(TfKey::M1).unwrap().last_close, Some(3.0));
    }

    #[test]
    fn same_bucket_extends() {
        let mut synth = BarSynthesizer::default();
        synth.apply(&swap(120, 3.0, 1.0), &[TfKey::M1]);
        let out = synth.apply(&swap(150, 3.3, 0.5), &[TfKey::M1]);
        let bar = out[0].1;
        assert_eq!(bar.time, 120_000);
        assert_eq!(bar.open, 3.0);
        assert_eq!(bar.high, 3.3);
        assert_eq!(bar.close, 3.3);
        assert_eq!(bar.volume, 1.5);
    }

    #[test]
    fn each_timeframe_is_independent() {
        let mut synth = BarSynthesizer::default();
        synth.apply(&swap(0, 1.0, 1.0), &[TfKey::M1, TfKey::M5]);
        let out = synth.apply(&swap(90, 1.2, 1.0), &[TfKey::M1, TfKey::M5]);
        assert_eq!(out.len(), 2);
        let m1 = out.iter().find(|(tf, _)| *tf == TfKey::M1).unwrap().1;
        let m5 = out.iter().find(|(tf, _)| *tf == TfKey::M5).unwrap().1;
        assert_eq!(m1.time, 60_000);
        assert_eq!(m1.open, 1.0);
        assert_eq!(m5.time, 0);
        assert_eq!(m5.volume, 2.0);
    }

    #[test]
    fn noise_rejection_leaves_state_untouched() {
        let mut synth = BarSynthesizer::default();
        synth.apply(&swap(0, 1.0, 1.0), &[TfKey::M1]);
        let before = synth.state(TfKey::M1).cloned();

        assert!(synth.apply(&swap(30, 9.0, 1.0), &[TfKey::M1]).is_empty());
        assert!(synth.apply(&swap(200, 0.1, 1.0), &[TfKey::M1]).is_empty());
        assert!(synth.apply(&swap(30, 1.06, 0.0), &[TfKey::M1]).is_empty());
        assert_eq!(synth.state(TfKey::M1).cloned(), before);

        // Within bounds
        assert_eq!(synth.apply(&swap(30, 7.9, 1.0), &[TfKey::M1]).len(), 1);
    }

    #[test]
    fn late_swap_is_dropped() {
        let mut synth = BarSynthesizer::default();
        synth.apply(&swap(120, 1.0, 1.0), &[TfKey::M1]);
        assert!(synth.apply(&swap(60, 1.1, 1.0), &[TfKey::M1]).is_empty());
    }

    #[test]
    fn gap_fill_is_capped() {
        let mut synth = BarSynthesizer::default();
        synth.apply(&swap(0, 1.0, 1.0), &[TfKey::M1]);
        synth.apply(&swap(60 * 10_000, 1.0, 1.0), &[TfKey::M1]);
        let state = synth.state(TfKey::M1).unwrap();
        assert_eq!(state.trail().count(), TRAIL_CAPACITY);
        assert_eq!(state.last_timestamp, Some(600_000_000));
    }

    #[test]
    fn seeding_with_empty_history_resets() {
        let mut synth = BarSynthesizer::default();
        synth.apply(&swap(0, 1.0, 1.0), &[TfKey::M1]);
        assert!(synth.seed(TfKey::M1, &[], 60_000).is_none());
        assert!(synth.state(TfKey::M1).is_none());
    }

    #[test]
    fn seeding_ignores_future_bars() {
        let mut synth = BarSynthesizer::default();
        let history = [Bar::flat(60_000, 2.0), Bar::flat(600_000, 9.0)];
        let anchor = synth.seed(TfKey::M1, &history, 90_000).unwrap();
        assert_eq!(anchor.close, 2.0);
        let state = synth.state(TfKey::M1).unwrap();
        assert_eq!(state.last_timestamp, Some(60_000));
    }

    #[test]
    fn noise_filter_thresholds_are_configurable() {
        let filter = NoiseFilter {
            max_ratio: 2.0,
            zero_volume_max_deviation: 0.5,
        };
        assert!(filter.is_noise(1.0, 2.5, 1.0));
        assert!(!filter.is_noise(1.0, 1.4, 0.0));
        assert!(!filter.is_noise(0.0, 100.0, 1.0));
    }
}
