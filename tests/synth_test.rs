//! Behavioural tests for live bar synthesis across seeding, gaps and noise.

mod common;

use common::{bar, close_bar, swap_at};
use degenter_feed::models::{Bar, TfKey};
use degenter_feed::synth::{BarSynthesizer, NoiseFilter, TRAIL_CAPACITY};

#[test]
fn test_swap_after_history_extends_current_bucket() {
    let mut synth = BarSynthesizer::default();
    let history = [close_bar(1000, 10.0), close_bar(1060, 12.0)];
    synth.seed(TfKey::M1, &history, 1_125_000);

    let out = synth.apply(&swap_at(1125, 15.0, 2.0), &[TfKey::M1]);

    assert_eq!(out, vec![(TfKey::M1, bar(1080, 12.0, 15.0, 12.0, 15.0, 2.0))]);
}

#[test]
fn test_quiet_boundaries_create_silent_placeholders() {
    let mut synth = BarSynthesizer::default();
    let first = synth.apply(&swap_at(1090, 12.0, 1.0), &[TfKey::M1]);
    assert_eq!(first.len(), 1);

    assert_eq!(synth.maintain(1_150_000, &[TfKey::M1]), 1);
    assert_eq!(synth.maintain(1_210_000, &[TfKey::M1]), 1);
    assert_eq!(synth.maintain(1_250_000, &[TfKey::M1]), 0);

    let state = synth.state(TfKey::M1).unwrap();
    assert_eq!(state.last_bar, Some(close_bar(1200, 12.0)));
    assert_eq!(state.last_close, Some(12.0));
    let trail: Vec<i64> = state.trail().map(|b| b.time).collect();
    assert_eq!(trail, vec![1_080_000, 1_140_000]);
}

#[test]
fn test_first_live_bar_opens_at_history_close() {
    let mut synth = BarSynthesizer::default();
    let history = [close_bar(600, 4.0), close_bar(660, 5.0)];
    let anchor = synth.seed(TfKey::M1, &history, 700_000).unwrap();
    assert_eq!(anchor.time, 660_000);

    // Next bucket after the anchor, seeded while still inside the anchor bucket.
    let out = synth.apply(&swap_at(725, 5.5, 1.0), &[TfKey::M1]);
    assert_eq!(out, vec![(TfKey::M1, bar(720, 5.0, 5.5, 5.0, 5.5, 1.0))]);
}

#[test]
fn test_seed_ignores_bars_after_now() {
    let mut synth = BarSynthesizer::default();
    let history = [close_bar(600, 4.0), close_bar(900, 9.0)];
    let anchor = synth.seed(TfKey::M1, &history, 700_000).unwrap();
    assert_eq!(anchor.close, 4.0);

    // The current bucket gets a placeholder at the anchor's close.
    let state = synth.state(TfKey::M1).unwrap();
    assert_eq!(state.last_bar, Some(close_bar(660, 4.0)));
}

#[test]
fn test_empty_history_leaves_timeframe_unseeded() {
    let mut synth = BarSynthesizer::default();
    synth.apply(&swap_at(60, 1.0, 1.0), &[TfKey::M1]);
    assert!(synth.seed(TfKey::M1, &[], 120_000).is_none());
    assert!(synth.state(TfKey::M1).is_none());
}

#[test]
fn test_gap_fill_is_deterministic() {
    let swaps = [
        swap_at(30, 1.0, 1.0),
        swap_at(400, 1.2, 0.5),
        swap_at(410, 1.19, 0.0),
        swap_at(1000, 1.3, 2.0),
    ];

    let run = || {
        let mut synth = BarSynthesizer::default();
        let emitted: Vec<(TfKey, Bar)> = swaps
            .iter()
            .flat_map(|s| synth.apply(s, &[TfKey::M1, TfKey::M5]))
            .collect();
        let trail: Vec<Bar> = synth.state(TfKey::M1).unwrap().trail().copied().collect();
        (emitted, trail)
    };

    let (emitted, trail) = run();
    assert_eq!((emitted.clone(), trail.clone()), run());

    // Buckets 60..=300 on 1m are back-filled flat at the close of bucket 0.
    let placeholders: Vec<&Bar> = trail
        .iter()
        .filter(|b| b.time > 0 && b.time < 360_000)
        .collect();
    assert_eq!(placeholders.len(), 5);
    assert!(placeholders.iter().all(|b| *b == &Bar::flat(b.time, 1.0)));
    assert!(emitted.iter().all(|(_, b)| b.volume >= 0.0));
}

#[test]
fn test_long_outage_fill_is_bounded() {
    let mut synth = BarSynthesizer::default();
    synth.apply(&swap_at(0, 1.0, 1.0), &[TfKey::M1]);
    let out = synth.apply(&swap_at(86_400 * 30, 1.5, 1.0), &[TfKey::M1]);

    assert_eq!(out[0].1.open, 1.0);
    let state = synth.state(TfKey::M1).unwrap();
    assert!(state.trail().count() <= TRAIL_CAPACITY);
}

#[test]
fn test_implausible_prices_are_rejected() {
    let mut synth = BarSynthesizer::default();
    synth.apply(&swap_at(0, 10.0, 1.0), &[TfKey::M1]);

    assert!(synth.apply(&swap_at(10, 100.0, 1.0), &[TfKey::M1]).is_empty());
    assert!(synth.apply(&swap_at(10, 1.0, 1.0), &[TfKey::M1]).is_empty());
    // Zero-volume prints may only move the price slightly.
    assert!(synth.apply(&swap_at(10, 10.6, 0.0), &[TfKey::M1]).is_empty());
    assert_eq!(synth.apply(&swap_at(10, 10.4, 0.0), &[TfKey::M1]).len(), 1);
    assert_eq!(synth.apply(&swap_at(20, 70.0, 1.0), &[TfKey::M1]).len(), 1);

    let state = synth.state(TfKey::M1).unwrap();
    assert_eq!(state.last_close, Some(70.0));
}

#[test]
fn test_noise_thresholds_are_configurable() {
    let mut synth = BarSynthesizer::new(NoiseFilter {
        max_ratio: 2.0,
        zero_volume_max_deviation: 0.5,
    });
    synth.apply(&swap_at(0, 10.0, 1.0), &[TfKey::M1]);

    assert!(synth.apply(&swap_at(5, 25.0, 1.0), &[TfKey::M1]).is_empty());
    assert_eq!(synth.apply(&swap_at(5, 14.0, 0.0), &[TfKey::M1]).len(), 1);
}

#[test]
fn test_late_swap_is_dropped() {
    let mut synth = BarSynthesizer::default();
    synth.apply(&swap_at(130, 2.0, 1.0), &[TfKey::M1]);
    assert!(synth.apply(&swap_at(50, 2.1, 1.0), &[TfKey::M1]).is_empty());
    assert_eq!(synth.state(TfKey::M1).unwrap().last_bar, Some(bar(120, 2.0, 2.0, 2.0, 2.0, 1.0)));
}

#[test]
fn test_emitted_bars_stay_consistent() {
    let mut synth = BarSynthesizer::default();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    let mut price = 1.0_f64;
    let mut time = 0_i64;
    for _ in 0..2_000 {
        let r = next();
        time += (r % 200) as i64;
        price *= 0.75 + (r >> 32) as f64 / u32::MAX as f64 * 0.5;
        let volume = if r % 5 == 0 { 0.0 } else { (r % 1000) as f64 / 10.0 };

        for (_, bar) in synth.apply(&swap_at(time, price, volume), &TfKey::ALL) {
            assert!(bar.is_consistent(), "inconsistent bar {bar:?}");
        }
        synth.maintain(time * 1000 + 30_000, &TfKey::ALL);
    }

    for tf in TfKey::ALL {
        let state = synth.state(tf).unwrap();
        assert!(state.trail().all(Bar::is_consistent));
        let times: Vec<i64> = state.trail().map(|b| b.time).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }
}
