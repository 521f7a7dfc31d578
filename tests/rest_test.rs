//! Parsing tests for REST OHLCV payloads.

use serde_json::Value;

use degenter_feed::models::Bar;
use degenter_feed::rest::bars_from_records;

const OHLCV_JSON: &str = include_str!("fixtures/ohlcv.json");

/// 2024-03-01T00:00:00Z in milliseconds.
const MARCH_1_MS: i64 = 1_709_251_200_000;

fn records() -> Vec<Value> {
    let body: Value = serde_json::from_str(OHLCV_JSON).expect("Failed to parse OHLCV fixture");
    body["data"].as_array().cloned().expect("data array")
}

#[test]
fn test_ohlcv_records_are_sorted_and_deduplicated() {
    let bars = bars_from_records(&records());

    let times: Vec<i64> = bars.iter().map(|b| b.time).collect();
    assert_eq!(times, vec![MARCH_1_MS, MARCH_1_MS + 60_000, MARCH_1_MS + 120_000]);

    // The later record for a duplicated timestamp wins.
    assert_eq!(
        bars[2],
        Bar {
            time: MARCH_1_MS + 120_000,
            open: 0.0125,
            high: 0.0131,
            low: 0.012,
            close: 0.0129,
            volume: 1600.0,
        }
    );
}

#[test]
fn test_ohlcv_rows_with_bad_prices_are_skipped() {
    let bars = bars_from_records(&records());
    assert!(bars.iter().all(|b| b.time != MARCH_1_MS + 180_000));
    assert!(bars.iter().all(Bar::is_consistent));
}

#[test]
fn test_numeric_strings_and_numbers_both_parse() {
    let bars = bars_from_records(&records());
    assert_eq!(bars[0].open, 0.012);
    assert_eq!(bars[0].volume, 800.0);
    assert_eq!(bars[1].volume, 0.0);
}
