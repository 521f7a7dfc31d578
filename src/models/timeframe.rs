//! Chart timeframes and their charting-library resolution strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A supported candle timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TfKey {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl TfKey {
    /// Every timeframe, shortest first.
    pub const ALL: [TfKey; 6] = [
        TfKey::M1,
        TfKey::M5,
        TfKey::M15,
        TfKey::H1,
        TfKey::H4,
        TfKey::D1,
    ];

    /// Bucket width in seconds.
    pub fn step_secs(self) -> i64 {
        match self {
            TfKey::M1 => 60,
            TfKey::M5 => 300,
            TfKey::M15 => 900,
            TfKey::H1 => 3_600,
            TfKey::H4 => 14_400,
            TfKey::D1 => 86_400,
        }
    }

    /// Bucket width in milliseconds.
    pub fn step_ms(self) -> i64 {
        self.step_secs() * 1000
    }

    /// Returns the `tf` query value understood by the OHLCV endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            TfKey::M1 => "1m",
            TfKey::M5 => "5m",
            TfKey::M15 => "15m",
            TfKey::H1 => "1h",
            TfKey::H4 => "4h",
            TfKey::D1 => "1d",
        }
    }

    /// Returns the charting-library resolution string for this timeframe.
    pub fn resolution(self) -> &'static str {
        match self {
            TfKey::M1 => "1",
            TfKey::M5 => "5",
            TfKey::M15 => "15",
            TfKey::H1 => "60",
            TfKey::H4 => "240",
            TfKey::D1 => "1D",
        }
    }

    /// Maps a charting-library resolution onto a timeframe.
    ///
    /// Unknown resolutions fall back to one hour.
    pub fn from_resolution(resolution: &str) -> Self {
        match resolution.trim() {
            "1" => TfKey::M1,
            "5" => TfKey::M5,
            "15" => TfKey::M15,
            "60" => TfKey::H1,
            "240" => TfKey::H4,
            "1D" | "D" | "1d" => TfKey::D1,
            _ => TfKey::H1,
        }
    }

    /// The resolution strings advertised to the charting library.
    pub fn supported_resolutions() -> Vec<String> {
        Self::ALL.iter().map(|tf| tf.resolution().to_string()).collect()
    }
}

impl fmt::Display for TfKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
