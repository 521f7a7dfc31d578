//! Chart view modes and the conversion of ZIG-denominated swaps into them.

use serde::{Deserialize, Serialize};

use crate::models::ParsedSwap;

/// Whether the chart plots unit price or market capitalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChartMode {
    #[default]
    #[serde(rename = "price")]
    Price,
    #[serde(rename = "mcap")]
    MarketCap,
}

impl ChartMode {
    /// Returns the `mode` query value used by the OHLCV endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            ChartMode::Price => "price",
            ChartMode::MarketCap => "mcap",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "price" => Some(ChartMode::Price),
            "mcap" | "marketcap" => Some(ChartMode::MarketCap),
            _ => None,
        }
    }
}

/// Currency the chart is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PriceUnit {
    #[default]
    #[serde(rename = "usd")]
    Usd,
    #[serde(rename = "native")]
    Native,
}

impl PriceUnit {
    /// Returns the `unit` query value used by the OHLCV endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            PriceUnit::Usd => "usd",
            PriceUnit::Native => "native",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "usd" => Some(PriceUnit::Usd),
            "native" | "zig" => Some(PriceUnit::Native),
            _ => None,
        }
    }
}

/// Conversion factors needed to re-express a ZIG swap in the chart's view.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketContext {
    /// Last known ZIG/USD price.
    pub zig_usd: Option<f64>,
    /// Circulating supply of the subject token, in whole tokens.
    pub circulating_supply: Option<f64>,
}

impl MarketContext {
    /// Fills missing factors from `fallback`.
    #[must_use]
    pub fn or(self, fallback: MarketContext) -> Self {
        Self {
            zig_usd: usable(self.zig_usd).or(usable(fallback.zig_usd)),
            circulating_supply: usable(self.circulating_supply)
                .or(usable(fallback.circulating_supply)),
        }
    }

    /// Converts a ZIG-denominated swap into the requested mode and unit.
    ///
    /// Returns `None` when a required factor is unknown.
    pub fn scale(&self, swap: &ParsedSwap, mode: ChartMode, unit: PriceUnit) -> Option<ParsedSwap> {
        let mut scaled = *swap;

        if unit == PriceUnit::Usd {
            let zig_usd = usable(self.zig_usd)?;
            scaled.price *= zig_usd;
            scaled.volume *= zig_usd;
        }
        if mode == ChartMode::MarketCap {
            scaled.price *= usable(self.circulating_supply)?;
        }

        (scaled.price.is_finite() && scaled.price > 0.0).then_some(scaled)
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}
