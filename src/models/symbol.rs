//! Records exchanged with the charting library's datafeed contract.

use serde::{Deserialize, Serialize};

use super::timeframe::TfKey;
use crate::market::{ChartMode, PriceUnit};

/// Capabilities reported from `on_ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatafeedConfiguration {
    pub supported_resolutions: Vec<String>,
    pub supports_marks: bool,
    pub supports_timescale_marks: bool,
    pub supports_time: bool,
    pub symbols_types: Vec<SymbolType>,
}

impl Default for DatafeedConfiguration {
    fn default() -> Self {
        Self {
            supported_resolutions: TfKey::supported_resolutions(),
            supports_marks: false,
            supports_timescale_marks: false,
            supports_time: true,
            symbols_types: vec![SymbolType {
                name: "crypto".to_string(),
                value: "crypto".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolType {
    pub name: String,
    pub value: String,
}

/// Symbol metadata handed back from `resolve_symbol`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySymbolInfo {
    pub name: String,
    pub ticker: String,
    pub description: String,
    #[serde(rename = "type")]
    pub tpe: String,
    pub session: String,
    pub timezone: String,
    pub exchange: String,
    pub listed_exchange: String,
    pub format: String,
    pub minmov: u32,
    pub pricescale: u64,
    pub has_intraday: bool,
    pub has_daily: bool,
    pub visible_plots_set: String,
    pub supported_resolutions: Vec<String>,
    pub volume_precision: u32,
    pub data_status: String,
    pub currency_code: String,
}

impl LibrarySymbolInfo {
    /// Synthesizes symbol metadata for `name` without consulting the API.
    pub fn synthesize(name: &str, mode: ChartMode, unit: PriceUnit) -> Self {
        let currency_code = match unit {
            PriceUnit::Usd => "USD",
            PriceUnit::Native => "ZIG",
        };
        // Market caps are large; token prices are often many decimals deep.
        let pricescale = match mode {
            ChartMode::Price => 100_000_000,
            ChartMode::MarketCap => 100,
        };

        Self {
            name: name.to_string(),
            ticker: name.to_string(),
            description: describe(name, mode, currency_code),
            tpe: "crypto".to_string(),
            session: "24x7".to_string(),
            timezone: "Etc/UTC".to_string(),
            exchange: "Degenter".to_string(),
            listed_exchange: "Degenter".to_string(),
            format: "price".to_string(),
            minmov: 1,
            pricescale,
            has_intraday: true,
            has_daily: true,
            visible_plots_set: "ohlcv".to_string(),
            supported_resolutions: TfKey::supported_resolutions(),
            volume_precision: 2,
            data_status: "streaming".to_string(),
            currency_code: currency_code.to_string(),
        }
    }

    /// Shows the token under its display `symbol` and `display_name`,
    /// keeping the ticker used to resolve it.
    #[must_use]
    pub fn with_display(mut self, symbol: &str, display_name: &str, mode: ChartMode) -> Self {
        self.name = symbol.to_string();
        self.description = describe(display_name, mode, &self.currency_code);
        self
    }
}

fn describe(name: &str, mode: ChartMode, currency_code: &str) -> String {
    match mode {
        ChartMode::Price => format!("{name} / {currency_code}"),
        ChartMode::MarketCap => format!("{name} MCAP / {currency_code}"),
    }
}

/// Window requested by `get_bars`, in Unix seconds (`to` exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodParams {
    pub from: i64,
    pub to: i64,
    pub count_back: u32,
    pub first_data_request: bool,
}

/// Metadata accompanying a `get_bars` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryMetadata {
    pub no_data: bool,
}

/// One row of a `search_symbols` answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSymbolResult {
    pub symbol: String,
    pub full_name: String,
    pub description: String,
    pub exchange: String,
    pub ticker: String,
    #[serde(rename = "type")]
    pub tpe: String,
}
