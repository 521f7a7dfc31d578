//! Swap-derived trade prints and the token they are priced against.

use serde::{Deserialize, Serialize};

/// Base denomination of the chain's native token.
pub const NATIVE_DENOM: &str = "uzig";

/// Decimal exponent of the native token (`uzig` is micro-ZIG).
pub const NATIVE_EXPONENT: u32 = 6;

/// Side of a swap from the subject token's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

/// A single trade derived from a chain swap event.
///
/// `price` is strictly positive and `volume` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedSwap {
    pub price: f64,
    pub volume: f64,
    pub direction: Direction,
    pub timestamp_ms: i64,
}

/// Identifies the token a chart is drawn for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenContext {
    /// Key used in REST paths (symbol, denom or token id).
    pub key: String,
    /// On-chain denomination of the token.
    pub denom: String,
    /// Decimal exponent of the token's base unit.
    pub exponent: u32,
    /// Pair contract, when known; narrows the websocket query.
    pub pair_contract: Option<String>,
}

impl TokenContext {
    /// Creates a context whose REST key is the denom itself.
    #[must_use]
    pub fn new(denom: impl Into<String>, exponent: u32) -> Self {
        let denom = denom.into();
        Self {
            key: denom.clone(),
            denom,
            exponent,
            pair_contract: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn with_pair_contract(mut self, contract: impl Into<String>) -> Self {
        self.pair_contract = Some(contract.into());
        self
    }
}
