//! Soft-fallback cache persisted as a JSON file.
//!
//! Holds the last values seen for the ZIG/USD price, per-token circulating
//! supply and token metadata. Values here are only consulted when live data
//! is momentarily unavailable.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market::MarketContext;

/// Cached display metadata for a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub symbol: String,
    pub name: String,
    pub exponent: u32,
}

/// Last-known market values, keyed by token denom where applicable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketCache {
    #[serde(default)]
    pub zig_usd: Option<f64>,
    #[serde(default)]
    pub circulating_supply: HashMap<String, f64>,
    #[serde(default)]
    pub tokens: HashMap<String, CachedToken>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MarketCache {
    /// Loads the cache from `path`; a missing file yields an empty cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No market cache on disk");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let cache: Self = serde_json::from_str(&contents)?;
        Ok(cache)
    }

    /// Writes the cache to `path`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn record_zig_usd(&mut self, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.zig_usd = Some(price);
            self.updated_at = Some(Utc::now());
        }
    }

    pub fn record_supply(&mut self, denom: &str, supply: f64) {
        if supply.is_finite() && supply > 0.0 {
            self.circulating_supply.insert(denom.to_string(), supply);
            self.updated_at = Some(Utc::now());
        }
    }

    pub fn record_token(&mut self, denom: &str, token: CachedToken) {
        self.tokens.insert(denom.to_string(), token);
        self.updated_at = Some(Utc::now());
    }

    pub fn token(&self, denom: &str) -> Option<&CachedToken> {
        self.tokens.get(denom)
    }

    /// Returns the cached conversion factors for `denom`.
    pub fn context_for(&self, denom: &str) -> MarketContext {
        MarketContext {
            zig_usd: self.zig_usd,
            circulating_supply: self.circulating_supply.get(denom).copied(),
        }
    }
}
