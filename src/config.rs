//! Application configuration loaded from environment variables.
//!
//! Every variable is optional; empty values count as unset.
//! - `DEGENTER_API_BASE` - REST API root
//! - `DEGENTER_RPC_WS_URL` - chain RPC websocket endpoint
//! - `DEGENTER_RECONNECT_DELAY_MS`, `DEGENTER_RECONNECT_MAX_DELAY_MS`,
//!   `DEGENTER_RECONNECT_MAX_ATTEMPTS` - reconnect policy
//! - `DEGENTER_MAINTENANCE_INTERVAL_SECS` - boundary-placeholder timer
//! - `DEGENTER_NOISE_MAX_RATIO`, `DEGENTER_NOISE_ZERO_VOLUME_DEVIATION` -
//!   implausible-price filter
//! - `DEGENTER_HTTP_TIMEOUT_SECS` - REST request timeout
//! - `DEGENTER_CACHE_PATH` - JSON fallback cache file

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::FeedError;
use crate::synth::NoiseFilter;
use crate::websocket::ReconnectPolicy;

/// Default REST API root.
const DEFAULT_API_BASE: &str = "https://api.degenter.io";

/// Default chain RPC websocket endpoint.
const DEFAULT_WEBSOCKET_URL: &str = "wss://rpc.zigchain.com/websocket";

const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub feed: FeedConfig,
    pub cache_path: Option<PathBuf>,
}

/// REST API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// Live feed settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub websocket_url: String,
    pub reconnect: ReconnectPolicy,
    pub maintenance_interval: Duration,
    pub noise: NoiseFilter,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`FeedError::Config`] if a numeric variable does not parse.
pub fn fetch_config() -> crate::Result<AppConfig> {
    config_from(non_empty_var)
}

/// Builds the configuration from an arbitrary variable lookup.
fn config_from(lookup: impl Fn(&str) -> Option<String>) -> crate::Result<AppConfig> {
    let base_url = lookup("DEGENTER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let websocket_url =
        lookup("DEGENTER_RPC_WS_URL").unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string());

    let delay_ms: u64 = parse_var(&lookup, "DEGENTER_RECONNECT_DELAY_MS")?
        .unwrap_or(DEFAULT_RECONNECT_DELAY_MS);
    let max_delay_ms: u64 =
        parse_var(&lookup, "DEGENTER_RECONNECT_MAX_DELAY_MS")?.unwrap_or(delay_ms);
    let max_attempts: Option<u32> = parse_var(&lookup, "DEGENTER_RECONNECT_MAX_ATTEMPTS")?;

    if max_delay_ms < delay_ms {
        return Err(FeedError::Config(format!(
            "DEGENTER_RECONNECT_MAX_DELAY_MS ({max_delay_ms}) is below \
             DEGENTER_RECONNECT_DELAY_MS ({delay_ms})"
        )));
    }

    let maintenance_secs: u64 = parse_var(&lookup, "DEGENTER_MAINTENANCE_INTERVAL_SECS")?
        .unwrap_or(DEFAULT_MAINTENANCE_INTERVAL_SECS);
    if maintenance_secs == 0 {
        return Err(FeedError::Config(
            "DEGENTER_MAINTENANCE_INTERVAL_SECS must be positive".to_string(),
        ));
    }

    let defaults = NoiseFilter::default();
    let noise = NoiseFilter {
        max_ratio: parse_var(&lookup, "DEGENTER_NOISE_MAX_RATIO")?.unwrap_or(defaults.max_ratio),
        zero_volume_max_deviation: parse_var(&lookup, "DEGENTER_NOISE_ZERO_VOLUME_DEVIATION")?
            .unwrap_or(defaults.zero_volume_max_deviation),
    };
    let ratio_ok = noise.max_ratio > 1.0;
    let deviation_ok = noise.zero_volume_max_deviation >= 0.0;
    if !(ratio_ok && deviation_ok) {
        return Err(FeedError::Config(format!(
            "invalid noise thresholds: ratio {} deviation {}",
            noise.max_ratio, noise.zero_volume_max_deviation
        )));
    }

    let timeout_secs: u64 =
        parse_var(&lookup, "DEGENTER_HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

    Ok(AppConfig {
        api: ApiConfig {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        },
        feed: FeedConfig {
            websocket_url,
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(delay_ms),
                max_delay: Duration::from_millis(max_delay_ms),
                max_attempts,
            },
            maintenance_interval: Duration::from_secs(maintenance_secs),
            noise,
        },
        cache_path: lookup("DEGENTER_CACHE_PATH").map(PathBuf::from),
    })
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> crate::Result<Option<T>> {
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| FeedError::Config(format!("{name} has invalid value {raw:?}")))
        })
        .transpose()
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
