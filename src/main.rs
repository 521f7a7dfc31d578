use std::sync::Arc;

use tracing::{error, info, warn};

use degenter_feed::FeedError;
use degenter_feed::cache::MarketCache;
use degenter_feed::config::fetch_config;
use degenter_feed::datafeed::{Datafeed, DatafeedSession, SessionSettings};
use degenter_feed::market::{ChartMode, PriceUnit};
use degenter_feed::models::{Bar, PeriodParams, TfKey, TokenContext};
use degenter_feed::rest::RestClient;

/// Chart window loaded before going live.
const HISTORY_BARS: i64 = 300;

#[tokio::main]
async fn main() -> Result<(), FeedError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;

    let denom = std::env::var("DEGENTER_TOKEN")
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FeedError::Config("DEGENTER_TOKEN is required".to_string()))?;
    let exponent = match std::env::var("DEGENTER_TOKEN_EXPONENT") {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|_| {
            FeedError::Config(format!("DEGENTER_TOKEN_EXPONENT has invalid value {raw:?}"))
        })?,
        _ => 6,
    };
    let token = TokenContext::new(denom, exponent);

    let rest = RestClient::new(&app_config.api.base_url, app_config.api.timeout)?;
    let settings = SessionSettings::from_config(&app_config, ChartMode::Price, PriceUnit::Native);
    let session = DatafeedSession::new(token.clone(), settings, rest);

    if let Some(path) = app_config.cache_path {
        let cache = MarketCache::load(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), "Ignoring unreadable market cache: {e}");
            MarketCache::default()
        });
        session.attach_cache(path, cache).await;
    }

    let mut symbol = None;
    session.resolve_symbol(
        &token.denom,
        |info| symbol = Some(info),
        |reason| error!("Symbol resolution failed: {reason}"),
    );
    let Some(symbol) = symbol else {
        return Err(FeedError::Config(format!("cannot resolve {}", token.denom)));
    };

    let tf = TfKey::M1;
    let now = chrono::Utc::now().timestamp();
    let period = PeriodParams {
        from: now - HISTORY_BARS * tf.step_secs(),
        to: now,
        count_back: HISTORY_BARS as u32,
        first_data_request: true,
    };
    session
        .get_bars(
            &symbol,
            tf.resolution(),
            period,
            |bars, meta| {
                info!(bars = bars.len(), no_data = meta.no_data, "History loaded");
                if let Some(last) = bars.last() {
                    info!(time = last.time, close = last.close, "Last historical bar");
                }
            },
            |reason| error!("History load failed: {reason}"),
        )
        .await;

    session
        .subscribe_bars(
            &symbol,
            tf.resolution(),
            Arc::new(|bar: &Bar| {
                info!(
                    time = bar.time,
                    open = bar.open,
                    high = bar.high,
                    low = bar.low,
                    close = bar.close,
                    volume = bar.volume,
                    "Live bar"
                );
            }),
            "main",
            Arc::new(|| warn!("Feed reconnected, history should be reloaded")),
        )
        .await;

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");
    session.shutdown().await;

    Ok(())
}
