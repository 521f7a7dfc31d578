//! Per-chart datafeed session.
//!
//! A [`DatafeedSession`] owns everything one chart instance needs: the
//! subscription registry, the bar synthesizer, the market conversion
//! factors and, while anyone is subscribed, the live websocket feed.
//!
//! All state sits behind one async mutex. History seeding in `get_bars`
//! and live updates from the feed pump both take that lock for the whole
//! of their mutation, so the two never interleave.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{BarCallback, Datafeed, ResetCallback};
use crate::bucket::{align_floor, now_ms};
use crate::cache::{CachedToken, MarketCache};
use crate::config::AppConfig;
use crate::market::{ChartMode, MarketContext, PriceUnit};
use crate::models::{
    Bar, DatafeedConfiguration, HistoryMetadata, LibrarySymbolInfo, ParsedSwap, PeriodParams,
    SearchSymbolResult, TfKey, TokenContext,
};
use crate::rest::{BarSource, fetch_bars};
use crate::synth::{BarSynthesizer, LiveState, NoiseFilter};
use crate::websocket::{ConnectionCommand, ConnectionManager, FeedMessage, ReconnectPolicy};

/// Websocket feed parameters. Without them a session serves history only
/// and live updates must be pushed through [`DatafeedSession::ingest`].
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFeedSettings {
    pub websocket_url: String,
    pub reconnect: ReconnectPolicy,
    /// Period of the boundary-placeholder timer.
    pub maintenance_interval: Duration,
}

/// How a session presents and filters data.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub mode: ChartMode,
    pub unit: PriceUnit,
    pub noise: NoiseFilter,
    pub live: Option<LiveFeedSettings>,
}

impl SessionSettings {
    /// Offline settings: no websocket, default noise filter.
    #[must_use]
    pub fn offline(mode: ChartMode, unit: PriceUnit) -> Self {
        Self {
            mode,
            unit,
            noise: NoiseFilter::default(),
            live: None,
        }
    }

    /// Settings backed by the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig, mode: ChartMode, unit: PriceUnit) -> Self {
        Self {
            mode,
            unit,
            noise: config.feed.noise,
            live: Some(LiveFeedSettings {
                websocket_url: config.feed.websocket_url.clone(),
                reconnect: config.feed.reconnect,
                maintenance_interval: config.feed.maintenance_interval,
            }),
        }
    }
}

struct Subscription {
    timeframe: TfKey,
    on_tick: BarCallback,
    on_reset: ResetCallback,
}

struct SessionState {
    mode: ChartMode,
    unit: PriceUnit,
    subscriptions: HashMap<String, Subscription>,
    synth: BarSynthesizer,
    market: MarketContext,
    fallback: MarketContext,
    /// Bumped by every first history request; older requests still in
    /// flight compare against it and drop their results.
    history_epoch: u64,
    /// Set after a disconnect; the next connect asks charts to reload.
    awaiting_reset: bool,
}

impl SessionState {
    fn active_timeframes(&self) -> Vec<TfKey> {
        self.subscriptions
            .values()
            .map(|s| s.timeframe)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn apply_swap(&mut self, swap: &ParsedSwap) -> usize {
        let context = self.market.or(self.fallback);
        let Some(scaled) = context.scale(swap, self.mode, self.unit) else {
            debug!(
                mode = self.mode.as_str(),
                unit = self.unit.as_str(),
                "Dropping swap: conversion factor unavailable"
            );
            return 0;
        };

        let timeframes = self.active_timeframes();
        let emitted = self.synth.apply(&scaled, &timeframes);

        let mut delivered = 0;
        for (tf, bar) in &emitted {
            for sub in self.subscriptions.values().filter(|s| s.timeframe == *tf) {
                (sub.on_tick)(bar);
                delivered += 1;
            }
        }
        delivered
    }

    fn maintain(&mut self, now_ms: i64) -> usize {
        let timeframes = self.active_timeframes();
        self.synth.maintain(now_ms, &timeframes)
    }

    fn handle_feed(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Swap(swap) => {
                self.apply_swap(&swap);
            }
            FeedMessage::Connected => {
                if self.awaiting_reset {
                    self.awaiting_reset = false;
                    info!(
                        subscriptions = self.subscriptions.len(),
                        "Feed reconnected, requesting chart reload"
                    );
                    for sub in self.subscriptions.values() {
                        (sub.on_reset)();
                    }
                }
            }
            FeedMessage::Disconnected => {
                self.awaiting_reset = true;
            }
            FeedMessage::GaveUp => {
                warn!("Live feed gave up reconnecting; the next subscription restarts it");
            }
        }
    }

    fn next_epoch(&mut self) -> u64 {
        self.history_epoch += 1;
        self.history_epoch
    }
}

/// The on-disk fallback cache and where it lives.
struct CacheFile {
    path: PathBuf,
    data: MarketCache,
}

struct LiveHandle {
    cmd_tx: mpsc::UnboundedSender<ConnectionCommand>,
    connection: JoinHandle<()>,
    pump: JoinHandle<()>,
}

/// Datafeed state for one chart instance.
pub struct DatafeedSession<S: BarSource> {
    token: TokenContext,
    settings: SessionSettings,
    source: S,
    shared: Arc<Mutex<SessionState>>,
    live: Mutex<Option<LiveHandle>>,
    cache: std::sync::Mutex<Option<CacheFile>>,
    clock: fn() -> i64,
}

impl<S: BarSource> DatafeedSession<S> {
    /// Creates a session for `token`, loading history from `source`.
    pub fn new(token: TokenContext, settings: SessionSettings, source: S) -> Self {
        let state = SessionState {
            mode: settings.mode,
            unit: settings.unit,
            subscriptions: HashMap::new(),
            synth: BarSynthesizer::new(settings.noise),
            market: MarketContext::default(),
            fallback: MarketContext::default(),
            history_epoch: 0,
            awaiting_reset: false,
        };

        Self {
            token,
            settings,
            source,
            shared: Arc::new(Mutex::new(state)),
            live: Mutex::new(None),
            cache: std::sync::Mutex::new(None),
            clock: now_ms,
        }
    }

    /// Replaces the wall clock (milliseconds since the epoch).
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn token(&self) -> &TokenContext {
        &self.token
    }

    /// The history source backing this session.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Backs the session with a persistent fallback cache.
    ///
    /// The cached factors for this token become the fallback context, and
    /// later market updates and token metadata are written back to `path`.
    pub async fn attach_cache(&self, path: PathBuf, cache: MarketCache) {
        let fallback = cache.context_for(&self.token.denom);
        self.shared.lock().await.fallback = fallback;
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CacheFile {
            path,
            data: cache,
        });
    }

    /// Updates the live conversion factors.
    ///
    /// Known values also refresh the fallback context and, when a cache is
    /// attached, are persisted as the last-known market values.
    pub async fn set_market_context(&self, context: MarketContext) {
        {
            let mut state = self.shared.lock().await;
            state.market = context;
            state.fallback = context.or(state.fallback);
        }

        let denom = &self.token.denom;
        self.update_cache(|cache| {
            if let Some(price) = context.zig_usd {
                cache.record_zig_usd(price);
            }
            if let Some(supply) = context.circulating_supply {
                cache.record_supply(denom, supply);
            }
        });
    }

    /// Cached display metadata for this session's token, if any.
    pub fn cached_token(&self) -> Option<CachedToken> {
        let guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .and_then(|file| file.data.token(&self.token.denom).cloned())
    }

    /// Sets the factors used when live ones are missing.
    pub async fn set_fallback_context(&self, context: MarketContext) {
        self.shared.lock().await.fallback = context;
    }

    /// Feeds a live-feed message into the session, exactly as the pump does.
    pub async fn ingest(&self, message: FeedMessage) {
        self.shared.lock().await.handle_feed(message);
    }

    /// Runs one boundary-placeholder pass at the session clock's "now".
    pub async fn run_maintenance(&self) -> usize {
        let now = (self.clock)();
        self.shared.lock().await.maintain(now)
    }

    /// Snapshot of the live state for `tf`.
    pub async fn live_state(&self, tf: TfKey) -> Option<LiveState> {
        self.shared.lock().await.synth.state(tf).cloned()
    }

    pub async fn subscription_count(&self) -> usize {
        self.shared.lock().await.subscriptions.len()
    }

    /// Returns `true` while the websocket feed is running.
    pub async fn is_streaming(&self) -> bool {
        self.live
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.connection.is_finished())
    }

    /// Tears down the feed and drops every subscription.
    pub async fn shutdown(&self) {
        let mut live = self.live.lock().await;
        self.shared.lock().await.subscriptions.clear();
        stop_live(&mut live).await;
    }

    /// Applies `update` to the attached cache and saves it.
    fn update_cache(&self, update: impl FnOnce(&mut MarketCache)) {
        let mut guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(file) = guard.as_mut() else {
            return;
        };
        update(&mut file.data);
        if let Err(e) = file.data.save(&file.path) {
            warn!(path = %file.path.display(), "Failed to persist market cache: {e}");
        }
    }

    /// Starts the websocket feed and pump if configured and not running.
    ///
    /// A feed whose connection task has ended (reconnect policy exhausted)
    /// is reaped and started again.
    async fn ensure_live(&self, live: &mut Option<LiveHandle>) {
        match live.as_ref().map(|handle| handle.connection.is_finished()) {
            Some(false) => return,
            Some(true) => {
                info!(token = %self.token.denom, "Restarting stopped live feed");
                stop_live(live).await;
            }
            None => {}
        }
        let Some(settings) = &self.settings.live else {
            return;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(
            settings.websocket_url.clone(),
            self.token.clone(),
            settings.reconnect,
            tx,
            cmd_rx,
        );

        let connection = tokio::spawn(manager.run());
        let pump = tokio::spawn(pump(
            Arc::clone(&self.shared),
            rx,
            settings.maintenance_interval,
            self.clock,
        ));

        info!(token = %self.token.denom, "Live feed started");
        *live = Some(LiveHandle {
            cmd_tx,
            connection,
            pump,
        });
    }
}

/// Stops the feed, if running, and waits for its tasks to finish.
async fn stop_live(live: &mut Option<LiveHandle>) {
    let Some(handle) = live.take() else {
        return;
    };
    let _ = handle.cmd_tx.send(ConnectionCommand::Shutdown);
    if let Err(e) = handle.connection.await {
        warn!("Connection task ended abnormally: {e}");
    }
    // The pump exits once the connection drops its sender.
    if let Err(e) = handle.pump.await {
        warn!("Pump task ended abnormally: {e}");
    }
    info!("Live feed stopped");
}

/// Single writer for live updates: applies feed messages and runs the
/// boundary-placeholder timer.
async fn pump(
    shared: Arc<Mutex<SessionState>>,
    mut rx: mpsc::UnboundedReceiver<FeedMessage>,
    interval: Duration,
    clock: fn() -> i64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(msg) => shared.lock().await.handle_feed(msg),
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let now = clock();
                shared.lock().await.maintain(now);
            }
        }
    }
}

impl<S: BarSource> Datafeed for DatafeedSession<S> {
    async fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(DatafeedConfiguration) + Send,
    {
        tokio::task::yield_now().await;
        callback(DatafeedConfiguration::default());
    }

    async fn search_symbols<F>(
        &self,
        user_input: &str,
        _exchange: &str,
        _symbol_type: &str,
        on_result: F,
    ) where
        F: FnOnce(Vec<SearchSymbolResult>) + Send,
    {
        let query = user_input.trim();
        if query.is_empty() {
            on_result(Vec::new());
            return;
        }

        let hits = match self.source.search_tokens(query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(query, "Token search failed: {e}");
                Vec::new()
            }
        };

        if let Some(own) = hits.iter().find(|hit| hit.denom == self.token.denom) {
            let token = CachedToken {
                symbol: own.symbol.clone(),
                name: own.name.clone(),
                exponent: self.token.exponent,
            };
            let denom = &self.token.denom;
            self.update_cache(|cache| cache.record_token(denom, token));
        }

        on_result(
            hits.into_iter()
                .map(|hit| SearchSymbolResult {
                    full_name: format!("Degenter:{}", hit.symbol),
                    symbol: hit.symbol,
                    description: hit.name,
                    exchange: "Degenter".to_string(),
                    ticker: hit.denom,
                    tpe: "crypto".to_string(),
                })
                .collect(),
        );
    }

    fn resolve_symbol<R, E>(&self, symbol_name: &str, on_resolve: R, on_error: E)
    where
        R: FnOnce(LibrarySymbolInfo),
        E: FnOnce(String),
    {
        let name = symbol_name.trim();
        if name.is_empty() {
            on_error("unknown_symbol".to_string());
            return;
        }
        let (mode, unit) = (self.settings.mode, self.settings.unit);
        let own = name == self.token.key || name == self.token.denom;
        let mut info = LibrarySymbolInfo::synthesize(name, mode, unit);
        if let Some(cached) = self.cached_token().filter(|_| own) {
            info = info.with_display(&cached.symbol, &cached.name, mode);
        }
        on_resolve(info);
    }

    async fn get_bars<R, E>(
        &self,
        symbol_info: &LibrarySymbolInfo,
        resolution: &str,
        period: PeriodParams,
        on_result: R,
        on_error: E,
    ) where
        R: FnOnce(Vec<Bar>, HistoryMetadata) + Send,
        E: FnOnce(String) + Send,
    {
        let tf = TfKey::from_resolution(resolution);
        let step = tf.step_secs();

        let epoch = {
            let mut state = self.shared.lock().await;
            if period.first_data_request {
                state.next_epoch()
            } else {
                state.history_epoch
            }
        };

        let fetched = match fetch_bars(
            &self.source,
            &self.token.key,
            tf,
            self.settings.mode,
            self.settings.unit,
            period.from - step,
            period.to + step,
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(symbol = %symbol_info.ticker, %tf, "History load failed: {e}");
                on_error(e.to_string());
                return;
            }
        };

        // Only a first request may show fallback history from outside the
        // window; older pages would otherwise repeat it on every scroll.
        let bounded = fetched.windowed || !period.first_data_request;
        let lower_ms = align_floor(period.from, step) * 1000;
        let upper_ms = period.to * 1000;
        let bars: Vec<Bar> = fetched
            .bars
            .iter()
            .filter(|bar| bar.time < upper_ms && (!bounded || bar.time >= lower_ms))
            .copied()
            .collect();

        {
            let mut state = self.shared.lock().await;
            if state.history_epoch != epoch {
                debug!(%tf, epoch, "Discarding superseded history response");
                return;
            }
            if period.first_data_request {
                let now = (self.clock)();
                state.synth.seed(tf, &fetched.bars, now);
            }
        }

        debug!(
            symbol = %symbol_info.ticker,
            %tf,
            bars = bars.len(),
            windowed = fetched.windowed,
            "History loaded"
        );
        let no_data = bars.is_empty();
        on_result(bars, HistoryMetadata { no_data });
    }

    async fn subscribe_bars(
        &self,
        symbol_info: &LibrarySymbolInfo,
        resolution: &str,
        on_tick: BarCallback,
        listener_guid: &str,
        on_reset_cache_needed: ResetCallback,
    ) {
        let tf = TfKey::from_resolution(resolution);
        let mut live = self.live.lock().await;

        self.shared.lock().await.subscriptions.insert(
            listener_guid.to_string(),
            Subscription {
                timeframe: tf,
                on_tick,
                on_reset: on_reset_cache_needed,
            },
        );
        info!(symbol = %symbol_info.ticker, %tf, listener_guid, "Subscribed bars");

        self.ensure_live(&mut live).await;
    }

    async fn unsubscribe_bars(&self, listener_guid: &str) {
        let mut live = self.live.lock().await;

        let remaining = {
            let mut state = self.shared.lock().await;
            let Some(removed) = state.subscriptions.remove(listener_guid) else {
                debug!(listener_guid, "Unsubscribe for unknown listener");
                return;
            };
            if !state
                .subscriptions
                .values()
                .any(|s| s.timeframe == removed.timeframe)
            {
                state.synth.forget(removed.timeframe);
            }
            state.subscriptions.len()
        };
        info!(listener_guid, remaining, "Unsubscribed bars");

        if remaining == 0 {
            stop_live(&mut live).await;
        }
    }

    fn get_server_time<F>(&self, callback: F)
    where
        F: FnOnce(i64),
    {
        callback((self.clock)().div_euclid(1000));
    }
}
