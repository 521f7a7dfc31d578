//! Charting-library datafeed contract.
//!
//! [`Datafeed`] mirrors the seven methods the charting library calls on its
//! datafeed object, with the library's callback conventions. The production
//! implementation is [`DatafeedSession`].

mod session;

use std::future::Future;
use std::sync::Arc;

pub use session::{DatafeedSession, LiveFeedSettings, SessionSettings};

use crate::models::{
    Bar, DatafeedConfiguration, HistoryMetadata, LibrarySymbolInfo, PeriodParams,
    SearchSymbolResult,
};

/// Receives every live bar for a subscription.
pub type BarCallback = Arc<dyn Fn(&Bar) + Send + Sync>;

/// Asks the chart to drop its cached bars and reload history.
pub type ResetCallback = Arc<dyn Fn() + Send + Sync>;

/// The datafeed interface expected by the charting library.
pub trait Datafeed {
    /// Reports capabilities, deferred by one scheduler tick.
    fn on_ready<F>(&self, callback: F) -> impl Future<Output = ()> + Send
    where
        F: FnOnce(DatafeedConfiguration) + Send;

    /// Looks up tokens matching `user_input`; never fails.
    fn search_symbols<F>(
        &self,
        user_input: &str,
        exchange: &str,
        symbol_type: &str,
        on_result: F,
    ) -> impl Future<Output = ()> + Send
    where
        F: FnOnce(Vec<SearchSymbolResult>) + Send;

    /// Builds symbol metadata for `symbol_name` without network access.
    fn resolve_symbol<R, E>(&self, symbol_name: &str, on_resolve: R, on_error: E)
    where
        R: FnOnce(LibrarySymbolInfo),
        E: FnOnce(String);

    /// Loads historical bars for a window.
    fn get_bars<R, E>(
        &self,
        symbol_info: &LibrarySymbolInfo,
        resolution: &str,
        period: PeriodParams,
        on_result: R,
        on_error: E,
    ) -> impl Future<Output = ()> + Send
    where
        R: FnOnce(Vec<Bar>, HistoryMetadata) + Send,
        E: FnOnce(String) + Send;

    /// Starts pushing live bars for `resolution` to `on_tick`.
    fn subscribe_bars(
        &self,
        symbol_info: &LibrarySymbolInfo,
        resolution: &str,
        on_tick: BarCallback,
        listener_guid: &str,
        on_reset_cache_needed: ResetCallback,
    ) -> impl Future<Output = ()> + Send;

    /// Stops the subscription registered under `listener_guid`.
    fn unsubscribe_bars(&self, listener_guid: &str) -> impl Future<Output = ()> + Send;

    /// Reports the current time in Unix seconds.
    fn get_server_time<F>(&self, callback: F)
    where
        F: FnOnce(i64);
}
