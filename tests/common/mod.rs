//! Shared test utilities.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use degenter_feed::models::{Bar, Direction, ParsedSwap};
use degenter_feed::rest::{BarSource, OhlcvRequest, TokenSearchHit};
use degenter_feed::{FeedError, Result};

/// Builds a bar from a time in Unix seconds.
pub fn bar(time_secs: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        time: time_secs * 1000,
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Builds a flat bar closing at `close`.
pub fn close_bar(time_secs: i64, close: f64) -> Bar {
    Bar::flat(time_secs * 1000, close)
}

/// Builds a buy print at a time in Unix seconds.
pub fn swap_at(time_secs: i64, price: f64, volume: f64) -> ParsedSwap {
    ParsedSwap {
        price,
        volume,
        direction: Direction::Buy,
        timestamp_ms: time_secs * 1000,
    }
}

/// Scripted [`BarSource`] that replays queued responses in order.
///
/// When the queue runs dry every further request returns no bars.
#[derive(Default)]
pub struct StubSource {
    responses: Mutex<VecDeque<std::result::Result<Vec<Bar>, u16>>>,
    search: Mutex<Option<std::result::Result<Vec<TokenSearchHit>, u16>>>,
    requests: Mutex<Vec<OhlcvRequest>>,
    hold_first: Mutex<Option<oneshot::Receiver<()>>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful OHLCV response.
    pub fn respond(self, bars: Vec<Bar>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(bars));
        self
    }

    /// Queues an HTTP failure with `status`.
    pub fn fail(self, status: u16) -> Self {
        self.responses.lock().unwrap().push_back(Err(status));
        self
    }

    pub fn search_results(self, hits: Vec<TokenSearchHit>) -> Self {
        *self.search.lock().unwrap() = Some(Ok(hits));
        self
    }

    pub fn search_fails(self, status: u16) -> Self {
        *self.search.lock().unwrap() = Some(Err(status));
        self
    }

    /// Makes the first OHLCV request wait until the returned sender fires.
    pub fn hold_first(self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        *self.hold_first.lock().unwrap() = Some(rx);
        (self, tx)
    }

    pub fn requests(&self) -> Vec<OhlcvRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn api_error(status: u16) -> FeedError {
    FeedError::Api {
        status,
        body: "stub failure".to_string(),
    }
}

impl BarSource for StubSource {
    async fn fetch_ohlcv(&self, request: &OhlcvRequest) -> Result<Vec<Bar>> {
        let (hold, response) = {
            self.requests.lock().unwrap().push(request.clone());
            let hold = self.hold_first.lock().unwrap().take();
            let response = self.responses.lock().unwrap().pop_front();
            (hold, response)
        };
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        match response {
            Some(Ok(bars)) => Ok(bars),
            Some(Err(status)) => Err(api_error(status)),
            None => Ok(Vec::new()),
        }
    }

    async fn search_tokens(&self, _query: &str) -> Result<Vec<TokenSearchHit>> {
        let search = self.search.lock().unwrap().clone();
        match search {
            Some(Ok(hits)) => Ok(hits),
            Some(Err(status)) => Err(api_error(status)),
            None => Ok(Vec::new()),
        }
    }
}

/// Collects bars delivered to a subscription callback.
#[derive(Clone, Default)]
pub struct BarSink(pub Arc<Mutex<Vec<Bar>>>);

impl BarSink {
    pub fn callback(&self) -> degenter_feed::datafeed::BarCallback {
        let sink = Arc::clone(&self.0);
        Arc::new(move |bar: &Bar| sink.lock().unwrap().push(*bar))
    }

    pub fn bars(&self) -> Vec<Bar> {
        self.0.lock().unwrap().clone()
    }
}
