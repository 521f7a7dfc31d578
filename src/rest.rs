//! REST access to historical OHLCV bars and token search.
//!
//! [`BarSource`] is the seam between the datafeed and the HTTP API;
//! [`RestClient`] is the production implementation and [`fetch_bars`]
//! layers the windowed-then-full-history fallback on top of any source.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::Result;
use crate::error::FeedError;
use crate::market::{ChartMode, PriceUnit};
use crate::models::{Bar, TfKey};

/// Parameters of one OHLCV request. The window is in Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhlcvRequest {
    pub token_key: String,
    pub timeframe: TfKey,
    pub mode: ChartMode,
    pub unit: PriceUnit,
    pub window: Option<(i64, i64)>,
}

/// A token returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSearchHit {
    pub denom: String,
    pub symbol: String,
    pub name: String,
}

/// Result of [`fetch_bars`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBars {
    /// Validated bars, ascending by time, one per timestamp.
    pub bars: Vec<Bar>,
    /// `false` when the windowed request was empty and full history was
    /// fetched instead.
    pub windowed: bool,
}

/// Anything that can answer OHLCV and token-search queries.
pub trait BarSource: Send + Sync {
    fn fetch_ohlcv(&self, request: &OhlcvRequest) -> impl Future<Output = Result<Vec<Bar>>> + Send;

    fn search_tokens(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<TokenSearchHit>>> + Send;
}

/// Fetches bars for `[from, to]`, retrying once without a window when the
/// windowed request comes back empty.
///
/// # Errors
///
/// Returns the first request failure; no retry is attempted on errors.
pub async fn fetch_bars<S: BarSource>(
    source: &S,
    token_key: &str,
    timeframe: TfKey,
    mode: ChartMode,
    unit: PriceUnit,
    from_secs: i64,
    to_secs: i64,
) -> Result<FetchedBars> {
    let mut request = OhlcvRequest {
        token_key: token_key.to_string(),
        timeframe,
        mode,
        unit,
        window: Some((from_secs, to_secs)),
    };

    let bars = source.fetch_ohlcv(&request).await?;
    if !bars.is_empty() {
        return Ok(FetchedBars {
            bars,
            windowed: true,
        });
    }

    debug!(
        token = token_key,
        %timeframe,
        from_secs,
        to_secs,
        "Windowed OHLCV request empty, falling back to full history"
    );
    request.window = None;
    let bars = source.fetch_ohlcv(&request).await?;
    Ok(FetchedBars {
        bars,
        windowed: false,
    })
}

#[derive(Deserialize)]
struct DataEnvelope {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// HTTP client for the Degenter REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    api_base: Url,
}

impl RestClient {
    /// Builds a client rooted at `api_base`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] for an unparseable base URL, or
    /// [`FeedError::Http`] if the HTTP client cannot be built.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| FeedError::Config(format!("invalid api base {api_base}: {e}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_base })
    }

    /// Returns the base URL extended by `segments`, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                FeedError::Config(format!("api base {} cannot hold a path", self.api_base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_data(&self, url: Url, query: &[(&str, String)]) -> Result<Vec<Value>> {
        let response = self.http.get(url.clone()).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%url, status = status.as_u16(), "REST request failed");
            return Err(FeedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: DataEnvelope = response.json().await?;
        Ok(envelope.data.unwrap_or_default())
    }
}

impl BarSource for RestClient {
    async fn fetch_ohlcv(&self, request: &OhlcvRequest) -> Result<Vec<Bar>> {
        let url = self.endpoint(&["tokens", &request.token_key, "ohlcv"])?;

        let mut query = vec![("tf", request.timeframe.as_str().to_string())];
        if let Some((from, to)) = request.window {
            query.push(("from", iso8601(from)?));
            query.push(("to", iso8601(to)?));
        }
        query.push(("mode", request.mode.as_str().to_string()));
        query.push(("unit", request.unit.as_str().to_string()));
        query.push(("priceSource", "best".to_string()));
        query.push(("fill", "prev".to_string()));

        let records = self.get_data(url, &query).await?;
        let bars = bars_from_records(&records);
        info!(
            token = %request.token_key,
            timeframe = %request.timeframe,
            records = records.len(),
            bars = bars.len(),
            "Fetched OHLCV"
        );
        Ok(bars)
    }

    async fn search_tokens(&self, query: &str) -> Result<Vec<TokenSearchHit>> {
        let url = self.endpoint(&["tokens", "search"])?;
        let records = self.get_data(url, &[("q", query.to_string())]).await?;
        Ok(records.iter().filter_map(search_hit).collect())
    }
}

/// Formats Unix seconds as an ISO-8601 UTC timestamp with milliseconds.
///
/// # Errors
///
/// Returns [`FeedError::MalformedMessage`] if the timestamp is out of range.
pub fn iso8601(secs: i64) -> Result<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| FeedError::MalformedMessage(format!("timestamp {secs} out of range")))
}

/// Converts raw OHLCV records into validated bars.
///
/// Records without a timestamp or with non-finite OHLC values are skipped.
/// The result is sorted ascending; when two records share a timestamp the
/// later one wins.
pub fn bars_from_records(records: &[Value]) -> Vec<Bar> {
    let mut bars: Vec<Bar> = records.iter().filter_map(bar_from_record).collect();
    bars.sort_by_key(|bar| bar.time);

    let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.time == bar.time => *last = bar,
            _ => deduped.push(bar),
        }
    }
    deduped
}

fn bar_from_record(record: &Value) -> Option<Bar> {
    let time = record_time_ms(record)?;
    let open = number(record.get("open")?)?;
    let high = number(record.get("high")?)?;
    let low = number(record.get("low")?)?;
    let close = number(record.get("close")?)?;
    if ![open, high, low, close].iter().all(|v| v.is_finite()) {
        return None;
    }

    let volume = ["volume", "volume_native"]
        .iter()
        .find_map(|key| record.get(*key).and_then(number))
        .unwrap_or(0.0);

    Some(
        Bar {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
        .normalized(),
    )
}

/// Reads `ts_sec` (seconds), or `ts`/`time` (seconds, milliseconds or
/// RFC 3339), as milliseconds.
fn record_time_ms(record: &Value) -> Option<i64> {
    if let Some(secs) = record.get("ts_sec").and_then(number) {
        return Some((secs * 1000.0) as i64);
    }

    let raw = record.get("ts").or_else(|| record.get("time"))?;
    if let Some(value) = number(raw) {
        // Anything past ~1973 in milliseconds is far beyond any seconds value.
        return Some(if value.abs() >= 1e11 {
            value as i64
        } else {
            (value * 1000.0) as i64
        });
    }

    let text = raw.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Reads a JSON number or numeric string.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn search_hit(record: &Value) -> Option<TokenSearchHit> {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| record.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    };

    let denom = text(&["denom", "tokenId", "token_id"])?;
    let symbol = text(&["symbol"]).unwrap_or_else(|| denom.clone());
    let name = text(&["name"]).unwrap_or_else(|| symbol.clone());
    Some(TokenSearchHit {
        denom,
        symbol,
        name,
    })
}
