//! Async WebSocket client for the chain RPC swap event stream.
//!
//! This module is organized by domain:
//! - [`subscription`] - Swap event queries and subscribe/unsubscribe requests
//! - [`handler`] - Incoming frame processing
//! - [`connection`] - Connection lifecycle with reconnect policy

pub mod connection;
mod handler;
mod subscription;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;
use tungstenite::Message;

use crate::Result;
use crate::models::ParsedSwap;

pub use connection::{ConnectionCommand, ConnectionManager, ReconnectPolicy};
pub use handler::{frame_payload, parse_frame};
pub use subscription::{subscribe_swaps, swap_queries, unsubscribe_swaps};

/// Write half of an RPC WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of an RPC WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Events produced by the live feed for its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Connected and subscribed.
    Connected,
    /// The connection dropped; a reconnect may follow.
    Disconnected,
    /// The reconnect policy is exhausted; no further messages will arrive.
    GaveUp,
    /// A swap for the subscribed token.
    Swap(ParsedSwap),
}

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns a [`FeedError`](crate::FeedError) if the connection or TLS handshake fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _) = connect_async(url).await?;
    info!("WebSocket handshake completed");

    Ok(ws_stream.split())
}
