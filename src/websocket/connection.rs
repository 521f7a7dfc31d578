//! WebSocket connection lifecycle management.
//!
//! [`ConnectionManager`] handles connecting, subscribing to swap events,
//! reading frames, and reconnecting according to a [`ReconnectPolicy`].
//! A shutdown command (or dropping the command sender) stops it at any
//! point, including while it is waiting to reconnect.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tungstenite::Message as WsMessage;

use super::{
    FeedMessage, WsReader, WsWriter, connect, parse_frame, subscribe_swaps, swap_queries,
    unsubscribe_swaps,
};
use crate::bucket::now_ms;
use crate::models::TokenContext;

/// Delay between reconnection attempts used by the default policy.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// How long to wait and how often to retry after a connection failure.
///
/// Delays double from `initial_delay` up to `max_delay`; setting both to
/// the same value gives a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// Retries forever with a constant delay.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            max_attempts: None,
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ceiling = self.max_delay.max(self.initial_delay);
        let doublings = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1 << doublings)
            .min(ceiling)
    }

    /// Returns `true` if another attempt is allowed after `failures`
    /// consecutive failures.
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures <= max)
    }
}

/// Commands sent to a running connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Close the socket and stop; no reconnect follows.
    Shutdown,
}

/// Why the reader loop exited.
enum DisconnectReason {
    /// The connection was lost or errored.
    ConnectionError,
    /// Shutdown was requested or the consumer went away.
    Shutdown,
}

/// Owns the websocket for one token and forwards its swaps.
pub struct ConnectionManager {
    url: String,
    token: TokenContext,
    policy: ReconnectPolicy,
    tx: mpsc::UnboundedSender<FeedMessage>,
    cmd_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    #[must_use]
    pub fn new(
        url: String,
        token: TokenContext,
        policy: ReconnectPolicy,
        tx: mpsc::UnboundedSender<FeedMessage>,
        cmd_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    ) -> Self {
        Self {
            url,
            token,
            policy,
            tx,
            cmd_rx,
        }
    }

    /// Runs until shutdown or until the reconnect policy is exhausted.
    pub async fn run(mut self) {
        let queries = swap_queries(&self.token);
        let mut failures: u32 = 0;

        loop {
            info!(url = %self.url, token = %self.token.denom, "Connecting to WebSocket");

            let connected = tokio::select! {
                result = connect(&self.url) => result,
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(ConnectionCommand::Shutdown) | None => {
                            info!("Connection manager shutting down");
                            return;
                        }
                    }
                }
            };

            let reason = match connected {
                Ok((mut write, read)) => match subscribe_swaps(&mut write, &queries).await {
                    Ok(()) => {
                        failures = 0;
                        if self.tx.send(FeedMessage::Connected).is_err() {
                            DisconnectReason::Shutdown
                        } else {
                            info!("WebSocket connected and subscribed");
                            let reason = self.read_loop(read).await;
                            if matches!(reason, DisconnectReason::Shutdown) {
                                close_gracefully(&mut write, &queries).await;
                            }
                            reason
                        }
                    }
                    Err(e) => {
                        warn!("Subscribe failed: {e}");
                        DisconnectReason::ConnectionError
                    }
                },
                Err(e) => {
                    error!("Connection failed: {e}");
                    DisconnectReason::ConnectionError
                }
            };

            match reason {
                DisconnectReason::Shutdown => {
                    info!("Connection manager shutting down");
                    return;
                }
                DisconnectReason::ConnectionError => {
                    let _ = self.tx.send(FeedMessage::Disconnected);
                    failures = failures.saturating_add(1);

                    if !self.policy.allows(failures) {
                        error!(failures, "Reconnect attempts exhausted, giving up");
                        let _ = self.tx.send(FeedMessage::GaveUp);
                        return;
                    }

                    let backoff = self.policy.delay_for(failures);
                    info!(
                        backoff_ms = backoff.as_millis() as u64,
                        attempt = failures,
                        "Connection lost, backing off"
                    );
                    if matches!(self.wait(backoff).await, DisconnectReason::Shutdown) {
                        info!("Connection manager shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Sleeps for `delay` unless a shutdown arrives first.
    async fn wait(&mut self, delay: Duration) -> DisconnectReason {
        tokio::select! {
            () = tokio::time::sleep(delay) => DisconnectReason::ConnectionError,
            _ = self.cmd_rx.recv() => DisconnectReason::Shutdown,
        }
    }

    /// Reads frames until disconnection or shutdown.
    async fn read_loop(&mut self, mut read: WsReader) -> DisconnectReason {
        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Close(frame))) => {
                            warn!(?frame, "WebSocket closed by server");
                            return DisconnectReason::ConnectionError;
                        }
                        Some(Ok(frame)) => {
                            if let Some(swap) = parse_frame(&frame, &self.token, now_ms()) {
                                if self.tx.send(FeedMessage::Swap(swap)).is_err() {
                                    return DisconnectReason::Shutdown;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!("WebSocket error: {e}");
                            return DisconnectReason::ConnectionError;
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return DisconnectReason::ConnectionError;
                        }
                    }
                }

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(ConnectionCommand::Shutdown) | None => {
                            return DisconnectReason::Shutdown;
                        }
                    }
                }
            }
        }
    }
}

/// Unsubscribes and sends a close frame, ignoring failures.
async fn close_gracefully(write: &mut WsWriter, queries: &[String]) {
    if let Err(e) = unsubscribe_swaps(write, queries).await {
        warn!("Failed to unsubscribe before close: {e}");
    }
    let _ = write.close().await;
}
