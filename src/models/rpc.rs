//! JSON-RPC requests sent to the Tendermint websocket.

use serde::Serialize;

/// A `subscribe` or `unsubscribe` request carrying an event query.
#[derive(Debug, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub id: u64,
    pub params: QueryParams,
}

/// The `params` object of an event subscription request.
#[derive(Debug, Serialize)]
pub struct QueryParams {
    pub query: String,
}

impl RpcRequest {
    /// Subscribes to events matching `query`.
    pub fn subscribe(id: u64, query: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "subscribe",
            id,
            params: QueryParams {
                query: query.into(),
            },
        }
    }

    /// Drops a previous subscription for `query`.
    pub fn unsubscribe(id: u64, query: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "unsubscribe",
            id,
            params: QueryParams {
                query: query.into(),
            },
        }
    }
}
