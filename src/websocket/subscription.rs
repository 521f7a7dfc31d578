//! Swap event subscription and unsubscription operations.

use futures_util::SinkExt;
use tracing::{debug, info};
use tungstenite::Message;

use super::WsWriter;
use crate::Result;
use crate::models::{RpcRequest, TokenContext};

/// Builds the event queries that select swaps touching `token`.
///
/// With a known pair contract a single query on the contract address is
/// enough. Otherwise one query matches the token on the offer side and one
/// on the ask side, since event queries cannot express a disjunction.
pub fn swap_queries(token: &TokenContext) -> Vec<String> {
    const BASE: &str = "tm.event='Tx' AND wasm.action='swap'";

    match &token.pair_contract {
        Some(contract) => vec![format!("{BASE} AND wasm._contract_address='{contract}'")],
        None => vec![
            format!("{BASE} AND wasm.offer_asset='{}'", token.denom),
            format!("{BASE} AND wasm.ask_asset='{}'", token.denom),
        ],
    }
}

/// Subscribes to every query, numbering requests from 1.
///
/// # Errors
///
/// Returns a [`FeedError`](crate::FeedError) if sending a request fails.
pub async fn subscribe_swaps(write: &mut WsWriter, queries: &[String]) -> Result<()> {
    for (id, query) in (1..).zip(queries) {
        let request = RpcRequest::subscribe(id, query.as_str());
        let json = serde_json::to_string(&request)?;
        debug!("Sending subscribe request: {}", json);
        write.send(Message::Text(json.into())).await?;
    }
    info!(queries = queries.len(), "Subscribed to swap events");

    Ok(())
}

/// Drops the subscriptions made by [`subscribe_swaps`].
///
/// # Errors
///
/// Returns a [`FeedError`](crate::FeedError) if sending a request fails.
pub async fn unsubscribe_swaps(write: &mut WsWriter, queries: &[String]) -> Result<()> {
    for (id, query) in (1..).zip(queries) {
        let request = RpcRequest::unsubscribe(id, query.as_str());
        let json = serde_json::to_string(&request)?;
        write.send(Message::Text(json.into())).await?;
    }
    info!(queries = queries.len(), "Unsubscribed from swap events");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_match_both_legs_without_contract() {
        let queries = swap_queries(&TokenContext::new("factory/zig1x/degen", 6));
        assert_eq!(queries.len(), 2);
        assert!(queries[0].ends_with("wasm.offer_asset='factory/zig1x/degen'"));
        assert!(queries[1].ends_with("wasm.ask_asset='factory/zig1x/degen'"));
        assert!(queries.iter().all(|q| q.contains("wasm.action='swap'")));
    }

    #[test]
    fn contract_query_replaces_denom_queries() {
        let token = TokenContext::new("factory/zig1x/degen", 6).with_pair_contract("zig1pair");
        assert_eq!(
            swap_queries(&token),
            vec!["tm.event='Tx' AND wasm.action='swap' AND wasm._contract_address='zig1pair'"]
        );
    }
}
