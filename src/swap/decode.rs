//! Websocket payload decoding into normalized chain events.
//!
//! Tendermint RPC delivers swap transactions in one of two shapes:
//! a flattened `result.events` map keyed `"<type>.<key>"`, or a structured
//! event list under `result.data.value.TxResult.result.events` whose strings
//! may be base64 encoded. Both are normalized into [`TxEvent`] records.

use std::sync::LazyLock;

use base64::prelude::*;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{EventAttribute, SwapAttributes, TxEvent};

static BASE64_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").expect("static base64 pattern"));

/// Returns `true` when `value` is shaped like padded standard base64.
///
/// This is a heuristic: plain words such as `"swap"` also match. Callers
/// should go through [`decode_maybe_base64`], which rejects decodings that
/// are not printable UTF-8.
pub fn looks_like_base64(value: &str) -> bool {
    !value.is_empty() && value.len() % 4 == 0 && BASE64_SHAPE.is_match(value)
}

/// Decodes `value` if it is base64 of printable UTF-8, otherwise returns it
/// unchanged.
pub fn decode_maybe_base64(value: &str) -> String {
    if !looks_like_base64(value) {
        return value.to_string();
    }

    BASE64_STANDARD
        .decode(value)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|text| !text.is_empty() && !text.chars().any(char::is_control))
        .unwrap_or_else(|| value.to_string())
}

/// Extracts the normalized event list from a JSON-RPC message.
///
/// Returns `None` for error responses, subscription acknowledgements and
/// any message without events.
pub fn decode_events(message: &Value) -> Option<Vec<TxEvent>> {
    if message.get("error").is_some_and(|e| !e.is_null()) {
        return None;
    }

    let result = message.get("result")?;

    if let Some(flat) = result.get("events").and_then(Value::as_object) {
        return Some(events_from_flat(flat));
    }

    let nested = result
        .pointer("/data/value/TxResult/result/events")
        .and_then(Value::as_array)?;
    Some(events_from_structured(nested))
}

/// Rebuilds event records from a `"<type>.<key>" -> [values]` map.
///
/// All attributes of one type are merged into a single record, in key order
/// and then value order.
fn events_from_flat(flat: &Map<String, Value>) -> Vec<TxEvent> {
    let mut events: Vec<TxEvent> = Vec::new();

    for (composite, values) in flat {
        let Some((tpe, key)) = composite.split_once('.') else {
            continue;
        };

        let values: Vec<&str> = match values {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            Value::String(single) => vec![single.as_str()],
            _ => continue,
        };

        let index = match events.iter().position(|e| e.tpe == tpe) {
            Some(index) => index,
            None => {
                events.push(TxEvent {
                    tpe: tpe.to_string(),
                    attributes: Vec::new(),
                });
                events.len() - 1
            }
        };

        events[index]
            .attributes
            .extend(values.into_iter().map(|value| EventAttribute {
                key: key.to_string(),
                value: value.to_string(),
            }));
    }

    events
}

fn events_from_structured(items: &[Value]) -> Vec<TxEvent> {
    items
        .iter()
        .filter_map(|item| {
            let tpe = item.get("type").and_then(Value::as_str)?;
            let attributes = item
                .get("attributes")
                .and_then(Value::as_array)
                .map(|attrs| {
                    attrs
                        .iter()
                        .filter_map(|attr| {
                            let key = attr.get("key").and_then(Value::as_str)?;
                            let value = attr.get("value").and_then(Value::as_str).unwrap_or("");
                            Some(EventAttribute {
                                key: decode_maybe_base64(key),
                                value: decode_maybe_base64(value),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            Some(TxEvent {
                tpe: decode_maybe_base64(tpe),
                attributes,
            })
        })
        .collect()
}

/// Returns the attributes of the first `wasm` event whose action is `swap`.
pub fn find_swap_attributes(events: &[TxEvent]) -> Option<SwapAttributes> {
    events
        .iter()
        .filter(|e| e.tpe == "wasm")
        .find(|e| e.has_attribute("action", "swap"))
        .map(|e| SwapAttributes::new(e.attributes.clone()))
}

/// Decodes a raw websocket frame into swap attributes.
///
/// Anything that is not a swap (acks, errors, other wasm actions, invalid
/// JSON) yields `None` and is logged at debug level.
pub fn decode_swap_frame(frame: &[u8]) -> Option<SwapAttributes> {
    let message: Value = match serde_json::from_slice(frame) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "Dropping unparseable websocket frame");
            return None;
        }
    };

    if let Some(error) = message.get("error").filter(|e| !e.is_null()) {
        debug!(%error, "Dropping websocket error response");
        return None;
    }

    let Some(events) = decode_events(&message) else {
        debug!("Websocket message carries no events");
        return None;
    };

    let attributes = find_swap_attributes(&events);
    if attributes.is_none() {
        debug!(events = events.len(), "No wasm swap event in message");
    }
    attributes
}
