//! Normalized chain event records.
//!
//! Both websocket payload shapes (the flattened `result.events` map and the
//! nested `TxResult` list) decode into a list of [`TxEvent`].

use serde::{Deserialize, Serialize};

/// One `key=value` attribute of a chain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
}

/// A typed chain event with its attributes in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub tpe: String,
    pub attributes: Vec<EventAttribute>,
}

impl TxEvent {
    /// Returns the first value recorded for `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Returns `true` if any attribute named `key` holds `value`.
    pub fn has_attribute(&self, key: &str, value: &str) -> bool {
        self.attributes
            .iter()
            .any(|a| a.key == key && a.value == value)
    }
}

/// Attributes of a `wasm` swap event, looked up by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapAttributes {
    attributes: Vec<EventAttribute>,
}

impl SwapAttributes {
    #[must_use]
    pub fn new(attributes: Vec<EventAttribute>) -> Self {
        Self { attributes }
    }

    /// Returns the first non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .filter(|a| a.key == key)
            .map(|a| a.value.trim())
            .find(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventAttribute> {
        self.attributes.iter()
    }
}
