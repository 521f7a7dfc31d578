//! Charting datafeed for Degenter tokens on ZigChain.
//!
//! Serves historical OHLCV bars from the Degenter REST API and synthesizes
//! live bars from swap events streamed over the chain RPC websocket, behind
//! the datafeed contract a charting library expects.

pub mod bucket;
pub mod cache;
pub mod config;
pub mod datafeed;
pub mod error;
pub mod market;
pub mod models;
pub mod rest;
pub mod swap;
pub mod synth;
pub mod websocket;

pub use error::{FeedError, Result};
