//! Swap-event decoding and trade derivation.
//!
//! - [`decode`] - websocket payloads to normalized chain events
//! - [`derive`] - swap attributes to a priced, sided trade print

pub mod decode;
pub mod derive;

pub use decode::{decode_events, decode_swap_frame, find_swap_attributes};
pub use derive::{derive_swap, normalize_micro_scale, parse_reserves};

use crate::models::{ParsedSwap, TokenContext};

/// Decodes a raw frame and derives a trade for `token`.
///
/// Pure in its inputs: the same frame, token and timestamp always produce
/// the same result.
pub fn parse_swap_frame(
    frame: &[u8],
    token: &TokenContext,
    received_at_ms: i64,
) -> Option<ParsedSwap> {
    let attributes = decode_swap_frame(frame)?;
    derive_swap(&attributes, token, received_at_ms)
}
