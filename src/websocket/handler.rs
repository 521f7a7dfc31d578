//! Incoming WebSocket frame processing.

use tracing::trace;
use tungstenite::Message;

use crate::models::{ParsedSwap, TokenContext};
use crate::swap::parse_swap_frame;

/// Returns the payload bytes of a data frame.
///
/// Text and binary frames both carry JSON; control frames carry none.
pub fn frame_payload(message: &Message) -> Option<&[u8]> {
    match message {
        Message::Text(text) => Some(text.as_bytes()),
        Message::Binary(bytes) => Some(&bytes[..]),
        _ => None,
    }
}

/// Turns a received frame into a swap for `token`, if it carries one.
pub fn parse_frame(
    message: &Message,
    token: &TokenContext,
    received_at_ms: i64,
) -> Option<ParsedSwap> {
    let payload = frame_payload(message)?;
    let swap = parse_swap_frame(payload, token, received_at_ms);
    if let Some(swap) = &swap {
        trace!(
            price = swap.price,
            volume = swap.volume,
            direction = ?swap.direction,
            "Parsed swap"
        );
    }
    swap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frames_have_no_payload() {
        assert!(frame_payload(&Message::Ping(Vec::new().into())).is_none());
        assert!(frame_payload(&Message::Close(None)).is_none());
    }

    #[test]
    fn binary_and_text_frames_decode_alike() {
        let json = r#"{"result":{"events":{
            "wasm.action":["swap"],
            "wasm.reserves":["uzig:2000000,tokenX:1000000"]
        }}}"#;
        let token = TokenContext::new("tokenX", 6);

        let text = parse_frame(&Message::Text(json.into()), &token, 1_000).unwrap();
        let frame = Message::Binary(json.as_bytes().to_vec().into());
        let binary = parse_frame(&frame, &token, 1_000).unwrap();
        assert_eq!(text, binary);
        assert!((text.price - 2.0).abs() < 1e-12);
    }
}
