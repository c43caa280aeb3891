/*
[INPUT]:  Push-channel and payment-relay endpoints
[OUTPUT]: Key-scoped wallet push messages and settled payment events
[POS]:    WebSocket layer - out-of-band response channels
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod message;
pub mod push;
pub mod relay;

pub use message::{RelayEnvelope, RelayEvent, RelayMessage};
pub use push::{PushConnector, PushEvent, PushHub, PushListener, PushStream, WsPushConnector};
pub use relay::PaymentRelay;

/// Cut `value` to at most `max_len` bytes for logging
pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut cut = max_len;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + 3);
    out.push_str(&value[..cut]);
    out.push_str("...");
    out
}
