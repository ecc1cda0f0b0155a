//! Opaque identifiers shaped like the upstream API's (`msg_01…`, `req_01…`)
//!
//! These are unique enough for a mock; nothing relies on them being unpredictable.
use rand::Rng;
use rand::distr::Alphanumeric;

const ID_BODY_LEN: usize = 22;

fn generate_id(prefix: &str) -> String {
    let body: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_BODY_LEN)
        .map(char::from)
        .collect();
    format!("{}_01{}", prefix, body)
}

/// Identifier for a generated message.
pub fn message_id() -> String {
    generate_id("msg")
}

/// Identifier for one request/response cycle, also sent as the `request-id` header.
pub fn request_id() -> String {
    generate_id("req")
}
