//! Version/method negotiation messages (RFC 1928 §3).

pub mod message;
pub mod method;
