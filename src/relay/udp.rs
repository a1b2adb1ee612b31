//! UDP relay runtime: per-client datagram encapsulation (RFC 1928 §7) and
//! the per-exchange relay sessions that forward decapsulated payloads to
//! their destinations and back.

pub mod codec;
pub mod exchange;
pub mod session;

pub use exchange::UdpExchange;
pub use session::UdpRelaySession;
