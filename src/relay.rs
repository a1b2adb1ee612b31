//! Traffic relaying: TCP bidirectional copy for CONNECT, UDP datagram
//! relaying for UDP ASSOCIATE.

pub mod tcp;
pub mod udp;
