//! UDP request encapsulation (RFC 1928 §7).
//!
//! A client wraps every UDP datagram destined for the relay in a small
//! header before handing it to the relay's UDP socket:
//!
//! ```text
//! +----+------+------+----------+----------+----------+
//! |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
//! +----+------+------+----------+----------+----------+
//! | 2  |  1   |  1   | Variable |    2     | Variable |
//! +----+------+------+----------+----------+----------+
//!
//! o RSV   - reserved, must be 0x0000
//! o FRAG  - fragment number; only 0x00 (no fragmentation) is supported
//! o ATYP  - address type of DST.ADDR
//! ```
//!
//! The relay forwards the payload to `DST.ADDR:DST.PORT` and, on the way
//! back, wraps the destination's reply in the same header shape so the
//! client can tell which destination a datagram came from.

use std::net::SocketAddr;

use crate::error::SocksError;
use crate::parse::AddrPort;

/// A decoded client→relay UDP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpClientForwardMessage {
    /// Destination address and port.
    pub dst: AddrPort,
    /// Payload to forward to `dst`.
    pub data: Vec<u8>,
}

impl UdpClientForwardMessage {
    /// Decodes a full UDP datagram payload as received from the client.
    ///
    /// Rejects a nonzero `RSV` (`UdpForwardVersionNotSupported`) and a
    /// nonzero `FRAG` (`UdpReassembleNotSupported`) — fragment
    /// reassembly is out of scope, matching the Go original.
    pub fn decode(bytes: &[u8]) -> Result<Self, SocksError> {
        if bytes.len() < 4 {
            return Err(SocksError::UdpForwardVersionNotSupported);
        }
        if bytes[0] != 0x00 || bytes[1] != 0x00 {
            return Err(SocksError::UdpForwardVersionNotSupported);
        }
        if bytes[2] != 0x00 {
            return Err(SocksError::UdpReassembleNotSupported);
        }

        let atyp = bytes[3];
        let (dst, consumed) = AddrPort::decode_slice(atyp, &bytes[4..])?;
        let data = bytes[4 + consumed..].to_vec();

        Ok(Self { dst, data })
    }
}

/// Builds the relay→client UDP datagram that wraps a destination's reply.
///
/// Layout: `RSV(0x0000) | FRAG(0x00) | ATYP | SRC.ADDR | SRC.PORT | DATA`,
/// where `SRC` is the destination the reply actually came from.
pub fn encode_server_forward(from: SocketAddr, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + 18 + data.len());
    buf.extend_from_slice(&[0x00, 0x00, 0x00]);
    AddrPort::from_socket(from).encode(&mut buf);
    buf.extend_from_slice(data);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn decode_rejects_nonzero_reserved_field() {
        let bytes = [0x01, 0x00, 0x00, 0x01, 1, 2, 3, 4, 0, 80];
        let err = UdpClientForwardMessage::decode(&bytes).unwrap_err();
        assert!(matches!(err, SocksError::UdpForwardVersionNotSupported));
    }

    #[test]
    fn decode_rejects_nonzero_fragment_number() {
        let bytes = [0x00, 0x00, 0x01, 0x01, 1, 2, 3, 4, 0, 80];
        let err = UdpClientForwardMessage::decode(&bytes).unwrap_err();
        assert!(matches!(err, SocksError::UdpReassembleNotSupported));
    }

    #[test]
    fn decode_extracts_destination_and_payload() {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x01, 93, 184, 216, 34, 0, 53];
        bytes.extend_from_slice(b"query");
        let msg = UdpClientForwardMessage::decode(&bytes).unwrap();
        assert_eq!(msg.dst, AddrPort::V4(Ipv4Addr::new(93, 184, 216, 34), 53));
        assert_eq!(msg.data, b"query");
    }

    #[test]
    fn server_forward_round_trips_through_client_decode() {
        let from: SocketAddr = "93.184.216.34:53".parse().unwrap();
        let encoded = encode_server_forward(from, b"answer");
        // the client-facing encoding is structurally identical to a
        // client forward message, just with DST set to the source.
        let decoded = UdpClientForwardMessage::decode(&encoded).unwrap();
        assert_eq!(decoded.dst, AddrPort::from_socket(from));
        assert_eq!(decoded.data, b"answer");
    }
}
