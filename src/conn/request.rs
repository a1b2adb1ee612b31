//! SOCKS5 client connection request (RFC 1928 §4).
//!
//! After negotiation, the client sends a request message:
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//!
//! o VER      - protocol version: X'05'
//! o CMD      - command code:
//!                0x01 = CONNECT
//!                0x02 = BIND
//!                0x03 = UDP ASSOCIATE
//! o RSV      - reserved, must be 0x00
//! o ATYP     - address type of DST.ADDR
//!                0x01 = IPv4 address
//!                0x03 = Domain name
//!                0x04 = IPv6 address
//! o DST.ADDR - destination address
//! o DST.PORT - destination port in network byte order
//! ```

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SocksError;
use crate::parse::AddrPort;

const SOCKS5_VERSION: u8 = 0x05;

/// The command (`CMD`) of a SOCKS5 request (RFC 1928 §4).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// CONNECT command (0x01): establishes a TCP connection to the target host.
    Connect = 0x01,
    /// BIND command (0x02): used for inbound connections (rarely implemented).
    Bind = 0x02,
    /// UDP ASSOCIATE command (0x03): establishes a UDP relay.
    UdpAssociate = 0x03,
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cmd::Connect => write!(f, "CONNECT"),
            Cmd::Bind => write!(f, "BIND"),
            Cmd::UdpAssociate => write!(f, "UDP_ASSOCIATE"),
        }
    }
}

/// Represents a SOCKS5 connection request (RFC 1928 §4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnRequest {
    /// Protocol version (`VER`), must be 0x05.
    pub ver: u8,
    /// Command (`CMD`): CONNECT, BIND, or UDP ASSOCIATE.
    pub cmd: Cmd,
    /// Reserved byte (`RSV`), must be 0x00.
    pub rsv: u8,
    /// Destination address and port (`DST.ADDR`, `DST.PORT`).
    pub dst: AddrPort,
}

impl ConnRequest {
    /// Creates a new `ConnRequest`.
    pub fn new(cmd: Cmd, dst: AddrPort) -> Self {
        Self {
            ver: SOCKS5_VERSION,
            cmd,
            rsv: 0x00,
            dst,
        }
    }

    /// Serializes the request into the SOCKS5 wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![self.ver, self.cmd as u8, self.rsv];
        self.dst.encode(&mut buf);
        buf
    }

    /// Reads a [`ConnRequest`] from an async stream.
    ///
    /// Reads `VER`, `CMD`, `RSV`, and `ATYP` as a 4-byte header, validates
    /// the reserved byte, then delegates address/port decoding to
    /// [`AddrPort::decode`].
    pub async fn decode<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, SocksError> {
        let mut head = [0u8; 4];
        reader.read_exact(&mut head).await?;
        let [ver, cmd_byte, rsv, atyp] = head;

        if ver != SOCKS5_VERSION {
            return Err(SocksError::VersionNotSupported(ver));
        }
        if rsv != 0x00 {
            return Err(SocksError::InvalidReservedField(rsv));
        }

        let cmd = match cmd_byte {
            0x01 => Cmd::Connect,
            0x02 => Cmd::Bind,
            0x03 => Cmd::UdpAssociate,
            other => return Err(SocksError::CommandNotSupported(other)),
        };

        let dst = AddrPort::decode(reader, atyp).await?;

        Ok(ConnRequest {
            ver,
            cmd,
            rsv,
            dst,
        })
    }
}

impl fmt::Display for ConnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (ver={}, rsv={})", self.cmd, self.dst, self.ver, self.rsv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn round_trip_connect_ipv4() {
        let req = ConnRequest::new(Cmd::Connect, AddrPort::V4(Ipv4Addr::new(93, 184, 216, 34), 80));
        let bytes = req.to_bytes();
        let decoded = ConnRequest::decode(&mut Cursor::new(bytes)).await.unwrap();
        assert_eq!(decoded, req);
    }

    #[tokio::test]
    async fn round_trip_udp_associate_domain() {
        let req = ConnRequest::new(Cmd::UdpAssociate, AddrPort::Domain("example.com".into(), 1080));
        let bytes = req.to_bytes();
        let decoded = ConnRequest::decode(&mut Cursor::new(bytes)).await.unwrap();
        assert_eq!(decoded, req);
    }

    #[tokio::test]
    async fn decode_rejects_nonzero_reserved_byte() {
        let bytes = [0x05, 0x01, 0x01, 0x01, 127, 0, 0, 1, 0, 80];
        let err = ConnRequest::decode(&mut Cursor::new(bytes)).await.unwrap_err();
        assert!(matches!(err, SocksError::InvalidReservedField(0x01)));
    }

    #[tokio::test]
    async fn decode_rejects_bind_command() {
        // BIND is a known command code but unimplemented; dispatch, not decode,
        // is responsible for rejecting it (see SocksError::BindNotSupported).
        let bytes = [0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0, 80];
        let decoded = ConnRequest::decode(&mut Cursor::new(bytes)).await.unwrap();
        assert_eq!(decoded.cmd, Cmd::Bind);
    }

    #[tokio::test]
    async fn decode_rejects_unknown_command() {
        let bytes = [0x05, 0x09, 0x00, 0x01, 127, 0, 0, 1, 0, 80];
        let err = ConnRequest::decode(&mut Cursor::new(bytes)).await.unwrap_err();
        assert!(matches!(err, SocksError::CommandNotSupported(0x09)));
    }
}
