//! SOCKS5 server connection reply (RFC 1928 §6).
//!
//! After processing a request, the server replies with:
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//!
//! o VER       - protocol version: X'05'
//! o REP       - reply field, see below
//! o RSV       - reserved, must be 0x00
//! o ATYP      - address type of BND.ADDR
//! o BND.ADDR  - server bound address
//! o BND.PORT  - server bound port in network byte order
//!
//! The BND fields are meaningful in BIND/UDP_ASSOCIATE, but may be ignored in CONNECT.
//! ```
//!
//! A reply is always assembled into a single buffer and written with one
//! `write_all` call — some clients misparse a reply that arrives split
//! across TCP segments, so the four header bytes are never flushed ahead
//! of the address.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SocksError;
use crate::parse::AddrPort;

const SOCKS5_VERSION: u8 = 0x05;

/// Reply codes (`REP`) for SOCKS5 connection replies (RFC 1928 §6).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rep {
    /// 0x00 - Succeeded
    Succeeded = 0x00,
    /// 0x01 - General SOCKS server failure
    GeneralFailure = 0x01,
    /// 0x02 - Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// 0x03 - Network unreachable
    NetworkUnreachable = 0x03,
    /// 0x04 - Host unreachable
    HostUnreachable = 0x04,
    /// 0x05 - Connection refused by destination host
    ConnectionRefused = 0x05,
    /// 0x06 - TTL expired
    TTLExpired = 0x06,
    /// 0x07 - Command not supported
    CommandNotSupported = 0x07,
    /// 0x08 - Address type not supported
    AddressTypeNotSupported = 0x08,
}

/// Represents a SOCKS5 server reply (RFC 1928 §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnReply {
    /// Protocol version (`VER`), must be 0x05.
    pub ver: u8,
    /// Reply field (`REP`): success or error status.
    pub rep: Rep,
    /// Reserved byte (`RSV`), must be 0x00.
    pub rsv: u8,
    /// Bound address and port (`BND.ADDR`, `BND.PORT`).
    pub bnd: AddrPort,
}

impl ConnReply {
    /// Creates a new `ConnReply`.
    pub fn new(rep: Rep, bnd: AddrPort) -> Self {
        Self {
            ver: SOCKS5_VERSION,
            rep,
            rsv: 0x00,
            bnd,
        }
    }

    /// A failure reply carrying the conventional all-zero IPv4 bound
    /// address, used whenever the server cannot offer a meaningful
    /// `BND.ADDR`/`BND.PORT` (malformed request, refused command, I/O
    /// failure before a socket exists).
    pub fn failure(rep: Rep) -> Self {
        use std::net::Ipv4Addr;
        Self::new(rep, AddrPort::V4(Ipv4Addr::UNSPECIFIED, 0))
    }

    /// Serializes the reply into a single buffer: `VER | REP | RSV | ATYP | BND.ADDR | BND.PORT`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![self.ver, self.rep as u8, self.rsv];
        self.bnd.encode(&mut buf);
        buf
    }

    /// Reads a [`ConnReply`] from an async stream.
    pub async fn decode<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, SocksError> {
        let mut head = [0u8; 4];
        reader.read_exact(&mut head).await?;
        let [ver, rep_byte, rsv, atyp] = head;

        if ver != SOCKS5_VERSION {
            return Err(SocksError::VersionNotSupported(ver));
        }

        let rep = match rep_byte {
            0x00 => Rep::Succeeded,
            0x01 => Rep::GeneralFailure,
            0x02 => Rep::ConnectionNotAllowed,
            0x03 => Rep::NetworkUnreachable,
            0x04 => Rep::HostUnreachable,
            0x05 => Rep::ConnectionRefused,
            0x06 => Rep::TTLExpired,
            0x07 => Rep::CommandNotSupported,
            0x08 => Rep::AddressTypeNotSupported,
            other => return Err(SocksError::AddressTypeNotSupported(other)),
        };

        let bnd = AddrPort::decode(reader, atyp).await?;

        Ok(ConnReply { ver, rep, rsv, bnd })
    }
}
