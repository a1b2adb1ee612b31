//! SOCKS5 address and port wire encoding/decoding.
//!
//! This module defines [`AddrPort`], a representation of a destination
//! address and port (IPv4, IPv6, or domain), together with the incremental
//! async decoder and the single-shot encoder used by every message that
//! carries an address (client requests, server replies, UDP encapsulation
//! headers).
//!
//! The address formats are defined in
//! [RFC 1928 §5, "Addressing"](<https://www.rfc-editor.org/rfc/rfc1928#section-5>).
//!
//! Example usage:
//! ```
//! use sockrs5::parse::AddrPort;
//! use std::net::Ipv4Addr;
//!
//! let addr = AddrPort::V4(Ipv4Addr::new(127, 0, 0, 1), 8080);
//! let mut buf = Vec::new();
//! addr.encode(&mut buf);
//! assert_eq!(buf, [0x01, 127, 0, 0, 1, 0x1F, 0x90]);
//! ```

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SocksError;

/// Address type byte for an IPv4 address (RFC 1928 §5).
pub const ATYP_V4: u8 = 0x01;
/// Address type byte for a domain name (RFC 1928 §5).
pub const ATYP_DOMAIN: u8 = 0x03;
/// Address type byte for an IPv6 address (RFC 1928 §5).
pub const ATYP_V6: u8 = 0x04;

/// Maximum length of a domain name field (the length prefix is a single byte).
pub const MAX_DOMAIN_LEN: usize = 255;

/// Represents a destination address and port.
///
/// SOCKS5 requests, replies, and UDP encapsulation headers all carry an
/// address field that may be:
/// - An IPv4 address (`ATYP = 0x01`).
/// - A domain name (`ATYP = 0x03`).
/// - An IPv6 address (`ATYP = 0x04`).
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum AddrPort {
    /// An IPv4 address and port.
    V4(Ipv4Addr, u16),

    /// An IPv6 address and port.
    V6(Ipv6Addr, u16),

    /// A domain name and port.
    Domain(String, u16),
}

impl AddrPort {
    /// Builds an [`AddrPort`] from a resolved [`std::net::SocketAddr`],
    /// used when encoding a reply around an address this server itself
    /// bound (a dial destination's local address, a UDP relay's bound
    /// port) rather than one read off the wire.
    pub fn from_socket(addr: std::net::SocketAddr) -> Self {
        match addr {
            std::net::SocketAddr::V4(v4) => AddrPort::V4(*v4.ip(), v4.port()),
            std::net::SocketAddr::V6(v6) => AddrPort::V6(*v6.ip(), v6.port()),
        }
    }

    /// The `ATYP` byte this address would be encoded with.
    pub fn atyp(&self) -> u8 {
        match self {
            AddrPort::V4(..) => ATYP_V4,
            AddrPort::V6(..) => ATYP_V6,
            AddrPort::Domain(..) => ATYP_DOMAIN,
        }
    }

    /// The port, regardless of address family.
    pub fn port(&self) -> u16 {
        match self {
            AddrPort::V4(_, port) | AddrPort::V6(_, port) | AddrPort::Domain(_, port) => *port,
        }
    }

    /// Encodes `ATYP | ADDR | PORT` into `buf`. Used by every message type
    /// that carries an address, so that a full reply/request is always
    /// assembled in one buffer before being written to the wire (RFC 1928
    /// leaves fragmentation behavior to the implementation; some clients
    /// misparse a reply split across TCP segments).
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.atyp());
        match self {
            AddrPort::V4(ip, port) => {
                buf.extend_from_slice(&ip.octets());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            AddrPort::V6(ip, port) => {
                buf.extend_from_slice(&ip.octets());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            AddrPort::Domain(name, port) => {
                buf.push(name.len() as u8);
                buf.extend_from_slice(name.as_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
            }
        }
    }

    /// Reads `ADDR | PORT` from `reader`, given an already-read `atyp` byte.
    /// Never peeks ahead: each field is read for exactly its declared length.
    pub async fn decode<R: AsyncRead + Unpin>(
        reader: &mut R,
        atyp: u8,
    ) -> Result<Self, SocksError> {
        let addr = match atyp {
            ATYP_V4 => {
                let mut octets = [0u8; 4];
                reader.read_exact(&mut octets).await?;
                AddrPort::V4(Ipv4Addr::from(octets), read_port(reader).await?)
            }
            ATYP_V6 => {
                let mut octets = [0u8; 16];
                reader.read_exact(&mut octets).await?;
                AddrPort::V6(Ipv6Addr::from(octets), read_port(reader).await?)
            }
            ATYP_DOMAIN => {
                let mut len = [0u8; 1];
                reader.read_exact(&mut len).await?;
                let mut name = vec![0u8; len[0] as usize];
                reader.read_exact(&mut name).await?;
                let name = String::from_utf8(name).map_err(|_| SocksError::InvalidDomain)?;
                AddrPort::Domain(name, read_port(reader).await?)
            }
            other => return Err(SocksError::AddressTypeNotSupported(other)),
        };
        Ok(addr)
    }

    /// Decodes the fixed-length address+port for a given `atyp` from an
    /// in-memory slice, used when the address already sits in a fully
    /// buffered UDP datagram rather than behind an `AsyncRead` stream.
    pub fn decode_slice(atyp: u8, bytes: &[u8]) -> Result<(Self, usize), SocksError> {
        match atyp {
            ATYP_V4 => {
                if bytes.len() < 6 {
                    return Err(SocksError::IncompleteVersionMessage);
                }
                let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
                let port = u16::from_be_bytes([bytes[4], bytes[5]]);
                Ok((AddrPort::V4(ip, port), 6))
            }
            ATYP_V6 => {
                if bytes.len() < 18 {
                    return Err(SocksError::IncompleteVersionMessage);
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&bytes[..16]);
                let port = u16::from_be_bytes([bytes[16], bytes[17]]);
                Ok((AddrPort::V6(Ipv6Addr::from(octets), port), 18))
            }
            ATYP_DOMAIN => {
                if bytes.is_empty() {
                    return Err(SocksError::IncompleteVersionMessage);
                }
                let len = bytes[0] as usize;
                if bytes.len() < 1 + len + 2 {
                    return Err(SocksError::IncompleteVersionMessage);
                }
                let name = String::from_utf8(bytes[1..1 + len].to_vec())
                    .map_err(|_| SocksError::InvalidDomain)?;
                let port = u16::from_be_bytes([bytes[1 + len], bytes[2 + len]]);
                Ok((AddrPort::Domain(name, port), 1 + len + 2))
            }
            other => Err(SocksError::AddressTypeNotSupported(other)),
        }
    }
}

async fn read_port<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u16, SocksError> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).await?;
    Ok(u16::from_be_bytes(buf))
}

impl fmt::Display for AddrPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrPort::V4(ip, port) => write!(f, "{}:{}", ip, port),
            AddrPort::V6(ip, port) => write!(f, "[{}]:{}", ip, port),
            AddrPort::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}
