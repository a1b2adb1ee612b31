//! SOCKS5 handshake messages (RFC 1928).
//!
//! This module defines the messages exchanged during the initial
//! client–server handshake:
//!
//! - [`VersionMessage`] → sent by the client to advertise supported
//!   authentication methods.
//! - [`MethodSelection`] → sent by the server to choose one method.
//!
//! These are defined in [RFC 1928, section 3](https://www.rfc-editor.org/rfc/rfc1928#section-3).

use tokio::io::{AsyncRead, AsyncReadExt};

use super::method::*;
use crate::error::SocksError;

const SOCKS5_VERSION: u8 = 0x05;

/// Client's version/methods message.
///
/// This message is sent by the client immediately after establishing
/// a TCP connection, and lists the authentication methods it supports.
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
///
/// - `VER`: SOCKS version (`0x05`).
/// - `NMETHODS`: number of methods that follow.
/// - `METHODS`: list of supported authentication methods.
///
/// Defined in RFC 1928, section 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    /// The SOCKS protocol version (must be `0x05`).
    pub ver: u8,
    /// The list of authentication methods supported by the client.
    pub methods: Vec<Method>,
}

impl VersionMessage {
    /// Creates a new [`VersionMessage`] with the given supported methods.
    ///
    /// # Example
    /// ```
    /// use sockrs5::msg::message::VersionMessage;
    /// use sockrs5::msg::method::{FixedMethod, Method};
    ///
    /// let msg = VersionMessage::new(vec![Method::Fixed(FixedMethod::NoAuth)]);
    /// assert_eq!(msg.ver, 0x05);
    /// ```
    pub fn new(methods: Vec<Method>) -> Self {
        Self {
            ver: SOCKS5_VERSION,
            methods,
        }
    }

    /// Serializes this message: `VER | NMETHODS | METHODS`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.methods.len());
        buf.push(self.ver);
        buf.push(self.methods.len() as u8);
        buf.extend(self.methods.iter().map(|m| m.to_u8()));
        buf
    }

    /// Reads a [`VersionMessage`] from an async stream.
    ///
    /// Reads `VER` and `NMETHODS` first, then reads exactly `NMETHODS`
    /// method bytes — no heuristic buffering.
    pub async fn decode<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, SocksError> {
        let mut head = [0u8; 2];
        reader.read_exact(&mut head).await?;
        let (ver, nmethods) = (head[0], head[1] as usize);
        if ver != SOCKS5_VERSION {
            return Err(SocksError::VersionNotSupported(ver));
        }

        let mut raw = vec![0u8; nmethods];
        reader.read_exact(&mut raw).await?;
        let methods = raw.into_iter().map(Method::from_u8).collect();

        Ok(Self { ver, methods })
    }
}

/// Server's method selection message.
///
/// This message is sent in response to a [`VersionMessage`],
/// informing the client which authentication method has been chosen.
///
/// ```text
/// +----+--------+
/// |VER | METHOD |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
///
/// - `VER`: SOCKS version (`0x05`).
/// - `METHOD`: one of the methods proposed by the client, or `0xFF`
///   if none are acceptable.
///
/// Defined in RFC 1928, section 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSelection {
    /// The SOCKS protocol version (must be `0x05`).
    pub ver: u8,
    /// The authentication method selected by the server.
    pub method: Method,
}

impl MethodSelection {
    /// Creates a new [`MethodSelection`] with the given method.
    ///
    /// # Example
    /// ```
    /// use sockrs5::msg::message::MethodSelection;
    /// use sockrs5::msg::method::{FixedMethod, Method};
    ///
    /// let sel = MethodSelection::new(Method::Fixed(FixedMethod::NoAuth));
    /// assert_eq!(sel.to_bytes(), [0x05, 0x00]);
    /// ```
    pub fn new(method: Method) -> Self {
        Self {
            ver: SOCKS5_VERSION,
            method,
        }
    }

    /// Serializes this [`MethodSelection`] into a 2-byte array.
    pub fn to_bytes(&self) -> [u8; 2] {
        [self.ver, self.method.to_u8()]
    }

    /// Reads a [`MethodSelection`] from an async stream.
    pub async fn decode<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, SocksError> {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await?;
        if buf[0] != SOCKS5_VERSION {
            return Err(SocksError::VersionNotSupported(buf[0]));
        }
        Ok(Self {
            ver: buf[0],
            method: Method::from_u8(buf[1]),
        })
    }
}
