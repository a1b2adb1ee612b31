//! Authentication request message for SOCKS5 username/password authentication.
//!
//! Defined in [RFC 1929, section 2](https://www.rfc-editor.org/rfc/rfc1929#section-2).
//!
//! After selecting username/password authentication during method negotiation
//! ([RFC 1928, section 3](https://www.rfc-editor.org/rfc/rfc1928#section-3)),
//! the client sends a request of the form:
//!
//! ```text
//! +----+------+----------+------+----------+
//! |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
//! +----+------+----------+------+----------+
//! |  1 |  1   | 1–255    |  1   | 1–255    |
//! +----+------+----------+------+----------+
//!
//! o VER     - subnegotiation version (always 0x01)
//! o ULEN    - length of username in bytes
//! o UNAME   - username (1–255 bytes)
//! o PLEN    - length of password in bytes
//! o PASSWD  - password (1–255 bytes)
//! ```
//!
//! The wire layout packs `ULEN` and `UNAME` contiguously, with `PLEN`
//! trailing the username rather than leading its own fixed-size header.
//! The decoder therefore reads `ULEN + 1` bytes after the version byte —
//! the username followed by the `PLEN` byte — before it knows how many
//! more bytes to read for the password.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SocksError;

const AUTH_VERSION: u8 = 0x01;

/// Represents an authentication request from a client (RFC 1929 §2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Authentication protocol version (`VER`), always `0x01`.
    pub ver: u8,
    /// The username (`UNAME`).
    pub uname: String,
    /// The password (`PASSWD`).
    pub passwd: String,
}

impl AuthRequest {
    /// Creates a new `AuthRequest`.
    ///
    /// # Arguments
    ///
    /// * `uname` - Username for authentication.
    /// * `passwd` - Password for authentication.
    pub fn new(uname: String, passwd: String) -> Self {
        Self {
            ver: AUTH_VERSION,
            uname,
            passwd,
        }
    }

    /// Serializes the request into `VER | ULEN | UNAME | PLEN | PASSWD`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + self.uname.len() + self.passwd.len());
        buf.push(self.ver);
        buf.push(self.uname.len() as u8);
        buf.extend_from_slice(self.uname.as_bytes());
        buf.push(self.passwd.len() as u8);
        buf.extend_from_slice(self.passwd.as_bytes());
        buf
    }

    /// Reads an [`AuthRequest`] from an async stream.
    ///
    /// Reads `VER` and `ULEN`, then reads exactly `ULEN + 1` bytes — the
    /// username followed by the trailing `PLEN` byte — and finally reads
    /// exactly `PLEN` bytes for the password. No peeking: each field is
    /// read for exactly its declared length.
    pub async fn decode<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, SocksError> {
        let mut head = [0u8; 2];
        reader.read_exact(&mut head).await?;
        let (ver, ulen) = (head[0], head[1] as usize);
        if ver != AUTH_VERSION {
            return Err(SocksError::MethodVersionNotSupported(ver));
        }

        let mut uname_and_plen = vec![0u8; ulen + 1];
        reader.read_exact(&mut uname_and_plen).await?;
        let uname = String::from_utf8_lossy(&uname_and_plen[..ulen]).into_owned();
        let plen = uname_and_plen[ulen] as usize;

        let mut passwd = vec![0u8; plen];
        reader.read_exact(&mut passwd).await?;
        let passwd = String::from_utf8_lossy(&passwd).into_owned();

        Ok(Self { ver, uname, passwd })
    }
}
