//! SOCKS5 error definitions.
//!
//! This module defines [`SocksError`], the unified error type used across the
//! SOCKS5 implementation. Errors are grouped by protocol phase:
//! - **Version / Method Selection** (RFC 1928 §3).
//! - **Authentication** (RFC 1929).
//! - **Connection requests and replies** (RFC 1928 §4–5).
//! - **UDP encapsulation** (RFC 1928 §7).
//! - **General I/O errors** from the underlying transport.
//!
//! Each variant carries enough context to help diagnose protocol violations
//! or unexpected input during parsing.

use thiserror::Error;

/// Represents all possible errors that can occur while running the SOCKS5 server.
#[derive(Debug, Error)]
pub enum SocksError {
    // ===== Version / Method Selection =====
    /// The client requested an unsupported SOCKS protocol version.
    #[error("unsupported SOCKS version: 0x{0:02x}")]
    VersionNotSupported(u8),

    /// The client's version message was truncated and missing method bytes.
    #[error("incomplete version message")]
    IncompleteVersionMessage,

    /// None of the methods the client offered are acceptable to this server.
    #[error("no acceptable authentication method")]
    AuthMethodNotSupport,

    // ===== Authentication (RFC 1929) =====
    /// The client used an unsupported username/password sub-negotiation version.
    #[error("authentication sub-negotiation version not supported: 0x{0:02x}")]
    MethodVersionNotSupported(u8),

    /// The username or password did not match `Config::password_checker`.
    #[error("password authentication failed")]
    PasswordAuthFailure,

    /// `Config::auth_method` is `Password` but no checker was configured.
    #[error("password_checker not configured for Password auth method")]
    PasswordCheckerNotSet,

    // ===== Request / Reply (RFC 1928 §4-6) =====
    /// The reserved byte in the client request was not `0x00`.
    #[error("invalid reserved field: 0x{0:02x}")]
    InvalidReservedField(u8),

    /// The client specified an invalid or unsupported address type.
    #[error("address type not supported: 0x{0:02x}")]
    AddressTypeNotSupported(u8),

    /// A domain name address could not be decoded as UTF-8.
    #[error("invalid domain name")]
    InvalidDomain,

    /// The client requested a command other than CONNECT/BIND/UDP ASSOCIATE.
    #[error("unsupported command: 0x{0:02x}")]
    CommandNotSupported(u8),

    /// BIND was requested; it is not implemented by this server.
    #[error("BIND command is not supported")]
    BindNotSupported,

    // ===== UDP encapsulation (RFC 1928 §7) =====
    /// The reserved `RSV` field of a UDP datagram header was not `0x0000`.
    #[error("udp forward header version not supported")]
    UdpForwardVersionNotSupported,

    /// The `FRAG` field of a UDP datagram header was non-zero.
    #[error("udp fragment reassembly not supported")]
    UdpReassembleNotSupported,

    /// A fresh per-exchange destination socket could not be opened.
    #[error("failed to open udp relay socket")]
    OpenUdpConnection,

    /// `Config::udp_port_mode` is `Disabled` but UDP ASSOCIATE was requested.
    #[error("udp associate not allowed by configuration")]
    UdpAssociateNotAllowed,

    // ===== General =====
    /// A general I/O error occurred in the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
