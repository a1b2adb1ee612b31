//! Server configuration.
//!
//! [`Config`] is the sole external input accepted by this crate's core —
//! no config file parsing, environment lookup, or interactive prompting
//! happens here. A caller builds a `Config` however it likes (hardcoded,
//! parsed from its own config format, read from flags) and hands it to
//! [`crate::server::Server::bind`].

use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SocksError;

/// Default dial timeout applied when [`Config::dial_timeout`] is zero.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);
/// Default UDP exchange idle lifetime applied when
/// [`Config::udp_exchange_lifetime`] is zero.
pub const DEFAULT_UDP_EXCHANGE_LIFETIME: Duration = Duration::from_secs(60);

/// A username/password validator: returns `true` if the pair is accepted.
///
/// `Arc`-wrapped (rather than the plain `Box` a single-owner `Socks5`
/// struct would use) because a `Config` is cloned into every
/// per-connection task.
pub type PasswordChecker = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// The authentication method a [`Server`](crate::server::Server) enforces.
#[derive(Clone)]
pub enum AuthMethod {
    /// Accept clients without any authentication sub-negotiation.
    NoAuth,
    /// Require RFC 1929 username/password authentication, checked by
    /// [`Config::password_checker`].
    Password,
}

/// How (or whether) this server offers UDP ASSOCIATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpPortMode {
    /// Reject every UDP ASSOCIATE request.
    Disabled,
    /// Bind a fresh ephemeral UDP socket per UDP ASSOCIATE request, coupled
    /// to the requesting TCP control connection.
    Random,
    /// Bind one UDP socket at a fixed port, shared by all clients, for the
    /// lifetime of the server. Has no TCP control coupling.
    Fixed(u16),
}

/// Server-wide configuration, cloned into every connection task.
#[derive(Clone)]
pub struct Config {
    /// Which authentication method clients must use.
    pub auth_method: AuthMethod,
    /// Timeout applied to the dial-out when handling CONNECT. Zero means
    /// "apply the default" — see [`Config::with_defaults_applied`].
    pub dial_timeout: Duration,
    /// Username/password validator. Required when `auth_method` is
    /// [`AuthMethod::Password`]; ignored otherwise.
    pub password_checker: Option<PasswordChecker>,
    /// The address advertised in UDP ASSOCIATE replies as `BND.ADDR`. If
    /// unset, the server falls back to the address the TCP control
    /// connection was accepted on.
    pub udp_relay_server_ip: Option<IpAddr>,
    /// Whether and how this server offers UDP ASSOCIATE.
    pub udp_port_mode: UdpPortMode,
    /// How long a UDP exchange may sit idle before the sweeper closes it.
    /// Zero means "apply the default".
    pub udp_exchange_lifetime: Duration,
}

impl Config {
    /// A `NoAuth`-only configuration with UDP ASSOCIATE disabled — the
    /// minimal configuration that accepts any client for CONNECT alone.
    pub fn no_auth() -> Self {
        Self {
            auth_method: AuthMethod::NoAuth,
            dial_timeout: Duration::ZERO,
            password_checker: None,
            udp_relay_server_ip: None,
            udp_port_mode: UdpPortMode::Disabled,
            udp_exchange_lifetime: Duration::ZERO,
        }
    }

    /// Returns a copy of this configuration with zero-valued durations
    /// replaced by their defaults. Called once by `Server::run`, the way
    /// the Go original calls `Socks5Server.init()` before serving.
    pub fn with_defaults_applied(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.dial_timeout.is_zero() {
            cfg.dial_timeout = DEFAULT_DIAL_TIMEOUT;
        }
        if cfg.udp_exchange_lifetime.is_zero() {
            cfg.udp_exchange_lifetime = DEFAULT_UDP_EXCHANGE_LIFETIME;
        }
        cfg
    }

    /// Validates configuration invariants that can only be checked once
    /// all fields are set: a `Password` auth method needs a checker.
    pub fn validate(&self) -> Result<(), SocksError> {
        if matches!(self.auth_method, AuthMethod::Password) && self.password_checker.is_none() {
            return Err(SocksError::PasswordCheckerNotSet);
        }
        Ok(())
    }
}

/// The external, caller-supplied shape of a server configuration — the
/// typed handoff point for a config-file or CLI layer that lives outside
/// this crate. No parsing of any file format happens here; this only
/// converts already-parsed plain data into a [`Config`] plus the listen
/// address.
///
/// Mirrors the Go original's config-file struct passed into
/// `NewSocks5Server`, minus the `cobra`/`viper` wiring that reads it from
/// disk (out of scope for this crate).
pub struct RawConfig {
    /// Listen address, e.g. `"127.0.0.1"`.
    pub ip: String,
    /// Listen port.
    pub port: u16,
    /// Username for password authentication. Empty disables password
    /// authentication and selects [`AuthMethod::NoAuth`].
    pub username: String,
    /// Password for password authentication, checked against `username`
    /// verbatim (a real deployment should supply a hashed-comparison
    /// checker of its own via [`Config::password_checker`]; this
    /// conversion only wires the exact-match case).
    pub password: String,
    /// Address advertised in UDP ASSOCIATE replies.
    pub udp_relay_server_ip: Option<IpAddr>,
    /// UDP listen port: a negative value disables UDP ASSOCIATE, `0`
    /// requests a fresh ephemeral port per association, any positive
    /// value fixes the UDP port.
    pub udp_port: i32,
    /// Dial timeout in seconds. `0` applies the default.
    pub timeout_secs: u64,
    /// UDP exchange idle lifetime in seconds. `0` applies the default.
    pub udp_conn_lifetime_secs: u64,
}

impl TryFrom<RawConfig> for (Config, SocketAddr) {
    type Error = SocksError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let addr: SocketAddr = format!("{}:{}", raw.ip, raw.port)
            .parse()
            .map_err(|_| SocksError::InvalidReservedField(0))?;

        let (auth_method, password_checker) = if raw.username.is_empty() {
            (AuthMethod::NoAuth, None)
        } else {
            let expected_user = raw.username.clone();
            let expected_pass = raw.password.clone();
            let checker: PasswordChecker =
                Arc::new(move |u: &str, p: &str| u == expected_user && p == expected_pass);
            (AuthMethod::Password, Some(checker))
        };

        let udp_port_mode = match raw.udp_port {
            p if p < 0 => UdpPortMode::Disabled,
            0 => UdpPortMode::Random,
            p => UdpPortMode::Fixed(p as u16),
        };

        let config = Config {
            auth_method,
            dial_timeout: Duration::from_secs(raw.timeout_secs),
            password_checker,
            udp_relay_server_ip: raw.udp_relay_server_ip,
            udp_port_mode,
            udp_exchange_lifetime: Duration::from_secs(raw.udp_conn_lifetime_secs),
        };

        Ok((config, addr))
    }
}
