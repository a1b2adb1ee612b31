//! The SOCKS5 server core: binds a listener, applies configuration
//! defaults, and accept-loops, spawning one task per connection.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{error, info, warn};

use crate::auth;
use crate::config::{Config, UdpPortMode};
use crate::dispatch::{self, Outcome};
use crate::error::SocksError;
use crate::relay::tcp;
use crate::relay::udp::UdpRelaySession;

/// A bound SOCKS5 server, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    config: Config,
}

impl Server {
    /// Binds a listener at `addr` with the given configuration. Defaults
    /// for zero-valued durations are applied once `run` starts, mirroring
    /// the Go original's `Socks5Server.init()`.
    pub async fn bind(addr: SocketAddr, config: Config) -> Result<Self, SocksError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, config })
    }

    /// Returns the address this server is actually listening on (useful
    /// when `addr` was `:0` and the OS picked an ephemeral port).
    pub fn local_addr(&self) -> Result<SocketAddr, SocksError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the server forever: applies configuration defaults, optionally
    /// starts the fixed-port UDP relay, then accept-loops.
    ///
    /// Accept errors are logged, not fatal — matching the Go original's
    /// `Run()`, minus the bug where it would still spawn a handler on a
    /// connection that failed to accept.
    pub async fn run(self) -> Result<(), SocksError> {
        let config = self.config.with_defaults_applied();
        config.validate()?;

        if let UdpPortMode::Fixed(port) = config.udp_port_mode {
            spawn_fixed_udp_relay(port, config.udp_exchange_lifetime).await?;
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, client_addr)) => {
                    let config = config.clone();
                    let local_addr = self.local_addr()?;
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, client_addr, local_addr, &config).await {
                            warn!(%client_addr, %err, "connection ended with an error");
                        }
                    });
                }
                Err(err) => {
                    error!(%err, "failed to accept connection");
                }
            }
        }
    }
}

async fn spawn_fixed_udp_relay(port: u16, lifetime: std::time::Duration) -> Result<(), SocksError> {
    let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
    info!(port, "UDP relay listening on fixed port");
    let session = UdpRelaySession::new(socket, lifetime);
    tokio::spawn(async move {
        if let Err(err) = session.run(None).await {
            error!(%err, "fixed-port UDP relay ended with an error");
        }
    });
    Ok(())
}

async fn handle_connection(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    local_addr: SocketAddr,
    config: &Config,
) -> Result<(), SocksError> {
    auth::negotiate(&mut stream, config).await?;

    match dispatch::handle_request(&mut stream, client_addr, local_addr, config).await? {
        Outcome::Connect(mut dest) => {
            tcp::copy_bidirectional(&mut stream, &mut dest).await?;
            Ok(())
        }
        Outcome::UdpAssociateDone => {
            // Reply already sent; idle on the control connection so we
            // notice when the client disconnects.
            let mut buf = [0u8; 1];
            loop {
                match tokio::io::AsyncReadExt::read(&mut stream, &mut buf).await {
                    Ok(0) | Err(_) => return Ok(()),
                    Ok(_) => continue,
                }
            }
        }
        Outcome::UdpAssociate { session } => session.run(Some(stream)).await,
    }
}
