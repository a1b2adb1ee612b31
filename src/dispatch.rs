//! Request dispatcher: reads the client's connection request and decides
//! what to do with it — dial out for CONNECT, start a UDP relay for UDP
//! ASSOCIATE, or fail for BIND/unknown commands.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, warn};

use crate::config::{Config, UdpPortMode};
use crate::conn::reply::{ConnReply, Rep};
use crate::conn::request::{Cmd, ConnRequest};
use crate::error::SocksError;
use crate::parse::AddrPort;
use crate::relay::udp::UdpRelaySession;

/// What the dispatcher decided to do with a request, once its reply has
/// already been written to the client.
pub enum Outcome {
    /// CONNECT succeeded; hand `dest` to the TCP relay together with the
    /// client stream.
    Connect(TcpStream),
    /// UDP ASSOCIATE succeeded against a process-lifetime fixed port; the
    /// reply has been sent and there is nothing further for this
    /// connection to do but idle until the client disconnects.
    UdpAssociateDone,
    /// UDP ASSOCIATE succeeded against a fresh ephemeral port; hand the
    /// session to the UDP relay runtime.
    UdpAssociate { session: UdpRelaySession },
}

/// Reads one [`ConnRequest`] from `stream` and dispatches it.
///
/// `local_addr` is the address the TCP control connection was accepted
/// on, used as the default `BND.ADDR` for UDP ASSOCIATE replies when
/// `config.udp_relay_server_ip` is unset.
pub async fn handle_request<S>(
    stream: &mut S,
    client_addr: SocketAddr,
    local_addr: SocketAddr,
    config: &Config,
) -> Result<Outcome, SocksError>
where
    S: AsyncWrite + Unpin + tokio::io::AsyncRead,
{
    let request = match ConnRequest::decode(stream).await {
        Ok(req) => req,
        Err(err) => {
            write_failure_reply(stream, Rep::GeneralFailure).await?;
            return Err(err);
        }
    };

    match request.cmd {
        Cmd::Connect => handle_connect(stream, &request, config.dial_timeout).await,
        Cmd::UdpAssociate => handle_udp_associate(stream, client_addr, local_addr, config).await,
        Cmd::Bind => {
            write_failure_reply(stream, Rep::CommandNotSupported).await?;
            Err(SocksError::BindNotSupported)
        }
    }
}

async fn handle_connect<S>(
    stream: &mut S,
    request: &ConnRequest,
    dial_timeout: Duration,
) -> Result<Outcome, SocksError>
where
    S: AsyncWrite + Unpin,
{
    let target = request.dst.to_string();

    match timeout_dial(&target, dial_timeout).await {
        Ok(dest) => {
            let bnd = dest
                .local_addr()
                .map(addr_port_from)
                .unwrap_or_else(|_| AddrPort::V4(std::net::Ipv4Addr::UNSPECIFIED, 0));
            let reply = ConnReply::new(Rep::Succeeded, bnd);
            if let Err(err) = stream.write_all(&reply.to_bytes()).await {
                warn!(%target, %err, "failed to write CONNECT success reply");
                let _ = write_failure_reply(stream, Rep::GeneralFailure).await;
                return Err(SocksError::Io(err));
            }
            debug!(%target, "CONNECT established");
            Ok(Outcome::Connect(dest))
        }
        Err(_) => {
            warn!(%target, "CONNECT failed to dial destination");
            write_failure_reply(stream, Rep::NetworkUnreachable).await?;
            Err(SocksError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "dial failed",
            )))
        }
    }
}

async fn timeout_dial(target: &str, dial_timeout: Duration) -> Result<TcpStream, std::io::Error> {
    tokio::time::timeout(dial_timeout, TcpStream::connect(target))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "dial timed out"))?
}

async fn handle_udp_associate<S>(
    stream: &mut S,
    client_addr: SocketAddr,
    local_addr: SocketAddr,
    config: &Config,
) -> Result<Outcome, SocksError>
where
    S: AsyncWrite + Unpin,
{
    let bind_ip = match config.udp_port_mode {
        UdpPortMode::Disabled => {
            write_failure_reply(stream, Rep::ConnectionNotAllowed).await?;
            return Err(SocksError::UdpAssociateNotAllowed);
        }
        UdpPortMode::Random => IpAddr::from([0, 0, 0, 0]),
        UdpPortMode::Fixed(_) => {
            // A fixed UDP listener is bound once, process-lifetime, by the
            // server core — not per request. Reply with the advertised
            // address and leave the control connection idling.
            let advertised = config.udp_relay_server_ip.unwrap_or(local_addr.ip());
            let port = match config.udp_port_mode {
                UdpPortMode::Fixed(p) => p,
                _ => unreachable!(),
            };
            let reply = ConnReply::new(Rep::Succeeded, AddrPort::from_socket(SocketAddr::new(advertised, port)));
            stream.write_all(&reply.to_bytes()).await?;
            return Ok(Outcome::UdpAssociateDone);
        }
    };

    let client_udp_socket = UdpSocket::bind(SocketAddr::new(bind_ip, 0))
        .await
        .map_err(|_| SocksError::OpenUdpConnection)?;
    let bound = client_udp_socket.local_addr()?;

    let advertised_ip = config.udp_relay_server_ip.unwrap_or(local_addr.ip());
    let reply = ConnReply::new(
        Rep::Succeeded,
        AddrPort::from_socket(SocketAddr::new(advertised_ip, bound.port())),
    );
    stream.write_all(&reply.to_bytes()).await?;

    debug!(%client_addr, bound_port = bound.port(), "UDP ASSOCIATE established");

    let session = UdpRelaySession::new(client_udp_socket, config.udp_exchange_lifetime);

    Ok(Outcome::UdpAssociate { session })
}

async fn write_failure_reply<S>(stream: &mut S, rep: Rep) -> Result<(), SocksError>
where
    S: AsyncWrite + Unpin,
{
    let reply = ConnReply::failure(rep);
    stream.write_all(&reply.to_bytes()).await?;
    Ok(())
}

fn addr_port_from(addr: SocketAddr) -> AddrPort {
    AddrPort::from_socket(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_to_live_listener_succeeds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let (mut client, mut server) = tokio::io::duplex(512);
        let request = ConnRequest::new(Cmd::Connect, AddrPort::from_socket(target_addr));
        client.write_all(&request.to_bytes()).await.unwrap();

        let client_addr: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let local_addr: SocketAddr = "10.0.0.1:1080".parse().unwrap();
        let config = Config::no_auth().with_defaults_applied();
        let outcome = handle_request(&mut server, client_addr, local_addr, &config)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Connect(_)));
    }

    #[tokio::test]
    async fn udp_associate_rejected_when_disabled() {
        let (mut client, mut server) = tokio::io::duplex(512);
        let request = ConnRequest::new(
            Cmd::UdpAssociate,
            AddrPort::V4(std::net::Ipv4Addr::UNSPECIFIED, 0),
        );
        client.write_all(&request.to_bytes()).await.unwrap();

        let client_addr: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let local_addr: SocketAddr = "10.0.0.1:1080".parse().unwrap();
        let config = Config::no_auth();
        let err = handle_request(&mut server, client_addr, local_addr, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::UdpAssociateNotAllowed));
    }

    #[tokio::test]
    async fn bind_command_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(512);
        let request = ConnRequest::new(Cmd::Bind, AddrPort::V4(std::net::Ipv4Addr::UNSPECIFIED, 0));
        client.write_all(&request.to_bytes()).await.unwrap();

        let client_addr: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let local_addr: SocketAddr = "10.0.0.1:1080".parse().unwrap();
        let config = Config::no_auth();
        let err = handle_request(&mut server, client_addr, local_addr, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::BindNotSupported));
    }
}
