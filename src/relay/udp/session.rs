//! The running UDP ASSOCIATE relay for one client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{interval, timeout};
use tracing::{debug, warn};

use super::codec::UdpClientForwardMessage;
use super::exchange::UdpExchange;
use crate::error::SocksError;
use crate::parse::AddrPort;

const MAX_UDP_BUF_LENGTH: usize = 65507;
const SWEEP_INTERVAL: Duration = Duration::from_secs(2);
const READ_DEADLINE: Duration = Duration::from_secs(3);

/// A running UDP ASSOCIATE relay: one client-facing UDP socket plus a
/// table of per-destination exchanges keyed by the client's observed
/// `"ip:port"` source address (a plain string key, matching the Go
/// original's `fmt.Sprintf("%s:%d", ...)` map key rather than a
/// [`SocketAddr`] key).
pub struct UdpRelaySession {
    client_udp_socket: Arc<UdpSocket>,
    lifetime: Duration,
    exchanges: Arc<Mutex<HashMap<String, Arc<UdpExchange>>>>,
    /// Cloned into every spawned [`UdpExchange`]'s egress loop so a hard
    /// socket error can evict its own table entry immediately instead of
    /// waiting for the sweeper.
    evict_tx: mpsc::UnboundedSender<String>,
    evict_rx: Option<mpsc::UnboundedReceiver<String>>,
}

impl UdpRelaySession {
    /// Wraps an already-bound client-facing UDP socket into a new,
    /// not-yet-running relay session.
    pub fn new(client_udp_socket: UdpSocket, lifetime: Duration) -> Self {
        let (evict_tx, evict_rx) = mpsc::unbounded_channel();
        Self {
            client_udp_socket: Arc::new(client_udp_socket),
            lifetime,
            exchanges: Arc::new(Mutex::new(HashMap::new())),
            evict_tx,
            evict_rx: Some(evict_rx),
        }
    }

    /// Runs the relay until its control connection closes (`Some`) or a
    /// fatal I/O error occurs, then tears everything down in order: every
    /// exchange is signaled and awaited closed, then the client-facing UDP
    /// socket is dropped, then (if present) the control TCP connection is
    /// dropped — matching the Go original's `UdpRelayServer.Close()`.
    ///
    /// `control_tcp` is `None` for a fixed-port relay, which runs for the
    /// process's lifetime with no per-client control coupling.
    pub async fn run(mut self, control_tcp: Option<TcpStream>) -> Result<(), SocksError> {
        let (tcp_done_tx, tcp_done_rx) = oneshot::channel::<()>();

        let reader_task = control_tcp.map(|mut tcp| {
            tokio::spawn(async move {
                let mut buf = [0u8; 1];
                loop {
                    match tcp.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => continue,
                    }
                }
                let _ = tcp_done_tx.send(());
            })
        });

        let sweeper = {
            let exchanges = self.exchanges.clone();
            let lifetime = self.lifetime;
            tokio::spawn(async move { sweep_loop(exchanges, lifetime).await })
        };

        let mut evict_rx = self
            .evict_rx
            .take()
            .expect("evict_rx is only taken once, by run()");
        let evictor = {
            let exchanges = self.exchanges.clone();
            tokio::spawn(async move {
                while let Some(host) = evict_rx.recv().await {
                    let removed = exchanges.lock().await.remove(&host);
                    if let Some(exchange) = removed {
                        debug!(%host, "evicting udp exchange after a hard egress error");
                        exchange.close().await;
                    }
                }
            })
        };

        let result = self.ingress_loop(tcp_done_rx).await;

        sweeper.abort();
        evictor.abort();
        if let Some(task) = reader_task {
            task.abort();
        }

        let table = std::mem::take(&mut *self.exchanges.lock().await);
        for (_, exchange) in table {
            exchange.close().await;
        }
        drop(self.client_udp_socket);

        result
    }

    async fn ingress_loop(&self, mut tcp_done: oneshot::Receiver<()>) -> Result<(), SocksError> {
        let mut buf = vec![0u8; MAX_UDP_BUF_LENGTH];
        loop {
            tokio::select! {
                _ = &mut tcp_done => {
                    debug!("control connection closed, tearing down UDP relay");
                    return Ok(());
                }
                result = timeout(READ_DEADLINE, self.client_udp_socket.recv_from(&mut buf)) => {
                    match result {
                        Err(_) => continue,
                        Ok(Err(err)) => return Err(SocksError::Io(err)),
                        Ok(Ok((n, from))) => {
                            // A malformed header (bad RSV/FRAG/ATYP) is a
                            // session-fatal protocol violation, not a
                            // per-exchange one — it fails the whole relay,
                            // matching the Go original's HandleConnection
                            // returning straight out of its read loop.
                            let message = UdpClientForwardMessage::decode(&buf[..n])?;
                            if let Err(err) = self.forward_to_destination(from, message).await {
                                warn!(%err, %from, "dropping UDP datagram for this exchange");
                            }
                        }
                    }
                }
            }
        }
    }

    async fn forward_to_destination(
        &self,
        from: SocketAddr,
        message: UdpClientForwardMessage,
    ) -> Result<(), SocksError> {
        let host = format!("{}:{}", from.ip(), from.port());

        let exchange = {
            let mut table = self.exchanges.lock().await;
            match table.get(&host) {
                Some(existing) => existing.clone(),
                None => {
                    let destination_socket = UdpSocket::bind(("0.0.0.0", 0))
                        .await
                        .map_err(|_| SocksError::OpenUdpConnection)?;
                    let exchange = UdpExchange::spawn(
                        from,
                        destination_socket,
                        self.lifetime,
                        self.client_udp_socket.clone(),
                        host.clone(),
                        self.evict_tx.clone(),
                    );
                    table.insert(host, exchange.clone());
                    exchange
                }
            }
        };

        exchange.refresh(self.lifetime).await;
        let dst_addr = resolve(&message.dst).await?;
        exchange.destination_socket.send_to(&message.data, dst_addr).await?;
        Ok(())
    }
}

async fn sweep_loop(exchanges: Arc<Mutex<HashMap<String, Arc<UdpExchange>>>>, _lifetime: Duration) {
    let mut ticker = interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;

        let expired: Vec<String> = {
            let table = exchanges.lock().await;
            let mut expired = Vec::new();
            for (host, exchange) in table.iter() {
                if exchange.is_expired().await {
                    expired.push(host.clone());
                }
            }
            expired
        };

        for host in expired {
            let removed = exchanges.lock().await.remove(&host);
            if let Some(exchange) = removed {
                exchange.close().await;
            }
        }
    }
}

async fn resolve(addr: &AddrPort) -> Result<SocketAddr, SocksError> {
    match addr {
        AddrPort::V4(ip, port) => Ok(SocketAddr::new((*ip).into(), *port)),
        AddrPort::V6(ip, port) => Ok(SocketAddr::new((*ip).into(), *port)),
        AddrPort::Domain(name, port) => {
            let mut addrs = tokio::net::lookup_host((name.as_str(), *port)).await?;
            addrs.next().ok_or_else(|| {
                SocksError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no addresses resolved for domain",
                ))
            })
        }
    }
}
