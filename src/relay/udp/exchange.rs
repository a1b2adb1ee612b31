//! A single client-to-destination UDP exchange: one destination socket,
//! shared by every datagram the client sends to that destination, torn
//! down either by idle expiry or by the owning session shutting down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use super::codec::encode_server_forward;

const MAX_UDP_BUF_LENGTH: usize = 65507;
const READ_DEADLINE: Duration = Duration::from_secs(3);

/// One client↔destination UDP flow within a [`super::session::UdpRelaySession`].
///
/// Shutdown is a rendezvous, not a fire-and-forget signal: [`close`] sends
/// on `close_signal` and then waits on `closed_ack`, so the caller knows
/// the egress loop has actually stopped (and the destination socket is
/// about to be dropped) before it removes the table entry. This mirrors
/// the Go original's `Closed`/`ClosedOk` unbuffered channel pair.
///
/// [`close`]: UdpExchange::close
pub struct UdpExchange {
    /// The client address datagrams from the destination are forwarded to.
    pub client_addr: SocketAddr,
    /// The socket used to talk to the destination.
    pub destination_socket: Arc<UdpSocket>,
    expires_at: Arc<Mutex<Instant>>,
    close_signal: Mutex<Option<oneshot::Sender<()>>>,
    closed_ack: Mutex<Option<oneshot::Receiver<()>>>,
}

impl UdpExchange {
    /// Spawns the egress loop for a fresh exchange and returns its handle.
    ///
    /// `client_udp_socket` is the session's client-facing socket, used by
    /// the egress loop to forward whatever the destination sends back.
    /// `host` is the exchange table key this instance was inserted under;
    /// `evict_tx` lets the egress loop tell the owning
    /// [`super::session::UdpRelaySession`] to remove this entry the
    /// moment a hard socket error ends the loop on its own, rather than
    /// waiting on the sweeper or session shutdown to notice.
    pub fn spawn(
        client_addr: SocketAddr,
        destination_socket: UdpSocket,
        lifetime: Duration,
        client_udp_socket: Arc<UdpSocket>,
        host: String,
        evict_tx: mpsc::UnboundedSender<String>,
    ) -> Arc<Self> {
        let destination_socket = Arc::new(destination_socket);
        let expires_at = Arc::new(Mutex::new(Instant::now() + lifetime));
        let (close_tx, close_rx) = oneshot::channel();
        let (ack_tx, ack_rx) = oneshot::channel();

        let exchange = Arc::new(Self {
            client_addr,
            destination_socket: destination_socket.clone(),
            expires_at: expires_at.clone(),
            close_signal: Mutex::new(Some(close_tx)),
            closed_ack: Mutex::new(Some(ack_rx)),
        });

        tokio::spawn(egress_loop(
            destination_socket,
            client_addr,
            client_udp_socket,
            expires_at,
            lifetime,
            close_rx,
            ack_tx,
            host,
            evict_tx,
        ));

        exchange
    }

    /// Pushes this exchange's expiry out by `lifetime` from now. Called on
    /// every datagram seen in either direction.
    pub async fn refresh(&self, lifetime: Duration) {
        *self.expires_at.lock().await = Instant::now() + lifetime;
    }

    /// Whether this exchange has sat idle past its expiry.
    pub async fn is_expired(&self) -> bool {
        Instant::now() > *self.expires_at.lock().await
    }

    /// Signals the egress loop to stop and waits for its acknowledgment
    /// that it has. Safe to call more than once; later calls are no-ops.
    pub async fn close(&self) {
        if let Some(tx) = self.close_signal.lock().await.take() {
            let _ = tx.send(());
        }
        if let Some(rx) = self.closed_ack.lock().await.take() {
            let _ = rx.await;
        }
    }
}

async fn egress_loop(
    destination_socket: Arc<UdpSocket>,
    client_addr: SocketAddr,
    client_udp_socket: Arc<UdpSocket>,
    expires_at: Arc<Mutex<Instant>>,
    lifetime: Duration,
    mut close_signal: oneshot::Receiver<()>,
    closed_ack: oneshot::Sender<()>,
    host: String,
    evict_tx: mpsc::UnboundedSender<String>,
) {
    let mut buf = vec![0u8; MAX_UDP_BUF_LENGTH];
    // Requested by the session (sweeper or shutdown): it already owns
    // removing this entry from the table, so no eviction signal needed.
    // A hard socket error, by contrast, ends the loop on its own — the
    // table still has to be told so a dead exchange doesn't keep eating
    // client datagrams until the next sweep.
    let evict_on_exit = loop {
        tokio::select! {
            _ = &mut close_signal => break false,
            result = tokio::time::timeout(READ_DEADLINE, destination_socket.recv_from(&mut buf)) => {
                match result {
                    Err(_) => continue,
                    Ok(Err(_)) => break true,
                    Ok(Ok((n, from))) => {
                        *expires_at.lock().await = Instant::now() + lifetime;
                        let forward = encode_server_forward(from, &buf[..n]);
                        if client_udp_socket.send_to(&forward, client_addr).await.is_err() {
                            break true;
                        }
                    }
                }
            }
        }
    };
    debug!(%client_addr, "udp exchange egress loop stopped");
    if evict_on_exit {
        let _ = evict_tx.send(host);
    }
    let _ = closed_ack.send(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent_and_rendezvous_completes() {
        let destination = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_facing = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client_addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let (evict_tx, _evict_rx) = mpsc::unbounded_channel();
        let exchange = UdpExchange::spawn(
            client_addr,
            destination,
            Duration::from_secs(60),
            client_facing,
            "127.0.0.1:9".into(),
            evict_tx,
        );

        exchange.close().await;
        exchange.close().await;
    }

    #[tokio::test]
    async fn refresh_pushes_expiry_into_the_future() {
        let destination = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_facing = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client_addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let (evict_tx, _evict_rx) = mpsc::unbounded_channel();
        let exchange = UdpExchange::spawn(
            client_addr,
            destination,
            Duration::from_millis(10),
            client_facing,
            "127.0.0.1:9".into(),
            evict_tx,
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(exchange.is_expired().await);

        exchange.refresh(Duration::from_secs(60)).await;
        assert!(!exchange.is_expired().await);

        exchange.close().await;
    }
}
