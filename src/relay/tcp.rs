//! TCP relay for the CONNECT command.

use tokio::io;
use tokio::net::TcpStream;
use tracing::debug;

/// Relays bytes between `client` and `dest` until either side closes.
///
/// Closing `dest` is this function's job; closing `client` belongs to the
/// caller, which owns the accepted connection for its whole lifetime.
pub async fn copy_bidirectional(client: &mut TcpStream, dest: &mut TcpStream) -> io::Result<()> {
    let result = io::copy_bidirectional(client, dest).await;
    match &result {
        Ok((to_dest, to_client)) => {
            debug!(to_dest, to_client, "CONNECT relay finished");
        }
        Err(err) => {
            debug!(%err, "CONNECT relay ended with an error");
        }
    }
    let _ = dest.shutdown().await;
    result.map(|_| ())
}
