//! End-to-end scenarios driving a spawned [`Server`] with real TCP/UDP
//! clients, covering the handshake, command dispatch, and UDP relay
//! behaviors a real client would exercise.

use std::sync::Arc;
use std::time::Duration;

use sockrs5::config::{AuthMethod, Config, UdpPortMode};
use sockrs5::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

async fn spawn_server(config: Config) -> std::net::SocketAddr {
    let addr = "127.0.0.1:0".parse().unwrap();
    let server = Server::bind(addr, config).await.unwrap();
    let local_addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    local_addr
}

#[tokio::test]
async fn happy_connect_no_auth() {
    let echo_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let echo_addr = echo_listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = echo_listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        sock.read_exact(&mut buf).await.unwrap();
        sock.write_all(&buf).await.unwrap();
    });

    let server_addr = spawn_server(Config::no_auth()).await;
    let mut client = TcpStream::connect(server_addr).await.unwrap();

    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    client.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    let port = echo_addr.port().to_be_bytes();
    let mut request = vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1];
    request.extend_from_slice(&port);
    client.write_all(&request).await.unwrap();

    let mut reply_head = [0u8; 4];
    client.read_exact(&mut reply_head).await.unwrap();
    assert_eq!(&reply_head[..3], &[0x05, 0x00, 0x00]);
    let mut bnd = [0u8; 6];
    client.read_exact(&mut bnd).await.unwrap();

    client.write_all(b"hello").await.unwrap();
    let mut echoed = [0u8; 5];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"hello");
}

#[tokio::test]
async fn password_auth_success() {
    let checker: sockrs5::config::PasswordChecker =
        Arc::new(|u: &str, p: &str| u == "u" && p == "p");
    let config = Config {
        auth_method: AuthMethod::Password,
        password_checker: Some(checker),
        ..Config::no_auth()
    };
    let server_addr = spawn_server(config).await;
    let mut client = TcpStream::connect(server_addr).await.unwrap();

    client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    client.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x02]);

    client
        .write_all(&[0x01, 0x01, b'u', 0x01, b'p'])
        .await
        .unwrap();
    let mut auth_reply = [0u8; 2];
    client.read_exact(&mut auth_reply).await.unwrap();
    assert_eq!(auth_reply, [0x01, 0x00]);
}

#[tokio::test]
async fn password_auth_failure_closes_connection() {
    let checker: sockrs5::config::PasswordChecker =
        Arc::new(|u: &str, p: &str| u == "u" && p == "p");
    let config = Config {
        auth_method: AuthMethod::Password,
        password_checker: Some(checker),
        ..Config::no_auth()
    };
    let server_addr = spawn_server(config).await;
    let mut client = TcpStream::connect(server_addr).await.unwrap();

    client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    client.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x02]);

    client
        .write_all(&[0x01, 0x01, b'u', 0x01, b'x'])
        .await
        .unwrap();
    let mut auth_reply = [0u8; 2];
    client.read_exact(&mut auth_reply).await.unwrap();
    assert_eq!(auth_reply, [0x01, 0x01]);

    let mut probe = [0u8; 1];
    let n = client.read(&mut probe).await.unwrap();
    assert_eq!(n, 0, "server should close the connection after auth failure");
}

#[tokio::test]
async fn unsupported_method_yields_no_acceptable() {
    let server_addr = spawn_server(Config::no_auth()).await;
    let mut client = TcpStream::connect(server_addr).await.unwrap();

    client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    client.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0xFF]);

    let mut probe = [0u8; 1];
    let n = client.read(&mut probe).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn bind_command_is_rejected_with_command_not_supported() {
    let server_addr = spawn_server(Config::no_auth()).await;
    let mut client = TcpStream::connect(server_addr).await.unwrap();

    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    client.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    client
        .write_all(&[0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0, 80])
        .await
        .unwrap();
    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn udp_associate_random_port_relays_datagrams() {
    let config = Config {
        udp_port_mode: UdpPortMode::Random,
        udp_exchange_lifetime: Duration::from_secs(60),
        ..Config::no_auth()
    };
    let server_addr = spawn_server(config).await;
    let mut client = TcpStream::connect(server_addr).await.unwrap();

    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    client.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    client
        .write_all(&[0x05, 0x03, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
        .await
        .unwrap();
    let mut reply_head = [0u8; 4];
    client.read_exact(&mut reply_head).await.unwrap();
    assert_eq!(&reply_head[..3], &[0x05, 0x00, 0x00]);
    let mut bnd = [0u8; 6];
    client.read_exact(&mut bnd).await.unwrap();
    let relay_port = u16::from_be_bytes([bnd[4], bnd[5]]);
    assert_ne!(relay_port, 0);

    let echo = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let echo_addr = echo.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        if let Ok((n, from)) = echo.recv_from(&mut buf).await {
            let _ = echo.send_to(&buf[..n], from).await;
        }
    });

    let client_udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = std::net::SocketAddr::new(server_addr.ip(), relay_port);

    let mut datagram = vec![0x00, 0x00, 0x00, 0x01];
    datagram.extend_from_slice(&[127, 0, 0, 1]);
    datagram.extend_from_slice(&echo_addr.port().to_be_bytes());
    datagram.extend_from_slice(b"ping");

    client_udp.send_to(&datagram, relay_addr).await.unwrap();

    let mut reply_buf = [0u8; 64];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), client_udp.recv_from(&mut reply_buf))
        .await
        .unwrap()
        .unwrap();
    // RSV(2) FRAG(1) ATYP(1) ADDR(4) PORT(2) DATA
    assert_eq!(&reply_buf[0..3], &[0, 0, 0]);
    assert_eq!(&reply_buf[n - 4..n], b"ping");
}
