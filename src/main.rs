use sockrs5::config::Config;
use sockrs5::error::SocksError;
use sockrs5::server::Server;

#[tokio::main]
async fn main() -> Result<(), SocksError> {
    tracing_subscriber::fmt::init();

    let addr = "127.0.0.1:1080".parse().expect("hardcoded listen address is valid");
    let server = Server::bind(addr, Config::no_auth()).await?;

    tracing::info!(%addr, "sockrs5 listening");
    server.run().await
}
