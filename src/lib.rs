//! An asynchronous SOCKS5 proxy implementation using Tokio.
//!
//! Implements version/method negotiation and username/password
//! authentication ([RFC 1928](https://www.rfc-editor.org/rfc/rfc1928),
//! [RFC 1929](https://www.rfc-editor.org/rfc/rfc1929)), the `CONNECT`
//! command via a bidirectional TCP relay, and `UDP ASSOCIATE` via a
//! datagram relay with idle-exchange eviction. `BIND` is recognized but
//! rejected — see [`error::SocksError::BindNotSupported`].
//!
//! This crate only consumes a [`config::Config`] value; building one from
//! a config file, environment, or CLI flags is the caller's job.
//!
//! ```no_run
//! use sockrs5::config::Config;
//! use sockrs5::server::Server;
//!
//! # async fn run() -> Result<(), sockrs5::error::SocksError> {
//! let addr = "127.0.0.1:1080".parse().unwrap();
//! let server = Server::bind(addr, Config::no_auth()).await?;
//! server.run().await
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod conn;
pub mod dispatch;
pub mod error;
pub mod msg;
pub mod parse;
pub mod relay;
pub mod server;
