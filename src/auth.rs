//! Username/password sub-negotiation (RFC 1929) and the method-negotiation
//! engine that runs immediately after a client connects.

pub mod reply;
pub mod request;

use tracing::{debug, warn};

use crate::config::{AuthMethod, Config};
use crate::error::SocksError;
use crate::msg::message::{MethodSelection, VersionMessage};
use crate::msg::method::{FixedMethod, Method};
use reply::{AuthReply, AuthStatus};
use request::AuthRequest;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Runs the full method-negotiation handshake on a freshly accepted
/// connection: reads the client's [`VersionMessage`], picks a method
/// compatible with `config.auth_method`, replies with a
/// [`MethodSelection`], and if username/password was selected, reads and
/// checks the [`AuthRequest`].
///
/// Four steps, matching the Go original's `Socks5Auth`:
/// 1. Read the greeting.
/// 2. Pick the method this server supports that the client also offered.
/// 3. Send the selection. If nothing matched, the selection is
///    `NO ACCEPTABLE METHODS (0xFF)` and negotiation ends in failure.
/// 4. If `UsePass` was selected, run the password sub-negotiation.
pub async fn negotiate<S>(stream: &mut S, config: &Config) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting = VersionMessage::decode(stream).await?;

    let wanted = match config.auth_method {
        AuthMethod::NoAuth => FixedMethod::NoAuth,
        AuthMethod::Password => FixedMethod::UsePass,
    };

    let selected = if greeting.methods.contains(&Method::Fixed(wanted)) {
        Method::Fixed(wanted)
    } else {
        Method::Fixed(FixedMethod::NoAcceptable)
    };

    let selection = MethodSelection::new(selected);
    stream.write_all(&selection.to_bytes()).await?;

    match selected {
        Method::Fixed(FixedMethod::NoAuth) => {
            debug!("negotiated NO AUTH");
            Ok(())
        }
        Method::Fixed(FixedMethod::UsePass) => {
            let checker = config
                .password_checker
                .as_ref()
                .ok_or(SocksError::PasswordCheckerNotSet)?;

            let req = AuthRequest::decode(stream).await?;
            if checker(&req.uname, &req.passwd) {
                let reply = AuthReply::new(AuthStatus::Success);
                stream.write_all(&reply.to_bytes()).await?;
                debug!(user = %req.uname, "password authentication succeeded");
                Ok(())
            } else {
                let reply = AuthReply::new(AuthStatus::Failure);
                stream.write_all(&reply.to_bytes()).await?;
                warn!(user = %req.uname, "password authentication failed");
                Err(SocksError::PasswordAuthFailure)
            }
        }
        _ => {
            warn!("no acceptable authentication method");
            Err(SocksError::AuthMethodNotSupport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::method::FixedMethod;
    use tokio::io::duplex;

    #[tokio::test]
    async fn no_auth_client_and_server_agree_without_sub_negotiation() {
        let (mut client, mut server) = duplex(256);
        let config = Config::no_auth();

        let server_task = tokio::spawn(async move { negotiate(&mut server, &config).await });

        let greeting = VersionMessage::new(vec![Method::Fixed(FixedMethod::NoAuth)]);
        client.write_all(&greeting.to_bytes()).await.unwrap();

        let selection = MethodSelection::decode(&mut client).await.unwrap();
        assert_eq!(selection.method, Method::Fixed(FixedMethod::NoAuth));

        server_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn mismatched_methods_yield_no_acceptable_and_error() {
        let (mut client, mut server) = duplex(256);
        let config = Config {
            auth_method: AuthMethod::Password,
            password_checker: Some(std::sync::Arc::new(|_: &str, _: &str| true)),
            ..Config::no_auth()
        };

        let server_task = tokio::spawn(async move { negotiate(&mut server, &config).await });

        let greeting = VersionMessage::new(vec![Method::Fixed(FixedMethod::NoAuth)]);
        client.write_all(&greeting.to_bytes()).await.unwrap();

        let selection = MethodSelection::decode(&mut client).await.unwrap();
        assert_eq!(selection.method, Method::Fixed(FixedMethod::NoAcceptable));

        let err = server_task.await.unwrap().unwrap_err();
        assert!(matches!(err, SocksError::AuthMethodNotSupport));
    }

    #[tokio::test]
    async fn password_auth_full_round_trip() {
        let (mut client, mut server) = duplex(256);
        let config = Config {
            auth_method: AuthMethod::Password,
            password_checker: Some(std::sync::Arc::new(|u: &str, p: &str| {
                u == "alice" && p == "hunter2"
            })),
            ..Config::no_auth()
        };

        let server_task = tokio::spawn(async move { negotiate(&mut server, &config).await });

        let greeting = VersionMessage::new(vec![Method::Fixed(FixedMethod::UsePass)]);
        client.write_all(&greeting.to_bytes()).await.unwrap();
        MethodSelection::decode(&mut client).await.unwrap();

        let req = AuthRequest::new("alice".into(), "hunter2".into());
        client.write_all(&req.to_bytes()).await.unwrap();

        let reply = AuthReply::decode(&mut client).await.unwrap();
        assert_eq!(reply.status, AuthStatus::Success);

        server_task.await.unwrap().unwrap();
    }
}
