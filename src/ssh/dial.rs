// ABOUTME: Single-hop dialing: the relay transport and channels opened through it.
// ABOUTME: Defines the TunnelDialer/TunnelLink seams and their russh implementation.

use super::credentials::Credentials;
use super::error::{AuthFailure, ConnectError};
use super::handler::{HostKeyPolicy, SshHandler};
use super::session::Session;
use crate::directory::RelayDescriptor;
use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key};
use russh::{ChannelStream, Disconnect};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens the first hop: one TCP socket to the relay plus one SSH handshake,
/// authenticated with the relay's own credentials. Never retries.
#[async_trait]
pub trait TunnelDialer: Send + Sync {
    type Link: TunnelLink;

    async fn dial(&self, relay: &RelayDescriptor) -> Result<Self::Link, ConnectError>;
}

/// An open relay transport. Owned by exactly one step at a time.
#[async_trait]
pub trait TunnelLink: Send + Sized + 'static {
    /// Byte stream to the forwarded port.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// Authenticated session to the target.
    type Session: Send;

    /// Open a channel to `localhost:port` as the relay sees it.
    async fn open_forwarded(&mut self, port: u16) -> Result<Self::Stream, ConnectError>;

    /// Negotiate the inner session over `stream`. On success the link moves
    /// into the session; on failure it is handed back for closing.
    async fn authenticate(
        self,
        stream: Self::Stream,
        credentials: &Credentials,
    ) -> Result<Self::Session, FailedAuth<Self>>;

    /// Tear the relay transport down. Failures are logged, never returned.
    async fn close(self);
}

/// A failed inner authentication, returning ownership of the link.
pub struct FailedAuth<L> {
    pub link: L,
    pub failure: AuthFailure,
}

impl<L> std::fmt::Debug for FailedAuth<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailedAuth")
            .field("failure", &self.failure)
            .finish()
    }
}

/// russh-backed dialer.
#[derive(Debug, Clone)]
pub struct SshDialer {
    config: Arc<Config>,
    host_keys: HostKeyPolicy,
}

impl Default for SshDialer {
    fn default() -> Self {
        Self::new(HostKeyPolicy::default())
    }
}

impl SshDialer {
    pub fn new(host_keys: HostKeyPolicy) -> Self {
        let config = Config {
            nodelay: true,
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
            host_keys,
        }
    }
}

#[async_trait]
impl TunnelDialer for SshDialer {
    type Link = SshLink;

    async fn dial(&self, relay: &RelayDescriptor) -> Result<SshLink, ConnectError> {
        let address = relay.address();
        tracing::debug!(relay = %address, user = %relay.user, "dialing relay");

        let socket = TcpStream::connect((relay.host.as_str(), relay.port))
            .await
            .map_err(|e| classify_socket_error(relay, e))?;

        let handler = SshHandler::new(&relay.host, relay.port, self.host_keys.clone());
        let mut handle = client::connect_stream(Arc::clone(&self.config), socket, handler)
            .await
            .map_err(|e| match e {
                russh::Error::IO(io) => classify_socket_error(relay, io),
                other => ConnectError::Protocol(other),
            })?;

        match authenticate_relay(&mut handle, relay).await {
            Ok(true) => {}
            Ok(false) => {
                disconnect(&handle, &address).await;
                return Err(ConnectError::RelayAuth {
                    user: relay.user.clone(),
                });
            }
            Err(e) => {
                disconnect(&handle, &address).await;
                return Err(e);
            }
        }

        tracing::debug!(relay = %address, "relay transport established");
        Ok(SshLink {
            relay: handle,
            address,
            config: Arc::clone(&self.config),
        })
    }
}

async fn authenticate_relay(
    handle: &mut Handle<SshHandler>,
    relay: &RelayDescriptor,
) -> Result<bool, ConnectError> {
    if let Some(key) = &relay.key {
        let key = decode_secret_key(key, None)?;
        let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
        let result = handle
            .authenticate_publickey(
                &relay.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await?;
        if result.success() {
            return Ok(true);
        }
        tracing::debug!(user = %relay.user, "relay refused key");
    }

    if let Some(password) = &relay.password {
        let result = handle.authenticate_password(&relay.user, password).await?;
        if result.success() {
            return Ok(true);
        }
        tracing::debug!(user = %relay.user, "relay refused password");
    }

    Ok(false)
}

fn classify_socket_error(relay: &RelayDescriptor, err: io::Error) -> ConnectError {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ConnectError::Refused(relay.address()),
        io::ErrorKind::TimedOut => ConnectError::Timeout(relay.address()),
        _ => ConnectError::Unreachable {
            host: relay.host.clone(),
            port: relay.port,
            reason: err.to_string(),
        },
    }
}

async fn disconnect(handle: &Handle<SshHandler>, address: &str) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "", "en")
        .await
    {
        tracing::debug!(peer = %address, "disconnect failed: {}", e);
    }
}

/// Relay transport opened by [`SshDialer`].
pub struct SshLink {
    relay: Handle<SshHandler>,
    address: String,
    config: Arc<Config>,
}

impl std::fmt::Debug for SshLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshLink")
            .field("address", &self.address)
            .field("relay", &"<russh::Handle>")
            .finish()
    }
}

impl SshLink {
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl TunnelLink for SshLink {
    type Stream = ChannelStream<client::Msg>;
    type Session = Session;

    async fn open_forwarded(&mut self, port: u16) -> Result<Self::Stream, ConnectError> {
        tracing::debug!(relay = %self.address, port, "opening forwarded channel");
        let channel = self
            .relay
            .channel_open_direct_tcpip("localhost", u32::from(port), "127.0.0.1", 0)
            .await
            .map_err(|e| match e {
                russh::Error::ChannelOpenFailure(reason) => ConnectError::Refused(format!(
                    "localhost:{port} via {} ({reason:?})",
                    self.address
                )),
                other => ConnectError::Protocol(other),
            })?;
        Ok(channel.into_stream())
    }

    async fn authenticate(
        self,
        stream: Self::Stream,
        credentials: &Credentials,
    ) -> Result<Session, FailedAuth<Self>> {
        let handler = SshHandler::new("localhost", 0, HostKeyPolicy::AcceptAny);
        let mut target =
            match client::connect_stream(Arc::clone(&self.config), stream, handler).await {
                Ok(target) => target,
                Err(e) => {
                    return Err(FailedAuth {
                        link: self,
                        failure: AuthFailure::from_transport(e),
                    });
                }
            };

        let result = target
            .authenticate_password(&credentials.user, credentials.password_str())
            .await;

        match result {
            Ok(result) if result.success() => Ok(Session::new(target, self)),
            Ok(_) => {
                disconnect(&target, "target").await;
                Err(FailedAuth {
                    link: self,
                    failure: AuthFailure::Rejected {
                        user: credentials.user.clone(),
                    },
                })
            }
            Err(e) => Err(FailedAuth {
                link: self,
                failure: AuthFailure::from_transport(e),
            }),
        }
    }

    async fn close(self) {
        tracing::debug!(relay = %self.address, "closing relay transport");
        disconnect(&self.relay, &self.address).await;
    }
}
