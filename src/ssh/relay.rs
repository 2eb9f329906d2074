// ABOUTME: Listen mode: a local TCP port whose connections are bridged to the target.
// ABOUTME: Each connection gets its own relay dial and forwarded channel; no inner auth.

use super::dial::{TunnelDialer, TunnelLink};
use super::error::ConnectError;
use crate::directory::RelayDescriptor;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Failure of a single relayed connection. Never affects the listener.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to open tunnel: {0}")]
    Connect(#[from] ConnectError),

    #[error("error while copying {direction}: {source}")]
    Copy {
        direction: Direction,
        #[source]
        source: io::Error,
    },
}

/// Which way bytes were flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local client to target.
    Upstream,
    /// Target to local client.
    Downstream,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upstream => write!(f, "local->remote"),
            Direction::Downstream => write!(f, "remote->local"),
        }
    }
}

/// How a relayed connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// The direction that finished first and triggered teardown.
    pub finished: Direction,
    /// Bytes carried by that direction.
    pub bytes: u64,
}

/// Local listener forwarding raw bytes to `localhost:target_port` behind a relay.
pub struct PortRelay<D> {
    listener: TcpListener,
    dialer: Arc<D>,
    relay: Arc<RelayDescriptor>,
    target_port: u16,
}

impl<D> std::fmt::Debug for PortRelay<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortRelay")
            .field("listener", &self.listener.local_addr().ok())
            .field("relay", &self.relay)
            .field("target_port", &self.target_port)
            .finish()
    }
}

impl<D> PortRelay<D>
where
    D: TunnelDialer + 'static,
{
    /// Bind the local listener. Use port 0 for an ephemeral port.
    pub async fn bind(
        dialer: D,
        relay: RelayDescriptor,
        target_port: u16,
        addr: SocketAddr,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dialer: Arc::new(dialer),
            relay: Arc::new(relay),
            target_port,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever. Termination is external.
    pub async fn serve(self) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(port = addr.port(), "listening local port");
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let dialer = Arc::clone(&self.dialer);
                    let relay = Arc::clone(&self.relay);
                    let port = self.target_port;
                    tokio::spawn(async move {
                        tracing::debug!(%peer, "accepted local connection");
                        match relay_connection(dialer.as_ref(), &relay, port, stream).await {
                            Ok(outcome) => tracing::debug!(
                                %peer,
                                finished = %outcome.finished,
                                bytes = outcome.bytes,
                                "relay finished"
                            ),
                            Err(e) => tracing::warn!(%peer, "relay failed: {}", e),
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("failed to accept a connection: {}", e);
                }
            }
        }
    }
}

/// Bridge one local connection to a freshly dialed tunnel.
pub async fn relay_connection<D>(
    dialer: &D,
    relay: &RelayDescriptor,
    target_port: u16,
    local: TcpStream,
) -> Result<RelayOutcome, RelayError>
where
    D: TunnelDialer + ?Sized,
{
    let mut link = dialer.dial(relay).await?;
    let tunnel = match link.open_forwarded(target_port).await {
        Ok(stream) => stream,
        Err(e) => {
            link.close().await;
            return Err(e.into());
        }
    };

    let result = pipe(local, tunnel).await;
    link.close().await;
    result
}

/// Copy both ways until either direction finishes, then drop both ends.
///
/// The finished direction's writer is shut down first so everything it read
/// reaches the other side before teardown.
pub async fn pipe<L, R>(local: L, remote: R) -> Result<RelayOutcome, RelayError>
where
    L: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    let (mut local_read, mut local_write) = tokio::io::split(local);
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);

    let upstream = async {
        let bytes = tokio::io::copy(&mut local_read, &mut remote_write).await?;
        remote_write.shutdown().await?;
        Ok::<_, io::Error>(bytes)
    };
    let downstream = async {
        let bytes = tokio::io::copy(&mut remote_read, &mut local_write).await?;
        local_write.shutdown().await?;
        Ok::<_, io::Error>(bytes)
    };

    let (finished, result) = tokio::select! {
        r = upstream => (Direction::Upstream, r),
        r = downstream => (Direction::Downstream, r),
    };

    result
        .map(|bytes| RelayOutcome { finished, bytes })
        .map_err(|source| RelayError::Copy {
            direction: finished,
            source,
        })
}
