// ABOUTME: SSH-specific error types.
// ABOUTME: Separates fatal connect failures, retryable auth outcomes, and session errors.

use thiserror::Error;

/// Failure to build the two-hop connection to a target.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("relay {host}:{port} is unreachable: {reason}")]
    Unreachable {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("connection refused by {0}")]
    Refused(String),

    #[error("connection to {0} timed out")]
    Timeout(String),

    #[error("relay rejected credentials for user {user}")]
    RelayAuth { user: String },

    #[error("gave up after {0} transport resets")]
    RetriesExhausted(u32),

    #[error("invalid relay key: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("failed to read password: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    Unreachable,
    Refused,
    Timeout,
    RelayAuth,
    RetriesExhausted,
    Key,
    Prompt,
    Protocol,
}

impl ConnectError {
    pub fn kind(&self) -> ConnectErrorKind {
        match self {
            ConnectError::Unreachable { .. } => ConnectErrorKind::Unreachable,
            ConnectError::Refused(_) => ConnectErrorKind::Refused,
            ConnectError::Timeout(_) => ConnectErrorKind::Timeout,
            ConnectError::RelayAuth { .. } => ConnectErrorKind::RelayAuth,
            ConnectError::RetriesExhausted(_) => ConnectErrorKind::RetriesExhausted,
            ConnectError::Key(_) => ConnectErrorKind::Key,
            ConnectError::Prompt(_) => ConnectErrorKind::Prompt,
            ConnectError::Protocol(_) => ConnectErrorKind::Protocol,
        }
    }
}

/// Outcome of a failed inner authentication, classified from the transport.
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// Remote closed before answering; usually a stale route on the relay.
    #[error("connection reset before authentication completed")]
    TransportReset,

    /// Explicit authentication failure.
    #[error("authentication rejected for {user}")]
    Rejected { user: String },

    #[error("inner handshake failed: {0}")]
    Fatal(#[source] russh::Error),
}

impl AuthFailure {
    /// Classify a russh error raised during the inner handshake.
    pub fn from_transport(err: russh::Error) -> Self {
        if is_reset(&err) {
            AuthFailure::TransportReset
        } else {
            AuthFailure::Fatal(err)
        }
    }

    /// Whether the establisher may try again after this failure.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AuthFailure::Fatal(_))
    }
}

fn is_reset(err: &russh::Error) -> bool {
    use std::io::ErrorKind;
    match err {
        russh::Error::Disconnect | russh::Error::HUP => true,
        russh::Error::IO(io) => matches!(
            io.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

/// Errors raised while using an established session.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("failed to open channel: {0}")]
    ChannelOpen(#[source] russh::Error),

    #[error("failed to request terminal: {0}")]
    PtyRequest(#[source] russh::Error),

    #[error("failed to start shell: {0}")]
    ShellStart(#[source] russh::Error),

    #[error("command execution failed: {0}")]
    CommandFailed(#[source] russh::Error),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
