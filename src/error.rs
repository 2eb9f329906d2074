// ABOUTME: Application-wide error type for kssh.
// ABOUTME: Wraps each module's errors and maps them to process exit codes.

use crate::config::ConfigError;
use crate::procedure::ProcedureError;
use crate::resolve::LookupError;
use crate::ssh::{self, ConnectError};
use crate::target::TargetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("invalid target: {0}")]
    Target(#[from] TargetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Session(#[from] ssh::Error),

    #[error("failed to listen: {0}")]
    Listen(#[source] std::io::Error),

    #[error(transparent)]
    Procedure(#[from] ProcedureError),
}

impl Error {
    /// Process exit code: 2 for usage mistakes, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) | Error::Target(_) | Error::Procedure(ProcedureError::Empty(_)) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
