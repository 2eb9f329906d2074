// ABOUTME: Directory service error types.
// ABOUTME: Not-found is not an error; these cover transport, status, and decoding failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid directory endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to communicate with directory server: {0}")]
    Connect(String),

    #[error("directory server responded HTTP {0}")]
    Status(hyper::StatusCode),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
