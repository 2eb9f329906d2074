// ABOUTME: Directory (inventory) service lookups.
// ABOUTME: Resolves identifiers to node reports and relay hostnames to relay descriptors.

mod client;
mod error;
mod types;

pub use client::HttpDirectory;
pub use error::{DirectoryError, Result};
pub use types::{NodeReport, RelayDescriptor};

use async_trait::async_trait;

/// Read-only view of the directory. Not-found results are `None` or empty, never errors.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a node by its id (MAC address).
    async fn find_node(&self, id: &str) -> Result<Option<NodeReport>>;

    /// List every node reporting the given custom id.
    async fn list_nodes_by_custom_id(&self, custom_id: &str) -> Result<Vec<NodeReport>>;

    /// Look up a relay's connection descriptor by hostname.
    async fn find_relay(&self, hostname: &str) -> Result<Option<RelayDescriptor>>;
}
