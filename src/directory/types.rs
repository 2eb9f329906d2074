// ABOUTME: Records returned by the directory service.
// ABOUTME: Node reports describe targets; relay descriptors describe tunnel servers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Snapshot of a target as last reported to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeReport {
    /// MAC address of the reporting adapter.
    pub id: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub custom_id: Option<String>,
    /// Relay the target keeps its reverse tunnel open to.
    #[serde(default)]
    pub ssh_server_host: String,
    /// Port on the relay's loopback forwarding to the target's sshd. Zero when not connected.
    #[serde(default)]
    pub ssh_remote_port: u16,
    #[serde(default, rename = "ip4_local")]
    pub local_ipv4: String,
    #[serde(default, rename = "ip6_local")]
    pub local_ipv6: String,
    #[serde(default)]
    pub adapter: String,
    #[serde(default)]
    pub hostname: String,
    /// Server-side receive time, UNIX seconds.
    #[serde(default)]
    pub server_time: i64,
}

impl NodeReport {
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.server_time, 0)
    }

    /// Whether the report was received less than `threshold` before `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.received_at()
            .is_some_and(|received| now - received < threshold)
    }

    /// Local address to show when choosing between candidates.
    pub fn local_address(&self) -> &str {
        if self.local_ipv4.is_empty() && !self.local_ipv6.is_empty() {
            &self.local_ipv6
        } else {
            &self.local_ipv4
        }
    }
}

impl fmt::Display for NodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}@{} {}",
            self.id,
            self.local_address(),
            self.adapter,
            self.hostname
        )
    }
}

/// Connection metadata for a relay (tunnel) server.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RelayDescriptor {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    /// Private key text (OpenSSH or PEM).
    #[serde(default, deserialize_with = "empty_as_none")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub password: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl RelayDescriptor {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            key: None,
            password: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for RelayDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
