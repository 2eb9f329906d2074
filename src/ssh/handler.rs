// ABOUTME: russh client handler enforcing the host key policy.
// ABOUTME: Accepts any key by default, or verifies against known_hosts with optional TOFU.

use russh::client;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{HashAlg, ssh_key};
use std::path::PathBuf;

/// How server host keys are verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept every key. The relay's loopback address is not a stable identity.
    #[default]
    AcceptAny,
    /// Check against known_hosts (default ~/.ssh/known_hosts when `path` is None).
    KnownHosts {
        trust_on_first_use: bool,
        path: Option<PathBuf>,
    },
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl SshHandler {
    pub(crate) fn new(host: impl Into<String>, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
        }
    }

    fn check_known_hosts(
        &self,
        key: &ssh_key::PublicKey,
        trust_on_first_use: bool,
        path: Option<&PathBuf>,
    ) -> bool {
        let check_result = match path {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        };

        match check_result {
            Ok(true) => true,
            Ok(false) if trust_on_first_use => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                let learn_result = match path {
                    Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
                    None => learn_known_hosts(&self.host, self.port, key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                true
            }
            Ok(false) => false,
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!(
                    host = %self.host,
                    port = self.port,
                    "host key changed; refusing to connect"
                );
                false
            }
            Err(e) => {
                tracing::debug!("known_hosts lookup failed: {}", e);
                trust_on_first_use
            }
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAny => {
                tracing::debug!(
                    host = %self.host,
                    port = self.port,
                    fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
                    "accepting host key"
                );
                Ok(true)
            }
            HostKeyPolicy::KnownHosts {
                trust_on_first_use,
                path,
            } => Ok(self.check_known_hosts(server_public_key, *trust_on_first_use, path.as_ref())),
        }
    }
}
