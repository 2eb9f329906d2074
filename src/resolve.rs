// ABOUTME: Resolves a target identifier to a fresh node report and its relay descriptor.
// ABOUTME: Applies the freshness threshold and asks the user when several nodes match.

use crate::directory::{Directory, DirectoryError, NodeReport, RelayDescriptor};
use crate::prompt::Prompt;
use crate::target::{IdentifierKind, Target};
use chrono::{DateTime, Duration, Utc};
use nonempty::NonEmpty;
use thiserror::Error;

/// Default report freshness threshold in minutes.
pub const DEFAULT_FRESHNESS_MINUTES: u32 = 15;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("target not found: {0}")]
    NotFound(String),

    #[error("target timestamp is out of date: {identifier} (older than {minutes} minutes)")]
    Stale { identifier: String, minutes: i64 },

    #[error("ssh not connected: {0}")]
    NotConnected(String),

    #[error("unknown ssh server: {0}")]
    UnknownRelay(String),

    #[error("failed to select target: {0}")]
    Selection(#[source] std::io::Error),
}

/// A target ready to dial.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub report: NodeReport,
    pub relay: RelayDescriptor,
}

impl Resolved {
    /// Forwarded port on the relay's loopback.
    pub fn target_port(&self) -> u16 {
        self.report.ssh_remote_port
    }
}

/// Keep only reports received within `threshold` of `now`.
pub fn fresh_reports(
    reports: Vec<NodeReport>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> Option<NonEmpty<NodeReport>> {
    let fresh = reports
        .into_iter()
        .filter(|r| r.is_fresh(now, threshold))
        .collect();
    NonEmpty::from_vec(fresh)
}

pub struct Resolver<'a> {
    directory: &'a dyn Directory,
    prompt: &'a dyn Prompt,
    freshness: Duration,
}

impl<'a> Resolver<'a> {
    pub fn new(directory: &'a dyn Directory, prompt: &'a dyn Prompt) -> Self {
        Self {
            directory,
            prompt,
            freshness: Duration::minutes(i64::from(DEFAULT_FRESHNESS_MINUTES)),
        }
    }

    pub fn freshness(mut self, threshold: Duration) -> Self {
        self.freshness = threshold;
        self
    }

    /// Find the target's report and the relay it is bound to.
    ///
    /// The relay is fetched exactly once.
    pub async fn resolve(
        &self,
        target: &Target,
        now: DateTime<Utc>,
    ) -> Result<Resolved, LookupError> {
        let identifier = target.identifier.as_str();
        let candidates = match target.kind() {
            IdentifierKind::Mac => self
                .directory
                .find_node(identifier)
                .await?
                .into_iter()
                .collect(),
            IdentifierKind::Custom => self.directory.list_nodes_by_custom_id(identifier).await?,
        };
        tracing::debug!(identifier, candidates = candidates.len(), "directory lookup");

        if candidates.is_empty() {
            return Err(LookupError::NotFound(identifier.to_string()));
        }

        let fresh = fresh_reports(candidates, now, self.freshness).ok_or_else(|| {
            LookupError::Stale {
                identifier: identifier.to_string(),
                minutes: self.freshness.num_minutes(),
            }
        })?;

        let report = self.select(fresh)?;
        if report.ssh_remote_port == 0 {
            return Err(LookupError::NotConnected(report.id));
        }

        let relay = self
            .directory
            .find_relay(&report.ssh_server_host)
            .await?
            .ok_or_else(|| LookupError::UnknownRelay(report.ssh_server_host.clone()))?;

        tracing::debug!(
            node = %report.id,
            relay = %relay.address(),
            port = report.ssh_remote_port,
            "target resolved"
        );
        Ok(Resolved { report, relay })
    }

    fn select(&self, fresh: NonEmpty<NodeReport>) -> Result<NodeReport, LookupError> {
        if fresh.tail.is_empty() {
            return Ok(fresh.head);
        }
        let mut reports: Vec<NodeReport> = fresh.into();
        let items: Vec<String> = reports.iter().map(ToString::to_string).collect();
        let index = self
            .prompt
            .choose("Multiple choices:", &items)
            .map_err(LookupError::Selection)?;
        Ok(reports.swap_remove(index))
    }
}
