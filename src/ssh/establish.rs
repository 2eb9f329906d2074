// ABOUTME: Two-hop connect with typed retry: relay dial, forwarded channel, inner auth.
// ABOUTME: Transport resets retry with the same credentials; rejections always re-prompt.

use super::credentials::Credentials;
use super::dial::{FailedAuth, TunnelDialer, TunnelLink};
use super::error::{AuthFailure, ConnectError};
use crate::directory::RelayDescriptor;
use crate::prompt::Prompt;

/// Default number of transport-reset retries before giving up.
pub const DEFAULT_MAX_RESETS: u32 = 3;

/// Bounds for the connect retry loop. Rejections are never bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after a transport reset. One more reset is fatal.
    pub max_resets: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_resets: DEFAULT_MAX_RESETS,
        }
    }
}

/// Where a connect attempt currently is. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    DialRelay,
    DialTarget,
    Authenticate,
}

/// What to do after a failed authentication.
#[derive(Debug)]
enum Next {
    RetrySame,
    RetryWithNewPassword,
}

/// Builds authenticated sessions through a relay.
pub struct SessionEstablisher<'a, D> {
    dialer: D,
    prompt: &'a dyn Prompt,
    policy: RetryPolicy,
}

impl<'a, D: TunnelDialer> SessionEstablisher<'a, D> {
    pub fn new(dialer: D, prompt: &'a dyn Prompt) -> Self {
        Self {
            dialer,
            prompt,
            policy: RetryPolicy::default(),
        }
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Connect to `localhost:target_port` behind `relay` and authenticate.
    ///
    /// A password already present in `credentials` is used for the first
    /// attempt only, without prompting. Otherwise one is prompted for before
    /// the first dial. Every link opened by a failed attempt is closed before
    /// the next attempt dials again.
    pub async fn connect(
        &self,
        relay: &RelayDescriptor,
        target_port: u16,
        credentials: Credentials,
    ) -> Result<<D::Link as TunnelLink>::Session, ConnectError> {
        let mut credentials = credentials;
        if credentials.password.is_none() {
            let password = self.ask_password(&credentials.user)?;
            credentials.replace_password(password);
        }

        let mut resets = 0u32;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::debug!(
                attempt,
                phase = ?Phase::DialRelay,
                relay = %relay.address(),
                "connect attempt"
            );
            let mut link = self.dialer.dial(relay).await?;

            tracing::debug!(
                attempt,
                phase = ?Phase::DialTarget,
                port = target_port,
                "opening forwarded port"
            );
            let stream = match link.open_forwarded(target_port).await {
                Ok(stream) => stream,
                Err(e) => {
                    link.close().await;
                    return Err(e);
                }
            };

            tracing::debug!(
                attempt,
                phase = ?Phase::Authenticate,
                user = %credentials.user,
                "authenticating"
            );
            let FailedAuth { link, failure } = match link.authenticate(stream, &credentials).await
            {
                Ok(session) => {
                    tracing::debug!(attempt, "session established");
                    return Ok(session);
                }
                Err(failed) => failed,
            };
            link.close().await;

            match self.classify(failure, &mut resets)? {
                Next::RetrySame => {
                    tracing::info!(
                        attempt,
                        resets,
                        max_resets = self.policy.max_resets,
                        "connection reset before authentication, retrying"
                    );
                }
                Next::RetryWithNewPassword => {
                    tracing::warn!(user = %credentials.user, "authentication rejected");
                    self.prompt.notify("Permission denied, please try again.");
                    let password = self.ask_password(&credentials.user)?;
                    credentials.replace_password(password);
                }
            }
        }
    }

    fn classify(&self, failure: AuthFailure, resets: &mut u32) -> Result<Next, ConnectError> {
        match failure {
            AuthFailure::TransportReset if *resets >= self.policy.max_resets => {
                Err(ConnectError::RetriesExhausted(*resets + 1))
            }
            AuthFailure::TransportReset => {
                *resets += 1;
                Ok(Next::RetrySame)
            }
            AuthFailure::Rejected { .. } => Ok(Next::RetryWithNewPassword),
            AuthFailure::Fatal(e) => Err(ConnectError::Protocol(e)),
        }
    }

    fn ask_password(&self, user: &str) -> Result<String, ConnectError> {
        self.prompt
            .read_secret(&format!("Password for {user}: "))
            .map_err(ConnectError::Prompt)
    }
}
