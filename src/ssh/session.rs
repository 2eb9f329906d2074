// ABOUTME: Authenticated target session carried over the relay link.
// ABOUTME: Opens shell channels and runs one-shot commands with combined output.

use super::dial::{SshLink, TunnelLink};
use super::error::{Error, Result};
use super::handler::SshHandler;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};

/// Output from a remote command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command. Absent when it was killed by a signal or
    /// the channel closed without reporting one.
    pub exit_code: Option<u32>,
    /// Raw standard output and standard error bytes, interleaved in arrival order.
    pub output: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// An authenticated session to the target. Owns the relay link that carries it.
pub struct Session {
    target: Handle<SshHandler>,
    link: SshLink,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("link", &self.link)
            .field("target", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    pub(crate) fn new(target: Handle<SshHandler>, link: SshLink) -> Self {
        Self { target, link }
    }

    /// Open a fresh session channel on the target.
    pub async fn open_channel(&self) -> Result<Channel<Msg>> {
        self.target
            .channel_open_session()
            .await
            .map_err(Error::ChannelOpen)
    }

    /// Run a single command and capture its combined output verbatim.
    ///
    /// A failing remote command is not an error; only transport failures are.
    /// Output received before the channel closes is kept even when no exit
    /// status arrives.
    pub async fn execute_command(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self.open_channel().await?;

        channel
            .exec(true, command)
            .await
            .map_err(Error::CommandFailed)?;

        let mut output = Vec::new();
        let mut exit_code = None;
        let mut got_exit = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    output.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    output.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = Some(exit_status);
                    got_exit = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::ExitSignal { .. }) => {
                    got_exit = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => break,
                Some(_) => {}
                None => break,
            }
        }

        if !got_exit {
            tracing::debug!(command, "channel closed without exit status");
        }

        Ok(CommandOutput { exit_code, output })
    }

    /// Disconnect the target, then the relay.
    pub async fn close(self) {
        if let Err(e) = self
            .target
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::warn!("failed to close session: {}", e);
        }
        self.link.close().await;
    }
}
