// ABOUTME: Interactive shell driver: raw mode, PTY request, and stdio binding.
// ABOUTME: Raw mode is held by a guard that restores the terminal exactly once.

use super::error::{Error, Result};
use super::session::Session;
use russh::{Channel, ChannelMsg, Pty, client::Msg};
use std::future::Future;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Terminal type announced with the PTY request.
pub const TERM: &str = "xterm";

/// Line speed hint sent for both directions.
pub const BAUD_RATE: u32 = 14400;

/// Fallback size when the local terminal cannot be queried.
const DEFAULT_SIZE: (u16, u16) = (80, 24);

/// Process-wide terminal state.
pub trait TerminalControl: Send + Sync {
    fn enable_raw_mode(&self) -> io::Result<()>;

    fn disable_raw_mode(&self) -> io::Result<()>;

    /// Current size as (columns, rows).
    fn size(&self) -> io::Result<(u16, u16)>;
}

/// The real terminal, via crossterm.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermTerminal;

impl TerminalControl for CrosstermTerminal {
    fn enable_raw_mode(&self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }
}

/// Holds raw mode until restored or dropped, whichever comes first.
pub struct RawModeGuard<'a> {
    terminal: &'a dyn TerminalControl,
    active: bool,
}

impl<'a> RawModeGuard<'a> {
    /// Enter raw mode. Failure is logged and leaves the terminal untouched.
    pub fn acquire(terminal: &'a dyn TerminalControl) -> Self {
        let active = match terminal.enable_raw_mode() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("could not enable raw terminal mode: {}", e);
                false
            }
        };
        Self { terminal, active }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Restore the terminal now, reporting the outcome.
    pub fn restore(mut self) -> io::Result<()> {
        self.release()
    }

    fn release(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.terminal.disable_raw_mode()
    }
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("failed to restore terminal: {}", e);
        }
    }
}

/// Run `work` with the terminal in raw mode, restoring it on every exit path.
pub async fn with_raw_mode<F, T>(terminal: &dyn TerminalControl, work: F) -> T
where
    F: Future<Output = T>,
{
    let guard = RawModeGuard::acquire(terminal);
    let result = work.await;
    if let Err(e) = guard.restore() {
        tracing::warn!("failed to restore terminal: {}", e);
    }
    result
}

/// Attach the local terminal to a remote shell and block until it exits.
///
/// Returns the remote exit status when the server reported one.
pub async fn attach(session: &Session, terminal: &dyn TerminalControl) -> Result<Option<u32>> {
    with_raw_mode(terminal, run_shell(session, terminal)).await
}

async fn run_shell(session: &Session, terminal: &dyn TerminalControl) -> Result<Option<u32>> {
    let (cols, rows) = terminal.size().unwrap_or(DEFAULT_SIZE);
    let channel = session.open_channel().await?;

    let modes = [
        (Pty::ECHO, 1),
        (Pty::TTY_OP_ISPEED, BAUD_RATE),
        (Pty::TTY_OP_OSPEED, BAUD_RATE),
    ];
    channel
        .request_pty(true, TERM, u32::from(cols), u32::from(rows), 0, 0, &modes)
        .await
        .map_err(Error::PtyRequest)?;
    channel.request_shell(true).await.map_err(Error::ShellStart)?;

    pump(channel, terminal).await
}

/// Shuttle bytes between local stdio and the shell channel.
async fn pump(mut channel: Channel<Msg>, terminal: &dyn TerminalControl) -> Result<Option<u32>> {
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut resizes = Resizes::new();
    let mut buf = vec![0u8; 8192];
    let mut stdin_open = true;
    let mut exit_status = None;

    loop {
        tokio::select! {
            r = stdin.read(&mut buf), if stdin_open => match r? {
                0 => {
                    stdin_open = false;
                    channel.eof().await?;
                }
                n => channel.data(&buf[..n]).await?,
            },

            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { ref data }) => {
                    stdout.write_all(data).await?;
                    stdout.flush().await?;
                }
                Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    stderr.write_all(data).await?;
                    stderr.flush().await?;
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                    exit_status = Some(status);
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },

            () = resizes.next() => {
                if let Ok((cols, rows)) = terminal.size() {
                    channel
                        .window_change(u32::from(cols), u32::from(rows), 0, 0)
                        .await?;
                }
            }
        }
    }

    Ok(exit_status)
}

/// Local terminal resize notifications.
struct Resizes {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl Resizes {
    fn new() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let signal = signal(SignalKind::window_change())
                .map_err(|e| tracing::debug!("window resize signal unavailable: {}", e))
                .ok();
            Self { signal }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    async fn next(&mut self) {
        #[cfg(unix)]
        {
            if let Some(signal) = self.signal.as_mut()
                && signal.recv().await.is_some()
            {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}
