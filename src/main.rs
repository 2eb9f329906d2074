// ABOUTME: Entry point for the kssh CLI application.
// ABOUTME: Resolves the target, then opens a shell, runs a command, or relays a port.

mod cli;

use chrono::{Duration, Utc};
use clap::Parser;
use cli::Cli;
use kssh::config::{self, Config, ConfigSources};
use kssh::directory::HttpDirectory;
use kssh::error::{Error, Result};
use kssh::procedure::Procedure;
use kssh::prompt::ConsolePrompt;
use kssh::resolve::{LookupError, Resolved, Resolver};
use kssh::ssh::terminal::{self, CrosstermTerminal};
use kssh::ssh::{self, HostKeyPolicy, PortRelay, Session, SessionEstablisher, SshDialer};
use kssh::target::Target;
use std::io::Write;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    };

    // A pending stdin read would otherwise hold the runtime open on shutdown.
    std::io::stdout().flush().ok();
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    if cli.version {
        println!("kssh {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let target: Target = cli
        .target
        .as_deref()
        .ok_or_else(|| Error::Usage("missing target, see --help".to_string()))?
        .parse()?;

    let procedure = Procedure::from_sources(&cli.command, cli.procedure.as_deref())?;
    if let Some(procedure) = &procedure {
        tracing::debug!(commands = procedure.commands().len(), "procedure loaded");
    }

    let prompt = ConsolePrompt;
    let sources = ConfigSources {
        path: cli.config.clone().unwrap_or_else(config::default_path),
        api_key: cli.key.clone(),
        server: cli.server.clone(),
    };
    let config = Config::from_sources(&sources, &prompt)?;
    tracing::debug!(server = %config.server, "configuration loaded");

    let directory =
        HttpDirectory::new(&config.server, config.api_key.clone()).map_err(LookupError::from)?;
    let resolved = Resolver::new(&directory, &prompt)
        .freshness(Duration::minutes(i64::from(cli.freshness)))
        .resolve(&target, Utc::now())
        .await?;

    let dialer = SshDialer::new(host_key_policy(cli.known_hosts));

    if cli.listen {
        return listen(dialer, resolved, cli.bind).await;
    }

    let credentials = target.credentials(
        config.default_user.as_deref(),
        config.default_password.as_deref(),
    );
    let session = SessionEstablisher::new(dialer, &prompt)
        .connect(&resolved.relay, resolved.target_port(), credentials)
        .await?;

    let result = match procedure {
        Some(procedure) => run_procedure(&session, &procedure).await,
        None => interactive(&session).await,
    };
    session.close().await;
    result
}

fn host_key_policy(known_hosts: Option<Option<std::path::PathBuf>>) -> HostKeyPolicy {
    match known_hosts {
        Some(path) => HostKeyPolicy::KnownHosts {
            trust_on_first_use: true,
            path,
        },
        None => HostKeyPolicy::AcceptAny,
    }
}

async fn run_procedure(session: &Session, procedure: &Procedure) -> Result<()> {
    let output = session.execute_command(&procedure.command_line()).await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output.output)
        .and_then(|()| stdout.flush())
        .map_err(ssh::Error::Io)?;

    if output.success() {
        tracing::debug!("procedure finished");
    } else {
        tracing::warn!(exit_code = ?output.exit_code, "procedure did not complete successfully");
    }
    Ok(())
}

async fn interactive(session: &Session) -> Result<()> {
    let status = terminal::attach(session, &CrosstermTerminal).await?;
    tracing::debug!(exit_code = ?status, "shell exited");
    Ok(())
}

async fn listen(dialer: SshDialer, resolved: Resolved, bind: SocketAddr) -> Result<()> {
    let port = resolved.target_port();
    let relay = PortRelay::bind(dialer, resolved.relay, port, bind)
        .await
        .map_err(Error::Listen)?;
    let local = relay.local_addr().map_err(Error::Listen)?;
    println!("listening local port {}", local.port());

    relay.serve().await;
    Ok(())
}
