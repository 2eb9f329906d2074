// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: One positional target, optional trailing command, and connection flags.

use clap::Parser;
use kssh::resolve::DEFAULT_FRESHNESS_MINUTES;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kssh")]
#[command(about = "Reach devices behind a relay's reverse tunnel over SSH")]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Target as [user@]identifier (MAC address or custom id)
    #[arg(value_name = "[USER@]IDENTIFIER")]
    pub target: Option<String>,

    /// Command to run instead of an interactive shell
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Admin API key for the directory server
    #[arg(short, long, value_name = "KEY")]
    pub key: Option<String>,

    /// Directory server hostname
    #[arg(short, long, value_name = "HOST")]
    pub server: Option<String>,

    /// Ignore node reports older than this many minutes
    #[arg(
        short = 'm',
        long,
        value_name = "MINUTES",
        default_value_t = DEFAULT_FRESHNESS_MINUTES
    )]
    pub freshness: u32,

    /// File of newline-separated commands to run non-interactively
    #[arg(short = 'f', long, value_name = "PATH")]
    pub procedure: Option<PathBuf>,

    /// Relay a local port to the target instead of opening a shell
    #[arg(short, long)]
    pub listen: bool,

    /// Local address for listen mode
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:0")]
    pub bind: SocketAddr,

    /// Verify relay host keys against known_hosts, learning unknown ones
    #[arg(long, value_name = "PATH", num_args = 0..=1, require_equals = true)]
    pub known_hosts: Option<Option<PathBuf>>,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Print version
    #[arg(short = 'v', long)]
    pub version: bool,
}
