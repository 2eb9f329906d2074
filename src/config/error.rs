// ABOUTME: Configuration error types with SNAFU context.
// ABOUTME: Every variant carries the file path it concerns.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to load {}: {source}", path.display()))]
    Load {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{} has no {field} setting", path.display()))]
    Missing { path: PathBuf, field: &'static str },

    #[snafu(display("failed to create directory {}: {source}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    Save {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read configuration for {}: {source}", path.display()))]
    Prompt {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
