// ABOUTME: First-run configuration collection.
// ABOUTME: Asks for the directory server and admin key, then saves them once.

use std::path::Path;

use snafu::ResultExt;

use super::Config;
use super::error::{PromptSnafu, Result};
use crate::prompt::Prompt;

/// Collect the required settings interactively and write them to `path`.
pub fn init_config(path: &Path, prompt: &dyn Prompt) -> Result<Config> {
    prompt.notify(&format!("Creating configuration file: {}", path.display()));

    let server = prompt
        .read_required("Directory server (ex. xxx.yyy.com): ")
        .context(PromptSnafu { path })?;
    let api_key = prompt
        .read_required("Admin API key: ")
        .context(PromptSnafu { path })?;

    let config = Config::new(server, api_key);
    config.save(path)?;
    Ok(config)
}
