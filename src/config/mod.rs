// ABOUTME: Configuration file handling for kssh.conf.
// ABOUTME: Newline-delimited `Key value` lines under the user config directory.

mod error;
mod init;

pub use error::{ConfigError, Result};
pub use init::init_config;

use crate::prompt::Prompt;
use error::{CreateDirSnafu, LoadSnafu, MissingSnafu, SaveSnafu};
use snafu::{OptionExt, ResultExt};
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "kssh.conf";

const KEY_SERVER: &str = "Server";
const KEY_ADMIN_KEY: &str = "AdminKey";
const KEY_DEFAULT_USER: &str = "DefaultUser";
const KEY_DEFAULT_PASSWORD: &str = "DefaultPassword";

/// Settings needed to reach the directory service.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Directory server hostname or URL.
    pub server: String,
    /// Admin API key for the directory server.
    pub api_key: String,
    /// Username used when the target has no `user@` part.
    pub default_user: Option<String>,
    /// Password tried once, unprompted, together with `default_user`.
    pub default_password: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("api_key", &"<redacted>")
            .field("default_user", &self.default_user)
            .field(
                "default_password",
                &self.default_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Where configuration values may come from, in precedence order.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub path: PathBuf,
    pub api_key: Option<String>,
    pub server: Option<String>,
}

impl Config {
    pub fn new(server: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            api_key: api_key.into(),
            default_user: None,
            default_password: None,
        }
    }

    /// Parse `Key value` lines. Unknown keys and blank lines are ignored.
    pub fn parse(content: &str) -> Self {
        let mut config = Config::default();
        for line in content.lines() {
            let Some((key, value)) = line.trim_start().split_once(' ') else {
                continue;
            };
            let value = value.trim().to_string();
            match key {
                KEY_SERVER => config.server = value,
                KEY_ADMIN_KEY => config.api_key = value,
                KEY_DEFAULT_USER => config.default_user = Some(value).filter(|v| !v.is_empty()),
                KEY_DEFAULT_PASSWORD => {
                    config.default_password = Some(value).filter(|v| !v.is_empty())
                }
                _ => {}
            }
        }
        config
    }

    /// Render back to the file format.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{KEY_SERVER} {}\n{KEY_ADMIN_KEY} {}\n",
            self.server, self.api_key
        );
        if let Some(user) = &self.default_user {
            out.push_str(&format!("{KEY_DEFAULT_USER} {user}\n"));
        }
        if let Some(password) = &self.default_password {
            out.push_str(&format!("{KEY_DEFAULT_PASSWORD} {password}\n"));
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context(LoadSnafu { path })?;
        let config = Self::parse(&content);

        Some(&config.server)
            .filter(|s| !s.is_empty())
            .context(MissingSnafu {
                path,
                field: KEY_SERVER,
            })?;
        Some(&config.api_key)
            .filter(|s| !s.is_empty())
            .context(MissingSnafu {
                path,
                field: KEY_ADMIN_KEY,
            })?;

        Ok(config)
    }

    /// Write the file, creating its directory if needed. The file is private to the user.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).context(CreateDirSnafu { path: parent })?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        use std::io::Write;
        let mut file = options.open(path).context(SaveSnafu { path })?;
        file.write_all(self.render().as_bytes())
            .context(SaveSnafu { path })?;
        Ok(())
    }

    /// Resolve configuration from flags, the file, or first-run prompting.
    ///
    /// Both flags together bypass the file. Otherwise an existing file is
    /// loaded, with any single flag overriding its field. Without a file the
    /// user is asked and the answers are saved.
    pub fn from_sources(sources: &ConfigSources, prompt: &dyn Prompt) -> Result<Self> {
        if let (Some(api_key), Some(server)) = (&sources.api_key, &sources.server) {
            return Ok(Config::new(server, api_key));
        }

        let mut config = if sources.path.exists() {
            Config::load(&sources.path)?
        } else {
            init_config(&sources.path, prompt)?
        };

        if let Some(api_key) = &sources.api_key {
            config.api_key = api_key.clone();
        }
        if let Some(server) = &sources.server {
            config.server = server.clone();
        }
        Ok(config)
    }
}

/// Default configuration path under the user's config directory.
pub fn default_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(CONFIG_FILENAME),
        None => PathBuf::from(CONFIG_FILENAME),
    }
}
