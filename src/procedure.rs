// ABOUTME: Non-interactive command sources: a procedure file and trailing arguments.
// ABOUTME: Produces the single command line sent to the target's exec channel.

use nonempty::NonEmpty;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("failed to read procedure {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("procedure {} contains no commands", .0.display())]
    Empty(PathBuf),
}

/// Commands run one after another, stopping at the first failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    commands: NonEmpty<String>,
}

impl Procedure {
    /// Combine trailing command words and an optional procedure file.
    ///
    /// The joined words form the first command, followed by the file's
    /// non-blank lines. `Ok(None)` means there is nothing to run and the
    /// caller should open a shell. A file that contributes to an otherwise
    /// empty procedure is an error.
    pub fn from_sources(
        args: &[String],
        file: Option<&Path>,
    ) -> Result<Option<Self>, ProcedureError> {
        let mut commands: Vec<String> = Self::from_args(args)
            .map(|procedure| Vec::from(procedure.commands))
            .unwrap_or_default();

        let Some(path) = file else {
            return Ok(NonEmpty::from_vec(commands).map(|commands| Self { commands }));
        };

        let content = std::fs::read_to_string(path).map_err(|source| ProcedureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(procedure) = Self::parse(&content) {
            commands.extend(procedure.commands);
        }
        NonEmpty::from_vec(commands)
            .map(|commands| Some(Self { commands }))
            .ok_or_else(|| ProcedureError::Empty(path.to_path_buf()))
    }

    /// Split into commands, one per line. Blank lines are skipped.
    pub fn parse(content: &str) -> Option<Self> {
        let commands = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        NonEmpty::from_vec(commands).map(|commands| Self { commands })
    }

    /// Trailing command-line words joined into one command.
    pub fn from_args(args: &[String]) -> Option<Self> {
        let line = args.join(" ");
        if line.trim().is_empty() {
            return None;
        }
        Some(Self {
            commands: NonEmpty::new(line),
        })
    }

    pub fn commands(&self) -> &NonEmpty<String> {
        &self.commands
    }

    pub fn command_line(&self) -> String {
        self.commands
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" && ")
    }
}
