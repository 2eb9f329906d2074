// ABOUTME: Parsing of the `[user@]identifier` target argument.
// ABOUTME: Decides the lookup kind and which username/password the target hop uses.

use crate::ssh::{Credentials, current_user};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target cannot be empty")]
    Empty,

    #[error("username before '@' cannot be empty")]
    EmptyUser,

    #[error("identifier after '@' cannot be empty")]
    EmptyIdentifier,
}

/// How the directory is asked about an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// A MAC address (five colons), looked up as the node id.
    Mac,
    /// Anything else, looked up as a custom id.
    Custom,
}

/// The positional target argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user: Option<String>,
    pub identifier: String,
}

impl Target {
    pub fn parse(value: &str) -> Result<Self, TargetError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(TargetError::Empty);
        }

        // Only a single '@' separates a user; anything else is part of the identifier.
        if value.matches('@').count() == 1 {
            let (user, identifier) = value.split_once('@').unwrap_or((value, ""));
            if user.is_empty() {
                return Err(TargetError::EmptyUser);
            }
            if identifier.is_empty() {
                return Err(TargetError::EmptyIdentifier);
            }
            return Ok(Self {
                user: Some(user.to_string()),
                identifier: identifier.to_string(),
            });
        }

        Ok(Self {
            user: None,
            identifier: value.to_string(),
        })
    }

    pub fn kind(&self) -> IdentifierKind {
        if self.identifier.matches(':').count() == 5 {
            IdentifierKind::Mac
        } else {
            IdentifierKind::Custom
        }
    }

    /// Credentials for the target hop.
    ///
    /// An explicit `user@` wins and never carries a default password. Otherwise
    /// the configured default user (with its password) is used, then the OS user.
    pub fn credentials(
        &self,
        default_user: Option<&str>,
        default_password: Option<&str>,
    ) -> Credentials {
        if let Some(user) = &self.user {
            return Credentials::new(user);
        }
        match default_user {
            Some(user) => {
                let credentials = Credentials::new(user);
                match default_password {
                    Some(password) => credentials.password(password),
                    None => credentials,
                }
            }
            None => Credentials::new(current_user()),
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(f, "{}@{}", user, self.identifier),
            None => write!(f, "{}", self.identifier),
        }
    }
}
