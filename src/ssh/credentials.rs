// ABOUTME: Target login credentials carried across connect attempts.
// ABOUTME: Passwords are replaced after a rejection and never printed.

use std::fmt;

/// Username and password for the target hop.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: None,
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Swap in a freshly collected password.
    pub fn replace_password(&mut self, password: String) {
        self.password = Some(password);
    }

    pub(crate) fn password_str(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Username for the current OS user, used when nothing else names one.
pub fn current_user() -> String {
    #[cfg(windows)]
    const USER_VAR: &str = "USERNAME";
    #[cfg(not(windows))]
    const USER_VAR: &str = "USER";

    std::env::var(USER_VAR)
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "root".to_string())
}
