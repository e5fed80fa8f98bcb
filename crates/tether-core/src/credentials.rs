//! Login credentials presented when opening the socket.
//!
//! String form: `login:password`. The login may not contain ':'; the
//! password may.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A login and password pair.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

// Keeps the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FromStr for Credentials {
    type Err = CredentialsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (login, password) = s
            .split_once(':')
            .ok_or(CredentialsParseError::MissingColon)?;

        if login.is_empty() {
            return Err(CredentialsParseError::EmptyLogin);
        }

        Ok(Self::new(login, password))
    }
}

/// Error parsing a credentials string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsParseError {
    #[error("credentials must be of the form login:password")]
    MissingColon,
    #[error("credentials login cannot be empty")]
    EmptyLogin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pair() {
        let creds: Credentials = "+15551234567.2:s3cr3t".parse().unwrap();
        assert_eq!(creds.login(), "+15551234567.2");
        assert_eq!(creds.password(), "s3cr3t");
    }

    #[test]
    fn password_may_contain_colon() {
        let creds: Credentials = "alice:a:b:c".parse().unwrap();
        assert_eq!(creds.login(), "alice");
        assert_eq!(creds.password(), "a:b:c");
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(
            "alice".parse::<Credentials>(),
            Err(CredentialsParseError::MissingColon)
        );
        assert_eq!(
            ":secret".parse::<Credentials>(),
            Err(CredentialsParseError::EmptyLogin)
        );
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("bob", "hunter2"));
        assert!(rendered.contains("bob"));
        assert!(!rendered.contains("hunter2"));
    }
}
