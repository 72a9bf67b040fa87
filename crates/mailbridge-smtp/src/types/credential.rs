//! Authentication credentials.

use super::AuthMechanism;
use crate::error::{Error, Result};
use std::fmt;

/// How a session authenticates after the greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// Skip AUTH entirely.
    None,
    /// Run a SASL exchange with the given mechanism.
    Sasl(AuthMechanism),
    /// Upgrade with STARTTLS, whatever the configured security, then LOGIN.
    StartTlsLogin,
}

impl AuthMethod {
    /// Parses a method name such as `NONE`, `LOGIN`, `XOAUTH2` or `START_TLS`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAuthMethod`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "NONE" => Ok(Self::None),
            "START_TLS" | "STARTTLS" => Ok(Self::StartTlsLogin),
            name => AuthMechanism::parse(name)
                .map(Self::Sasl)
                .ok_or_else(|| Error::UnsupportedAuthMethod(s.to_string())),
        }
    }

    /// Returns the SASL mechanism this method runs, if any.
    #[must_use]
    pub const fn mechanism(self) -> Option<AuthMechanism> {
        match self {
            Self::None => None,
            Self::Sasl(mechanism) => Some(mechanism),
            Self::StartTlsLogin => Some(AuthMechanism::Login),
        }
    }

    /// Returns the canonical method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Sasl(mechanism) => mechanism.as_str(),
            Self::StartTlsLogin => "START_TLS",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username, secret and method supplied to `authenticate`.
///
/// For the OAuth mechanisms the password is the bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Username or email address.
    pub username: String,
    /// Password or access token.
    pub password: String,
    /// Authentication method.
    pub method: AuthMethod,
}

impl Credential {
    /// Creates a credential.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>, method: AuthMethod) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            method,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("method", &self.method)
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_methods() {
        assert_eq!(AuthMethod::parse("NONE").unwrap(), AuthMethod::None);
        assert_eq!(
            AuthMethod::parse("login").unwrap(),
            AuthMethod::Sasl(AuthMechanism::Login)
        );
        assert_eq!(
            AuthMethod::parse("START_TLS").unwrap(),
            AuthMethod::StartTlsLogin
        );
        assert_eq!(
            AuthMethod::parse("CRAM-MD5").unwrap(),
            AuthMethod::Sasl(AuthMechanism::CramMd5)
        );
    }

    #[test]
    fn test_parse_unknown_method() {
        let err = AuthMethod::parse("KERBEROS").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAuthMethod(ref name) if name == "KERBEROS"));
        assert_eq!(err.kind(), "UnsupportedAuthMethod");
    }

    #[test]
    fn test_method_mechanism() {
        assert_eq!(AuthMethod::None.mechanism(), None);
        assert_eq!(
            AuthMethod::StartTlsLogin.mechanism(),
            Some(AuthMechanism::Login)
        );
        assert_eq!(AuthMethod::Sasl(AuthMechanism::Plain).to_string(), "PLAIN");
    }

    #[test]
    fn test_debug_redacts_password() {
        let credential = Credential::new("user", "hunter2", AuthMethod::None);
        let debug = format!("{credential:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
