//! Envelope address types.

use crate::error::{Error, Result};
use std::fmt;

/// Address used in `MAIL FROM` and `RCPT TO` paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates an address after checking it is usable as an SMTP path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is empty, lacks a
    /// local part or domain, or contains characters that would break the
    /// command line.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let invalid = |reason: &str| Error::InvalidAddress(format!("{addr:?}: {reason}"));

        if addr.is_empty() {
            return Err(invalid("address is empty"));
        }
        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>'))
        {
            return Err(invalid("contains whitespace, control or angle bracket characters"));
        }
        let Some((local, domain)) = addr.rsplit_once('@') else {
            return Err(invalid("missing @"));
        };
        if local.is_empty() || domain.is_empty() {
            return Err(invalid("local part and domain must not be empty"));
        }

        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mailbox from a header field: optional display name plus address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name, unquoted.
    pub name: Option<String>,
    /// Address.
    pub address: Address,
}

impl Mailbox {
    /// Creates a mailbox with just an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: None,
            address: Address::new(address)?,
        })
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
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_quoted_local_part_with_at() {
        let addr = Address::new("\"a@b\"@example.com").unwrap();
        assert_eq!(addr.as_str(), "\"a@b\"@example.com");
    }

    #[test]
    fn test_invalid_addresses() {
        for bad in [
            "",
            "userexample.com",
            "@example.com",
            "user@",
            "user @example.com",
            "user@example.com>\r\nRCPT TO:<x@y",
            "<user@example.com>",
        ] {
            let err = Address::new(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidAddress(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_mailbox_without_name() {
        let mailbox = Mailbox::new("user@example.com").unwrap();
        assert!(mailbox.name.is_none());
        assert_eq!(mailbox.address.as_str(), "user@example.com");
        assert!(Mailbox::new("nobody").is_err());
    }
}
