//! SMTP connection management.

mod config;
mod stream;

pub use config::{DEFAULT_MECHANISMS, Security, SessionConfig, SessionConfigBuilder};
pub use stream::SmtpStream;

use crate::types::{AuthMechanism, Extension, Reply};
use std::collections::HashSet;

/// Server greeting and capabilities from the EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Full greeting banner text.
    pub greeting: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Builds server information from the 220 greeting reply.
    #[must_use]
    pub fn from_greeting(reply: &Reply) -> Self {
        // Hostname is the first word of the banner
        let hostname = reply
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Self {
            hostname,
            greeting: reply.message_text(),
            extensions: HashSet::new(),
        }
    }

    /// Replaces the extensions with those listed in an EHLO reply.
    pub fn set_extensions(&mut self, ehlo: &Reply) {
        // First line is the server's greeting, not an extension
        self.extensions = ehlo
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
    }

    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if 8BITMIME is supported.
    #[must_use]
    pub fn supports_8bitmime(&self) -> bool {
        self.supports(&Extension::EightBitMime)
    }

    /// Returns true if the SIZE extension was advertised.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Returns the maximum message size, if advertised.
    ///
    /// A declared size of zero means no fixed limit.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Returns advertised authentication mechanisms, or `None` if the server
    /// did not advertise AUTH.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Option<&[AuthMechanism]> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
            _ => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;

    fn ehlo_reply(lines: &[&str]) -> Reply {
        Reply::new(
            ReplyCode::OK,
            lines.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn test_from_greeting() {
        let greeting = Reply::new(
            ReplyCode::SERVICE_READY,
            vec!["mx.example.com ESMTP Postfix".to_string()],
        );
        let info = ServerInfo::from_greeting(&greeting);
        assert_eq!(info.hostname, "mx.example.com");
        assert_eq!(info.greeting, "mx.example.com ESMTP Postfix");
        assert!(info.extensions.is_empty());
    }

    #[test]
    fn test_extensions_from_ehlo() {
        let mut info = ServerInfo::default();
        info.set_extensions(&ehlo_reply(&[
            "mx.example.com Hello",
            "SIZE 1000",
            "8BITMIME",
            "AUTH PLAIN LOGIN",
            "STARTTLS",
        ]));

        assert!(info.supports_starttls());
        assert!(info.supports_8bitmime());
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), Some(1000));
        assert_eq!(
            info.auth_mechanisms(),
            Some([AuthMechanism::Plain, AuthMechanism::Login].as_slice())
        );
    }

    #[test]
    fn test_size_zero_means_unlimited() {
        let mut info = ServerInfo::default();
        info.set_extensions(&ehlo_reply(&["mx", "SIZE 0"]));
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), None);
    }

    #[test]
    fn test_no_auth_advertised() {
        let mut info = ServerInfo::default();
        info.set_extensions(&ehlo_reply(&["mx", "PIPELINING"]));
        assert_eq!(info.auth_mechanisms(), None);
    }
}
