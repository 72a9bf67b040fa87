//! ESMTP extension keywords and SASL mechanism names.

use std::fmt;

/// Extension advertised in an EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS (RFC 3207).
    StartTls,
    /// AUTH with the advertised mechanisms the client recognizes.
    Auth(Vec<AuthMechanism>),
    /// SIZE with the optional declared limit (RFC 1870).
    Size(Option<usize>),
    /// 8BITMIME (RFC 6152).
    EightBitMime,
    /// PIPELINING (RFC 2920).
    Pipelining,
    /// SMTPUTF8 (RFC 6531).
    SmtpUtf8,
    /// Any other keyword, upper-cased, parameters dropped.
    Other(String),
}

impl Extension {
    /// Parses one EHLO capability line (without the reply code).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default().to_ascii_uppercase();

        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(words.filter_map(AuthMechanism::parse).collect()),
            // Pre-standard "AUTH=PLAIN LOGIN" form
            k if k.starts_with("AUTH=") => Self::Auth(
                std::iter::once(&k[5..])
                    .chain(words)
                    .filter_map(AuthMechanism::parse)
                    .collect(),
            ),
            "SIZE" => Self::Size(words.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Other(keyword),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN (RFC 4616).
    Plain,
    /// LOGIN, the legacy username/password prompt exchange.
    Login,
    /// CRAM-MD5 (RFC 2195) challenge-response.
    CramMd5,
    /// `XOAUTH2` bearer token (Google/Microsoft).
    XOAuth2,
    /// `OAUTHBEARER` (RFC 7628).
    OAuthBearer,
}

impl AuthMechanism {
    /// Parses a mechanism name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" | "CRAM_MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            "OAUTHBEARER" => Some(Self::OAuthBearer),
            _ => None,
        }
    }

    /// Returns the mechanism name as sent in the AUTH command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
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
    fn test_keywords_case_insensitive() {
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
        assert_eq!(Extension::parse("Pipelining"), Extension::Pipelining);
        assert_eq!(Extension::parse("SMTPUTF8"), Extension::SmtpUtf8);
    }

    #[test]
    fn test_auth_list_skips_unknown_mechanisms() {
        assert_eq!(
            Extension::parse("AUTH PLAIN GSSAPI LOGIN XOAUTH2"),
            Extension::Auth(vec![
                AuthMechanism::Plain,
                AuthMechanism::Login,
                AuthMechanism::XOAuth2
            ])
        );
    }

    #[test]
    fn test_legacy_auth_equals_form() {
        assert_eq!(
            Extension::parse("AUTH=PLAIN LOGIN"),
            Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::Login])
        );
    }

    #[test]
    fn test_size() {
        assert_eq!(
            Extension::parse("SIZE 52428800"),
            Extension::Size(Some(52428800))
        );
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        assert_eq!(Extension::parse("SIZE lots"), Extension::Size(None));
    }

    #[test]
    fn test_other_keyword() {
        assert_eq!(
            Extension::parse("dsn"),
            Extension::Other("DSN".to_string())
        );
        assert_eq!(Extension::parse(""), Extension::Other(String::new()));
    }

    #[test]
    fn test_mechanism_names() {
        for mechanism in [
            AuthMechanism::Plain,
            AuthMechanism::Login,
            AuthMechanism::CramMd5,
            AuthMechanism::XOAuth2,
            AuthMechanism::OAuthBearer,
        ] {
            assert_eq!(AuthMechanism::parse(mechanism.as_str()), Some(mechanism));
        }
        assert_eq!(AuthMechanism::parse("login"), Some(AuthMechanism::Login));
        assert_eq!(AuthMechanism::parse("GSSAPI"), None);
        assert_eq!(AuthMechanism::XOAuth2.to_string(), "XOAUTH2");
    }
}
