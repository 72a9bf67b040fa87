//! SMTP command builder.

use crate::types::{Address, AuthMechanism};

/// BODY parameter of `MAIL FROM` (RFC 6152).
///
/// Only sent for 8-bit content; 7-bit messages omit the parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    /// `BODY=8BITMIME`
    EightBitMime,
}

impl Body {
    const fn as_str(self) -> &'static str {
        match self {
            Self::EightBitMime => "8BITMIME",
        }
    }
}

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Base64 initial response (SASL-IR)
        initial_response: Option<String>,
    },
    /// Base64 line answering a 334 challenge
    SaslResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Reverse path
        from: Address,
        /// BODY parameter
        body: Option<Body>,
        /// SIZE parameter
        size: Option<usize>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Forward path
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut line = self.render(false);
        line.push_str("\r\n");
        line.into_bytes()
    }

    /// Returns the command as it may appear in logs, with secrets replaced.
    #[must_use]
    pub fn log_line(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let secret = |s: &str| {
            if redact {
                "<redacted>".to_string()
            } else {
                s.to_string()
            }
        };

        match self {
            Self::Helo { hostname } => format!("HELO {hostname}"),
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => format!("AUTH {mechanism}"),
            Self::Auth {
                mechanism,
                initial_response: Some(resp),
            } => {
                // RFC 4954: a zero-length initial response is sent as "="
                let resp = if resp.is_empty() { "=" } else { resp };
                format!("AUTH {mechanism} {}", secret(resp))
            }
            Self::SaslResponse(resp) => secret(resp),
            Self::MailFrom { from, body, size } => {
                let mut line = format!("MAIL FROM:<{from}>");
                if let Some(body) = body {
                    line.push_str(" BODY=");
                    line.push_str(body.as_str());
                }
                if let Some(size) = size {
                    line.push_str(&format!(" SIZE={size}"));
                }
                line
            }
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Quit => "QUIT".to_string(),
        }
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
    fn test_greeting_commands() {
        let ehlo = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(ehlo.serialize(), b"EHLO client.example.com\r\n");
        let helo = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(helo.serialize(), b"HELO client.example.com\r\n");
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
    }

    #[test]
    fn test_auth_initial_response_redacted_in_log() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
        assert_eq!(cmd.log_line(), "AUTH PLAIN <redacted>");

        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        assert_eq!(cmd.serialize(), b"AUTH LOGIN\r\n");
    }

    #[test]
    fn test_empty_initial_response() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::XOAuth2,
            initial_response: Some(String::new()),
        };
        assert_eq!(cmd.serialize(), b"AUTH XOAUTH2 =\r\n");
    }

    #[test]
    fn test_sasl_response() {
        let cmd = Command::SaslResponse("dXNlcg==".to_string());
        assert_eq!(cmd.serialize(), b"dXNlcg==\r\n");
        assert_eq!(cmd.log_line(), "<redacted>");
        assert_eq!(Command::SaslResponse(String::new()).serialize(), b"\r\n");
    }

    #[test]
    fn test_mail_from() {
        let from = Address::new("sender@example.com").unwrap();
        let cmd = Command::MailFrom {
            from: from.clone(),
            body: None,
            size: None,
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com>\r\n");

        let cmd = Command::MailFrom {
            from,
            body: Some(Body::EightBitMime),
            size: Some(12345),
        };
        assert_eq!(
            cmd.serialize(),
            b"MAIL FROM:<sender@example.com> BODY=8BITMIME SIZE=12345\r\n"
        );
        assert_eq!(
            cmd.log_line(),
            "MAIL FROM:<sender@example.com> BODY=8BITMIME SIZE=12345"
        );
    }

    #[test]
    fn test_transaction_commands() {
        let cmd = Command::RcptTo {
            to: Address::new("recipient@example.com").unwrap(),
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }
}
