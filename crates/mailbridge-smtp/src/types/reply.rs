//! SMTP reply types.

use std::fmt;

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Server challenge, continue authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);

    /// Creates a reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the first digit, which carries the reply class.
    #[must_use]
    pub const fn class(self) -> u16 {
        self.0 / 100
    }

    /// Returns true for 2xx.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class() == 2
    }

    /// Returns true for 4xx.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.class() == 4
    }

    /// Returns true for 5xx.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.class() == 5
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Complete (possibly multi-line) reply from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code.
    pub code: ReplyCode,
    /// Text of each line, without code and separator.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if the reply code is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if the reply carries exactly `code`.
    #[must_use]
    pub fn is(&self, code: ReplyCode) -> bool {
        self.code == code
    }

    /// Returns the reply text, lines joined with `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message_text())
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
    fn test_code_classes() {
        assert!(ReplyCode::OK.is_success());
        assert!(ReplyCode::AUTH_SUCCESS.is_success());
        assert_eq!(ReplyCode::START_DATA.class(), 3);
        assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
        assert!(ReplyCode::AUTH_FAILED.is_permanent());
        assert!(!ReplyCode::new(199).is_success());
        assert_eq!(ReplyCode::new(451).class(), 4);
    }

    #[test]
    fn test_reply_text() {
        let reply = Reply::new(
            ReplyCode::SERVICE_READY,
            vec!["mx.example.com ESMTP".to_string(), "ready".to_string()],
        );
        assert!(reply.is(ReplyCode::SERVICE_READY));
        assert_eq!(reply.message_text(), "mx.example.com ESMTP\nready");
        assert_eq!(reply.to_string(), "220 mx.example.com ESMTP\nready");
    }

    #[test]
    fn test_empty_reply_text() {
        let reply = Reply::new(ReplyCode::OK, vec![]);
        assert_eq!(reply.message_text(), "");
        assert!(reply.is_success());
    }
}
