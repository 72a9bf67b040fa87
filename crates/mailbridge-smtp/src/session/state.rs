//! Session lifecycle states.

use std::fmt;

/// Where a [`SmtpSession`](super::SmtpSession) is in its lifecycle.
///
/// ```text
/// Disconnected → Connected → Greeted → Authenticated → Ready → Submitting → Completed
///                    └──────────┴────────────┴────────────┴──────────┴─────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport open, greeting not yet read.
    Connected,
    /// Greeting read and EHLO (or HELO) accepted.
    Greeted,
    /// Authentication completed, or skipped with `NONE`.
    Authenticated,
    /// MAIL FROM and every RCPT TO accepted.
    Ready,
    /// DATA accepted, message being transmitted.
    Submitting,
    /// Final 2xx reply received for the message.
    Completed,
    /// A network or protocol failure ended the session.
    Failed,
}

impl SessionState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::Greeted => "Greeted",
            Self::Authenticated => "Authenticated",
            Self::Ready => "Ready",
            Self::Submitting => "Submitting",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Returns true for `Completed` and `Failed`; only `reset` leaves them.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true once authentication succeeded and the session has not
    /// yet finished its submission.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Ready | Self::Submitting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Disconnected.is_terminal());
        assert!(!SessionState::Submitting.is_terminal());
    }

    #[test]
    fn test_authenticated_states() {
        assert!(SessionState::Authenticated.is_authenticated());
        assert!(SessionState::Ready.is_authenticated());
        assert!(!SessionState::Greeted.is_authenticated());
        assert!(!SessionState::Completed.is_authenticated());
    }

    #[test]
    fn test_default_and_display() {
        assert_eq!(SessionState::default(), SessionState::Disconnected);
        assert_eq!(SessionState::Submitting.to_string(), "Submitting");
    }
}
