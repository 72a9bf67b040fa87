//! Error types for SMTP operations.

use crate::types::ReplyCode;
use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// A connect or I/O timeout elapsed.
    #[error("Timed out while {0}")]
    Timeout(&'static str),

    /// The operation was aborted through an [`AbortHandle`](crate::AbortHandle).
    #[error("Operation aborted")]
    Aborted,

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Protocol error (malformed or unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server rejected the greeting exchange or the credentials.
    #[error("Authentication failed {code}: {message}")]
    Authentication {
        /// Reply code (e.g., 535).
        code: u16,
        /// Message text from server.
        message: String,
    },

    /// Server rejected the sender, a recipient or the message data.
    #[error("Submission failed {code}: {message}")]
    Submission {
        /// Reply code (e.g., 550).
        code: u16,
        /// Message text from server.
        message: String,
    },

    /// Authentication method not recognized, not enabled or not offered.
    #[error("Unsupported authentication method: {0}")]
    UnsupportedAuthMethod(String),

    /// Invalid email address or envelope.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Session already authenticated.
    #[error("Session already authenticated")]
    AlreadyAuthenticated,

    /// Authentication required before submitting.
    #[error("Authentication required")]
    AuthRequired,

    /// Message larger than the server's advertised SIZE limit.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Message size in bytes.
        size: usize,
        /// Limit advertised by the server.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// Rejected session setting.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Creates an authentication error from a reply code and message.
    #[must_use]
    pub fn authentication(code: u16, message: impl Into<String>) -> Self {
        Self::Authentication {
            code,
            message: message.into(),
        }
    }

    /// Creates a submission error from a reply code and message.
    #[must_use]
    pub fn submission(code: u16, message: impl Into<String>) -> Self {
        Self::Submission {
            code,
            message: message.into(),
        }
    }

    /// Returns the server reply code carried by this error, if any.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Authentication { code, .. } | Self::Submission { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if the connection itself is unusable.
    ///
    /// Besides I/O, TLS, timeout and abort failures this covers a server
    /// stream that cannot be parsed and a required STARTTLS that the server
    /// does not offer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::Timeout(_)
                | Self::Aborted
                | Self::ConnectionClosed
                | Self::Protocol(_)
                | Self::NotSupported(_)
        )
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.code(), Some(code) if ReplyCode::new(code).is_permanent())
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.code(), Some(code) if ReplyCode::new(code).is_transient())
    }

    /// Returns the error class name used when reporting to callers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Io(_)
            | Self::Tls(_)
            | Self::Timeout(_)
            | Self::Aborted
            | Self::ConnectionClosed
            | Self::Protocol(_)
            | Self::NotSupported(_) => "TransportError",
            Self::Authentication { .. } => "AuthenticationError",
            Self::Submission { .. } | Self::MessageTooLarge { .. } => "SubmissionError",
            Self::UnsupportedAuthMethod(_) => "UnsupportedAuthMethod",
            Self::InvalidAddress(_) => "InvalidAddress",
            Self::InvalidConfiguration(_) => "InvalidConfiguration",
            Self::AlreadyAuthenticated | Self::AuthRequired | Self::InvalidState(_) => {
                "InvalidState"
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_classification() {
        let err = Error::authentication(535, "5.7.8 Bad credentials");
        assert_eq!(err.code(), Some(535));
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert_eq!(err.kind(), "AuthenticationError");

        let err = Error::submission(452, "Too many recipients");
        assert!(err.is_transient());
        assert_eq!(err.kind(), "SubmissionError");
    }

    #[test]
    fn test_transport_errors() {
        assert!(Error::Timeout("connecting").is_transport());
        assert!(Error::Aborted.is_transport());
        assert!(Error::ConnectionClosed.is_transport());
        assert!(Error::from(io::Error::from(io::ErrorKind::ConnectionRefused)).is_transport());
        assert_eq!(Error::Aborted.kind(), "TransportError");
        assert!(!Error::AuthRequired.is_transport());
        assert_eq!(Error::Aborted.code(), None);
    }

    #[test]
    fn test_unusable_server_stream_is_transport() {
        let err = Error::Protocol("Malformed reply line: \"hello\"".into());
        assert!(err.is_transport());
        assert_eq!(err.kind(), "TransportError");

        let err = Error::NotSupported("STARTTLS".into());
        assert!(err.is_transport());
        assert_eq!(err.kind(), "TransportError");
    }

    #[test]
    fn test_display_keeps_server_text() {
        let err = Error::submission(550, "5.1.1 User unknown");
        assert_eq!(err.to_string(), "Submission failed 550: 5.1.1 User unknown");
    }
}
