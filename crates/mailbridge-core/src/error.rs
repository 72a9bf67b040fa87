//! Error types for the bridge.

use thiserror::Error;

/// Errors reported across the request/response boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A request field is missing or has the wrong JSON type.
    #[error("Invalid argument type: {0}")]
    InvalidArgumentType(String),

    /// A request or configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No open session has this id.
    #[error("Unknown session: {0}")]
    UnknownSession(u64),

    /// The session is running another operation.
    #[error("Session {0} is busy with another operation")]
    Busy(u64),

    /// Codec failure.
    #[error(transparent)]
    Mime(#[from] mailbridge_mime::Error),

    /// SMTP session failure.
    #[error(transparent)]
    Smtp(#[from] mailbridge_smtp::Error),

    /// Malformed JSON.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the error class name rendered as `error.kind`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgumentType(_) | Self::Serde(_) => "InvalidArgumentType",
            Self::InvalidConfiguration(_) => "InvalidConfiguration",
            Self::UnknownSession(_) => "UnknownSession",
            Self::Busy(_) => "Busy",
            Self::Mime(e) => e.kind(),
            Self::Smtp(e) => e.kind(),
            Self::Io(_) => "IoError",
        }
    }

    /// Returns the SMTP reply code behind the error, if any.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Smtp(e) => e.code(),
            _ => None,
        }
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        Self::InvalidArgumentType(message.into())
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_passes_through_wrapped_errors() {
        let err = Error::from(mailbridge_mime::Error::NonAscii {
            character: 'é',
            offset: 3,
            line: 1,
        });
        assert_eq!(err.kind(), "EncodingError");

        let err = Error::from(mailbridge_smtp::Error::submission(552, "too big"));
        assert_eq!(err.kind(), "SubmissionError");
        assert_eq!(err.code(), Some(552));
        assert_eq!(err.to_string(), "Submission failed 552: too big");
    }

    #[test]
    fn test_boundary_kinds() {
        assert_eq!(Error::argument("x").kind(), "InvalidArgumentType");
        assert_eq!(Error::configuration("x").kind(), "InvalidConfiguration");
        assert_eq!(Error::Busy(3).kind(), "Busy");
        assert_eq!(Error::UnknownSession(3).code(), None);
    }
}
