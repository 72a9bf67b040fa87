//! Error types for transfer-encoding operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid codec construction parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Character outside the range allowed by the transfer encoding.
    #[error("Encoding error: non-ASCII character {character:?} at line {line}, offset {offset}")]
    NonAscii {
        /// The offending character.
        character: char,
        /// Byte offset of the character in the input text.
        offset: usize,
        /// 1-based line (paragraph) number.
        line: usize,
    },
}

impl Error {
    /// Returns the error class name used when reporting to callers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "InvalidConfiguration",
            Self::NonAscii { .. } => "EncodingError",
        }
    }
}
