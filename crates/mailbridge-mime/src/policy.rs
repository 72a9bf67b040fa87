//! Line length policies.

use crate::error::{Error, Result};

/// Maximum line lengths applied when folding encoded text.
///
/// The first physical line of every paragraph is limited by
/// `first_line_max`; lines produced after a fold are limited by
/// `continuation_line_max`. Lengths count octets and exclude the CRLF
/// terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinePolicy {
    first_line_max: usize,
    continuation_line_max: usize,
}

impl LinePolicy {
    /// Recommended limit from RFC 5322 section 2.1.1 (78 characters).
    pub const RECOMMENDED: Self = Self {
        first_line_max: 78,
        continuation_line_max: 78,
    };

    /// Mandatory limit from RFC 5322 section 2.1.1 (998 characters).
    pub const MANDATORY: Self = Self {
        first_line_max: 998,
        continuation_line_max: 998,
    };

    /// Creates a new policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if either limit is zero.
    pub fn new(first_line_max: usize, continuation_line_max: usize) -> Result<Self> {
        if first_line_max == 0 {
            return Err(Error::InvalidConfiguration(
                "first line max length must be positive".into(),
            ));
        }
        if continuation_line_max == 0 {
            return Err(Error::InvalidConfiguration(
                "continuation line max length must be positive".into(),
            ));
        }

        Ok(Self {
            first_line_max,
            continuation_line_max,
        })
    }

    /// Creates a policy from signed values, as received from untyped callers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if either limit is not positive.
    pub fn from_signed(first_line_max: i64, continuation_line_max: i64) -> Result<Self> {
        let first = usize::try_from(first_line_max).map_err(|_| {
            Error::InvalidConfiguration(format!(
                "first line max length must be positive, got {first_line_max}"
            ))
        })?;
        let continuation = usize::try_from(continuation_line_max).map_err(|_| {
            Error::InvalidConfiguration(format!(
                "continuation line max length must be positive, got {continuation_line_max}"
            ))
        })?;
        Self::new(first, continuation)
    }

    /// Returns the limit for the first line of a paragraph.
    #[must_use]
    pub const fn first_line_max(self) -> usize {
        self.first_line_max
    }

    /// Returns the limit for lines following a fold.
    #[must_use]
    pub const fn continuation_line_max(self) -> usize {
        self.continuation_line_max
    }
}

impl Default for LinePolicy {
    fn default() -> Self {
        Self::RECOMMENDED
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
    fn test_new_policy() {
        let policy = LinePolicy::new(40, 60).unwrap();
        assert_eq!(policy.first_line_max(), 40);
        assert_eq!(policy.continuation_line_max(), 60);
    }

    #[test]
    fn test_zero_rejected() {
        assert!(matches!(
            LinePolicy::new(0, 78),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            LinePolicy::new(78, 0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_negative_rejected() {
        let err = LinePolicy::from_signed(-1, 78).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfiguration");
        assert!(err.to_string().contains("-1"));
        assert!(LinePolicy::from_signed(78, -5).is_err());
        assert!(LinePolicy::from_signed(0, 0).is_err());
    }

    #[test]
    fn test_default_is_recommended() {
        assert_eq!(LinePolicy::default(), LinePolicy::RECOMMENDED);
        assert_eq!(LinePolicy::RECOMMENDED.first_line_max(), 78);
        assert_eq!(LinePolicy::MANDATORY.continuation_line_max(), 998);
    }
}
