//! 7bit and 8bit content-transfer-encoding.
//!
//! Both encodings split text into CRLF-delimited paragraphs and fold each
//! paragraph to the configured [`LinePolicy`]. `7bit` additionally rejects
//! any character outside US-ASCII.

use crate::error::{Error, Result};
use crate::fold::fold_paragraph;
use crate::policy::LinePolicy;
use std::fmt;

const CRLF: &str = "\r\n";

/// Ordered lines produced by encoding, without line terminators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EncodedLines(Vec<String>);

impl EncodedLines {
    /// Returns the lines as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of lines.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the lines.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Consumes the sequence, returning the lines.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for EncodedLines {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

impl AsRef<[String]> for EncodedLines {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}

impl IntoIterator for EncodedLines {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a EncodedLines {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A line-oriented content-transfer-encoding.
///
/// Implementors supply the line policy and the character validation; the
/// paragraph splitting, folding and joining are shared.
pub trait TransferCodec {
    /// Returns the line policy used for folding.
    fn policy(&self) -> LinePolicy;

    /// Checks that `text` only contains characters allowed by the encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonAscii`] for the first disallowed character.
    fn validate(&self, text: &str) -> Result<()>;

    /// Encodes text into policy-compliant lines.
    ///
    /// A single trailing CRLF terminates the last line and does not produce
    /// an empty entry. Empty text encodes to no lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the text violates the encoding's character set.
    fn encode(&self, text: &str) -> Result<EncodedLines> {
        self.validate(text)?;

        if text.is_empty() {
            return Ok(EncodedLines::default());
        }

        let body = text.strip_suffix(CRLF).unwrap_or(text);
        let policy = self.policy();
        let mut lines = Vec::new();
        for paragraph in body.split(CRLF) {
            fold_paragraph(paragraph, policy, &mut lines);
        }

        Ok(EncodedLines(lines))
    }

    /// Decodes lines back into text, joining them with CRLF.
    fn decode<S: AsRef<str>>(&self, lines: &[S]) -> String
    where
        Self: Sized,
    {
        join_lines(lines)
    }
}

/// Joins lines with CRLF as separator.
fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let capacity = lines.iter().map(|l| l.as_ref().len() + CRLF.len()).sum();
    let mut text = String::with_capacity(capacity);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            text.push_str(CRLF);
        }
        text.push_str(line.as_ref());
    }
    text
}

/// Finds the first non-ASCII character, reporting its position.
///
/// Lines are counted as CRLF-delimited paragraphs, matching `encode`.
fn check_ascii(text: &str) -> Result<()> {
    let mut line = 1;
    let mut after_cr = false;
    for (offset, character) in text.char_indices() {
        if character == '\n' && after_cr {
            line += 1;
        }
        after_cr = character == '\r';
        if !character.is_ascii() {
            return Err(Error::NonAscii {
                character,
                offset,
                line,
            });
        }
    }
    Ok(())
}

/// The `7bit` transfer encoding: US-ASCII only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bit7 {
    policy: LinePolicy,
}

impl Bit7 {
    /// Creates a codec with the given line limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if either limit is zero.
    pub fn new(first_line_max: usize, continuation_line_max: usize) -> Result<Self> {
        Ok(Self::with_policy(LinePolicy::new(
            first_line_max,
            continuation_line_max,
        )?))
    }

    /// Creates a codec from an existing policy.
    #[must_use]
    pub const fn with_policy(policy: LinePolicy) -> Self {
        Self { policy }
    }
}

impl TransferCodec for Bit7 {
    fn policy(&self) -> LinePolicy {
        self.policy
    }

    fn validate(&self, text: &str) -> Result<()> {
        check_ascii(text)
    }
}

/// The `8bit` transfer encoding: any text accepted verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bit8 {
    policy: LinePolicy,
}

impl Bit8 {
    /// Creates a codec with the given line limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if either limit is zero.
    pub fn new(first_line_max: usize, continuation_line_max: usize) -> Result<Self> {
        Ok(Self::with_policy(LinePolicy::new(
            first_line_max,
            continuation_line_max,
        )?))
    }

    /// Creates a codec from an existing policy.
    #[must_use]
    pub const fn with_policy(policy: LinePolicy) -> Self {
        Self { policy }
    }
}

impl TransferCodec for Bit8 {
    fn policy(&self) -> LinePolicy {
        self.policy
    }

    fn validate(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Transfer encoding types handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
}

impl TransferEncoding {
    /// Parses a transfer encoding name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "7bit" | "bit7" => Some(Self::SevenBit),
            "8bit" | "bit8" => Some(Self::EightBit),
            _ => None,
        }
    }

    /// Returns the `Content-Transfer-Encoding` header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A codec selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// `7bit` codec.
    Bit7(Bit7),
    /// `8bit` codec.
    Bit8(Bit8),
}

impl Codec {
    /// Creates the codec for `encoding` with the given policy.
    #[must_use]
    pub const fn new(encoding: TransferEncoding, policy: LinePolicy) -> Self {
        match encoding {
            TransferEncoding::SevenBit => Self::Bit7(Bit7::with_policy(policy)),
            TransferEncoding::EightBit => Self::Bit8(Bit8::with_policy(policy)),
        }
    }

    /// Returns the transfer encoding of this codec.
    #[must_use]
    pub const fn encoding(&self) -> TransferEncoding {
        match self {
            Self::Bit7(_) => TransferEncoding::SevenBit,
            Self::Bit8(_) => TransferEncoding::EightBit,
        }
    }
}

impl TransferCodec for Codec {
    fn policy(&self) -> LinePolicy {
        match self {
            Self::Bit7(codec) => codec.policy(),
            Self::Bit8(codec) => codec.policy(),
        }
    }

    fn validate(&self, text: &str) -> Result<()> {
        match self {
            Self::Bit7(codec) => codec.validate(text),
            Self::Bit8(codec) => codec.validate(text),
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

    fn bit7() -> Bit7 {
        Bit7::new(78, 78).unwrap()
    }

    fn bit8() -> Bit8 {
        Bit8::new(78, 78).unwrap()
    }

    #[test]
    fn test_encode_basic_ascii() {
        let text = "This is a simple test string with only ASCII characters.";
        let encoded = bit7().encode(text).unwrap();
        assert_eq!(encoded.as_slice(), [text]);
        assert_eq!(bit7().decode(encoded.as_slice()), text);
    }

    #[test]
    fn test_encode_splits_on_crlf() {
        let text = "First line.\r\nSecond line.\r\nThird line.";
        let encoded = bit7().encode(text).unwrap();
        assert_eq!(
            encoded.as_slice(),
            ["First line.", "Second line.", "Third line."]
        );
        assert_eq!(bit7().decode(encoded.as_slice()), text);
    }

    #[test]
    fn test_bare_lf_is_not_a_paragraph_break() {
        let encoded = bit7().encode("one\ntwo").unwrap();
        assert_eq!(encoded.as_slice(), ["one\ntwo"]);
    }

    #[test]
    fn test_trailing_crlf_terminates_last_line() {
        let encoded = bit7().encode("First line.\r\n").unwrap();
        assert_eq!(encoded.as_slice(), ["First line."]);
        assert_eq!(bit7().decode(encoded.as_slice()), "First line.");
    }

    #[test]
    fn test_double_trailing_crlf_keeps_blank_line() {
        let encoded = bit7().encode("a\r\n\r\n").unwrap();
        assert_eq!(encoded.as_slice(), ["a", ""]);
    }

    #[test]
    fn test_lone_crlf_is_one_empty_line() {
        let encoded = bit7().encode("\r\n").unwrap();
        assert_eq!(encoded.as_slice(), [""]);
    }

    #[test]
    fn test_empty_text() {
        let encoded = bit7().encode("").unwrap();
        assert!(encoded.is_empty());
        assert_eq!(bit7().decode(encoded.as_slice()), "");
    }

    #[test]
    fn test_interior_blank_lines_preserved() {
        let text = "Hello,\r\n\r\nBody.";
        let encoded = bit7().encode(text).unwrap();
        assert_eq!(encoded.as_slice(), ["Hello,", "", "Body."]);
        assert_eq!(bit7().decode(encoded.as_slice()), text);
    }

    #[test]
    fn test_bit7_rejects_euro_sign() {
        let err = bit7().encode("Price: €10").unwrap_err();
        assert_eq!(
            err,
            Error::NonAscii {
                character: '€',
                offset: 7,
                line: 1,
            }
        );
        assert_eq!(err.kind(), "EncodingError");
    }

    #[test]
    fn test_bit7_rejects_korean_and_reports_line() {
        let err = bit7()
            .encode("ASCII first.\r\nThis contains 한글 which is not 7bit.")
            .unwrap_err();
        match err {
            Error::NonAscii {
                character, line, ..
            } => {
                assert_eq!(character, '한');
                assert_eq!(line, 2);
            }
            Error::InvalidConfiguration(_) => panic!("Expected NonAscii"),
        }
    }

    #[test]
    fn test_bit7_line_counts_paragraphs_not_bare_lf() {
        let err = bit7().encode("x\ny\r\n€").unwrap_err();
        assert_eq!(
            err,
            Error::NonAscii {
                character: '€',
                offset: 5,
                line: 2,
            }
        );

        let err = bit7().encode("a\r\rb\r\n\r\né").unwrap_err();
        assert!(matches!(err, Error::NonAscii { line: 3, .. }));
    }

    #[test]
    fn test_bit7_accepts_control_characters() {
        let text = "tab\there\u{0}nul\u{7f}";
        assert_eq!(bit7().encode(text).unwrap().as_slice(), [text]);
    }

    #[test]
    fn test_bit8_accepts_non_ascii() {
        let text = "Price: €10\r\n안녕하세요";
        let encoded = bit8().encode(text).unwrap();
        assert_eq!(encoded.as_slice(), ["Price: €10", "안녕하세요"]);
        assert_eq!(bit8().decode(encoded.as_slice()), text);
    }

    #[test]
    fn test_long_paragraph_is_folded() {
        let codec = Bit7::new(20, 20).unwrap();
        let text = "This is a very long line of text that should be wrapped.";
        let encoded = codec.encode(text).unwrap();
        assert!(encoded.len() > 1);
        for line in &encoded {
            assert!(line.len() <= 20);
            assert!(!line.contains("\r\n"));
        }
        assert_eq!(encoded.as_slice().concat(), text);
    }

    #[test]
    fn test_first_line_policy_applies_per_paragraph() {
        let codec = Bit7::new(4, 2).unwrap();
        let encoded = codec.encode("abcdef\r\nabcdef").unwrap();
        assert_eq!(encoded.as_slice(), ["abcd", "ef", "abcd", "ef"]);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            Bit7::new(0, 78),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Bit8::new(78, 0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_decode_accepts_str_slices() {
        assert_eq!(bit8().decode(&["a", "b", "c"]), "a\r\nb\r\nc");
        assert_eq!(bit8().decode::<&str>(&[]), "");
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), Some(TransferEncoding::SevenBit));
        assert_eq!(TransferEncoding::parse(" 8BIT "), Some(TransferEncoding::EightBit));
        assert_eq!(TransferEncoding::parse("base64"), None);
        assert_eq!(TransferEncoding::EightBit.to_string(), "8bit");
    }

    #[test]
    fn test_codec_dispatch() {
        let codec = Codec::new(TransferEncoding::SevenBit, LinePolicy::RECOMMENDED);
        assert_eq!(codec.encoding(), TransferEncoding::SevenBit);
        assert!(codec.encode("€").is_err());

        let codec = Codec::new(TransferEncoding::EightBit, LinePolicy::RECOMMENDED);
        assert_eq!(codec.encode("€").unwrap().as_slice(), ["€"]);
        assert_eq!(codec.policy(), LinePolicy::RECOMMENDED);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_encoded_lines_serialize_as_array() {
        let lines = EncodedLines::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(serde_json::to_string(&lines).unwrap(), r#"["a","b"]"#);
    }
}
