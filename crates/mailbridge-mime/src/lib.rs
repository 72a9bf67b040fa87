//! # mailbridge-mime
//!
//! Line-oriented MIME content-transfer-encodings for email bodies.
//!
//! ## Features
//!
//! - **7bit**: US-ASCII only, rejects any other character with its position
//! - **8bit**: any text accepted verbatim
//! - **Line folding**: configurable first-line and continuation-line limits
//! - **Headers**: RFC 5322 header section parsing
//!
//! ## Quick Start
//!
//! ```
//! use mailbridge_mime::{Bit7, TransferCodec};
//!
//! let codec = Bit7::new(78, 78)?;
//! let lines = codec.encode("First line.\r\nSecond line.")?;
//! assert_eq!(lines.as_slice(), ["First line.", "Second line."]);
//! assert_eq!(codec.decode(lines.as_slice()), "First line.\r\nSecond line.");
//! # Ok::<(), mailbridge_mime::Error>(())
//! ```
//!
//! ## Folding
//!
//! Paragraphs longer than the policy allows are split before the last space
//! or tab within the limit, or hard-broken at the limit when there is none.
//! Decoding joins lines with CRLF, so a folded paragraph decodes with CRLF
//! at each fold point.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod fold;
mod header;
mod policy;

pub mod encoding;

pub use encoding::{Bit7, Bit8, Codec, EncodedLines, TransferCodec, TransferEncoding};
pub use error::{Error, Result};
pub use header::{Field, Headers};
pub use policy::LinePolicy;
