//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// One line of a server reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyLine<'a> {
    /// Reply code.
    pub code: u16,
    /// True if this line ends the reply (`"250 "` rather than `"250-"`).
    pub last: bool,
    /// Text after the separator.
    pub text: &'a str,
}

/// Parses a single reply line (without CRLF).
///
/// A bare three-digit code is accepted as a final line with empty text.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line does not start with a three-digit
/// code followed by a space, hyphen or end of line.
pub fn parse_reply_line(line: &str) -> Result<ReplyLine<'_>> {
    let malformed = || Error::Protocol(format!("Malformed reply line: {line:?}"));

    let code_str = line.get(..3).ok_or_else(malformed)?;
    if !code_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let code = code_str.parse::<u16>().map_err(|_| malformed())?;

    match line.as_bytes().get(3) {
        None => Ok(ReplyLine {
            code,
            last: true,
            text: "",
        }),
        Some(b' ') => Ok(ReplyLine {
            code,
            last: true,
            text: &line[4..],
        }),
        Some(b'-') => Ok(ReplyLine {
            code,
            last: false,
            text: &line[4..],
        }),
        Some(_) => Err(malformed()),
    }
}

/// Assembles a complete reply from its lines.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if there are no lines, a line is malformed,
/// the codes differ between lines, or only the final line is marked last.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };
    let code = parse_reply_line(first)?.code;

    let mut message = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let parsed = parse_reply_line(line)?;
        if parsed.code != code {
            return Err(Error::Protocol(format!(
                "Reply code changed from {code} to {} mid-reply",
                parsed.code
            )));
        }
        if parsed.last != (i + 1 == lines.len()) {
            return Err(Error::Protocol(format!(
                "Unexpected continuation marker in {line:?}"
            )));
        }
        message.push(parsed.text.to_string());
    }

    Ok(Reply::new(ReplyCode::new(code), message))
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

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_single_line_reply() {
        let reply = parse_reply(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, vec!["OK"]);
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let reply = parse_reply(&lines(&[
            "250-mx.example.com",
            "250-SIZE 1000",
            "250 AUTH PLAIN",
        ]))
        .unwrap();
        assert_eq!(reply.message, vec!["mx.example.com", "SIZE 1000", "AUTH PLAIN"]);
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = parse_reply(&lines(&["354"])).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_parse_reply_line() {
        let line = parse_reply_line("334 VXNlcm5hbWU6").unwrap();
        assert_eq!(line.code, 334);
        assert!(line.last);
        assert_eq!(line.text, "VXNlcm5hbWU6");
        assert!(!parse_reply_line("250-PIPELINING").unwrap().last);
    }

    #[test]
    fn test_malformed_replies() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&lines(&["25"])).is_err());
        assert!(parse_reply(&lines(&["ABC OK"])).is_err());
        assert!(parse_reply(&lines(&["250xOK"])).is_err());
        assert!(parse_reply(&lines(&["250-one", "251 two"])).is_err());
        assert!(parse_reply(&lines(&["250 one", "250 two"])).is_err());
        assert!(parse_reply(&lines(&["€€€ OK"])).is_err());
    }
}
