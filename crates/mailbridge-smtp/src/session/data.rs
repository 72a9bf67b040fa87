//! DATA payload preparation.

/// Builds the bytes sent after a 354 reply.
///
/// Line endings are normalized to CRLF, lines starting with `.` get an extra
/// `.` (RFC 5321 §4.5.2), the content is terminated with CRLF if it was not
/// already, and the closing `.` line is appended.
pub(crate) fn prepare(raw: &str) -> String {
    let body = raw
        .strip_suffix("\r\n")
        .or_else(|| raw.strip_suffix('\n'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(raw.len() + raw.len() / 64 + 8);
    for line in body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(".\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_message_kept() {
        assert_eq!(
            prepare("Subject: x\r\n\r\nHello\r\n"),
            "Subject: x\r\n\r\nHello\r\n.\r\n"
        );
    }

    #[test]
    fn test_bare_lf_normalized() {
        assert_eq!(
            prepare("Subject: x\n\nHello\nWorld"),
            "Subject: x\r\n\r\nHello\r\nWorld\r\n.\r\n"
        );
    }

    #[test]
    fn test_dot_stuffing() {
        assert_eq!(
            prepare("a\r\n.\r\n..b\r\n.c"),
            "a\r\n..\r\n...b\r\n..c\r\n.\r\n"
        );
    }

    #[test]
    fn test_only_one_trailing_line_ending_absorbed() {
        assert_eq!(prepare("a\r\n\r\n"), "a\r\n\r\n.\r\n");
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(prepare(""), "\r\n.\r\n");
    }
}
