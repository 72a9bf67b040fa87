//! SMTP envelope and its derivation from message headers.

use super::{Address, Mailbox};
use crate::error::{Error, Result};
use mailbridge_mime::Headers;

/// Reverse path and forward paths of one mail transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    from: Address,
    recipients: Vec<Address>,
}

impl Envelope {
    /// Creates an envelope. Duplicate recipients are dropped, keeping the
    /// first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if there are no recipients.
    pub fn new(from: Address, recipients: impl IntoIterator<Item = Address>) -> Result<Self> {
        let mut unique: Vec<Address> = Vec::new();
        for rcpt in recipients {
            if !unique
                .iter()
                .any(|seen| seen.as_str().eq_ignore_ascii_case(rcpt.as_str()))
            {
                unique.push(rcpt);
            }
        }

        if unique.is_empty() {
            return Err(Error::InvalidAddress("envelope has no recipients".into()));
        }

        Ok(Self {
            from,
            recipients: unique,
        })
    }

    /// Derives the envelope from the header section of a raw message.
    ///
    /// The reverse path is the first mailbox of `Sender`, or of `From` when
    /// there is no `Sender`. Recipients are collected from `To`, `Cc` and
    /// `Bcc` in that order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the sender or every recipient is
    /// missing, or if an address list cannot be parsed.
    pub fn from_message(raw: &str) -> Result<Self> {
        let headers = Headers::parse(raw);

        let sender_field = headers
            .get("Sender")
            .or_else(|| headers.get("From"))
            .ok_or_else(|| Error::InvalidAddress("message has no Sender or From header".into()))?;
        let from = parse_address_list(sender_field)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidAddress("sender header lists no mailbox".into()))?
            .address;

        let mut recipients = Vec::new();
        for name in ["To", "Cc", "Bcc"] {
            for value in headers.all(name) {
                recipients.extend(parse_address_list(value)?.into_iter().map(|m| m.address));
            }
        }

        Self::new(from, recipients)
    }

    /// Returns the reverse path.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.from
    }

    /// Returns the forward paths, in order.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }
}

/// Parses an RFC 5322 address list into its mailboxes.
///
/// Display names, quoted strings, comments and groups are understood; group
/// names are dropped and their members flattened into the result. An empty
/// list yields no mailboxes.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] for unbalanced quotes, comments or angle
/// brackets, or for an address that is not a usable SMTP path.
pub fn parse_address_list(value: &str) -> Result<Vec<Mailbox>> {
    let mut mailboxes = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    let mut in_quote = false;
    let mut in_angle = false;
    let mut comment_depth = 0usize;

    while let Some(c) = chars.next() {
        if comment_depth > 0 {
            match c {
                '\\' => {
                    chars.next();
                }
                '(' => comment_depth += 1,
                ')' => comment_depth -= 1,
                _ => {}
            }
            continue;
        }

        if in_quote {
            current.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                }
                '"' => in_quote = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_quote = true;
                current.push(c);
            }
            // Comments separate tokens like whitespace
            '(' => {
                comment_depth = 1;
                current.push(' ');
            }
            '<' if !in_angle => {
                in_angle = true;
                current.push(c);
            }
            '>' if in_angle => {
                in_angle = false;
                current.push(c);
            }
            // Group display name ends here; members follow
            ':' if !in_angle => current.clear(),
            ',' | ';' if !in_angle => {
                if let Some(mailbox) = parse_mailbox(&current)? {
                    mailboxes.push(mailbox);
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if in_quote || in_angle || comment_depth > 0 {
        return Err(Error::InvalidAddress(format!(
            "unterminated quote, comment or angle bracket in {value:?}"
        )));
    }

    if let Some(mailbox) = parse_mailbox(&current)? {
        mailboxes.push(mailbox);
    }

    Ok(mailboxes)
}

/// Parses one `name <addr>` or bare `addr` item with comments removed.
fn parse_mailbox(item: &str) -> Result<Option<Mailbox>> {
    let item = item.trim();
    if item.is_empty() {
        return Ok(None);
    }

    let Some(open) = item.find('<') else {
        return Ok(Some(Mailbox::new(item)?));
    };

    let close = item[open..]
        .find('>')
        .map(|i| open + i)
        .ok_or_else(|| Error::InvalidAddress(format!("missing '>' in {item:?}")))?;

    // Obsolete source route "<@relay1,@relay2:user@domain>"
    let spec = &item[open + 1..close];
    let spec = spec.rsplit_once(':').map_or(spec, |(_, addr)| addr).trim();

    let name = unquote(&item[..open]);
    let address = Address::new(spec)?;

    Ok(Some(Mailbox {
        name: (!name.is_empty()).then_some(name),
        address,
    }))
}

/// Turns a phrase into display text: quotes removed, escapes resolved and
/// runs of whitespace collapsed.
fn unquote(phrase: &str) -> String {
    let mut out = String::with_capacity(phrase.len());
    let mut chars = phrase.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {}
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
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

    fn addresses(value: &str) -> Vec<String> {
        parse_address_list(value)
            .unwrap()
            .into_iter()
            .map(|m| m.address.to_string())
            .collect()
    }

    #[test]
    fn test_bare_and_angle_addresses() {
        assert_eq!(
            addresses("a@example.com, <b@example.com>"),
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_display_names() {
        let mailboxes =
            parse_address_list("\"Doe, John\" <john@example.com>, Jane  Roe <jane@example.com>")
                .unwrap();
        assert_eq!(mailboxes.len(), 2);
        assert_eq!(mailboxes[0].name.as_deref(), Some("Doe, John"));
        assert_eq!(mailboxes[0].address.as_str(), "john@example.com");
        assert_eq!(mailboxes[1].name.as_deref(), Some("Jane Roe"));
    }

    #[test]
    fn test_comments_are_ignored() {
        assert_eq!(
            addresses("john@example.com (John (the boss) Doe), jane@example.com"),
            vec!["john@example.com", "jane@example.com"]
        );
    }

    #[test]
    fn test_groups_are_flattened() {
        assert_eq!(
            addresses("Team: a@example.com, B <b@example.com>;, c@example.com"),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
        assert!(addresses("undisclosed-recipients:;").is_empty());
    }

    #[test]
    fn test_source_route_dropped() {
        assert_eq!(
            addresses("<@relay.example.net:user@example.com>"),
            vec!["user@example.com"]
        );
    }

    #[test]
    fn test_unbalanced_input() {
        assert!(parse_address_list("\"open <a@example.com>").is_err());
        assert!(parse_address_list("Name <a@example.com").is_err());
        assert!(parse_address_list("a@example.com (comment").is_err());
    }

    #[test]
    fn test_envelope_from_message() {
        let raw = concat!(
            "From: Alice <alice@example.com>\r\n",
            "To: Bob <bob@example.com>, carol@example.com\r\n",
            "Cc: BOB@example.com\r\n",
            "Bcc: dave@example.com\r\n",
            "Subject: hi\r\n",
            "\r\n",
            "To: not-a-header@example.com\r\n"
        );
        let envelope = Envelope::from_message(raw).unwrap();
        assert_eq!(envelope.sender().as_str(), "alice@example.com");
        let rcpts: Vec<_> = envelope.recipients().iter().map(Address::as_str).collect();
        assert_eq!(
            rcpts,
            vec!["bob@example.com", "carol@example.com", "dave@example.com"]
        );
    }

    #[test]
    fn test_sender_takes_precedence_over_from() {
        let raw = "From: a@example.com, b@example.com\nSender: s@example.com\nTo: r@example.com\n\n";
        let envelope = Envelope::from_message(raw).unwrap();
        assert_eq!(envelope.sender().as_str(), "s@example.com");
    }

    #[test]
    fn test_missing_sender_or_recipients() {
        let err = Envelope::from_message("To: r@example.com\r\n\r\nbody").unwrap_err();
        assert_eq!(err.kind(), "InvalidAddress");

        let err = Envelope::from_message("From: a@example.com\r\n\r\nbody").unwrap_err();
        assert_eq!(err.kind(), "InvalidAddress");
    }

    #[test]
    fn test_envelope_new_requires_recipient() {
        let from = Address::new("a@example.com").unwrap();
        assert!(Envelope::new(from, []).is_err());
    }
}
