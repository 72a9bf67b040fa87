//! RFC 5322 header section parsing.
//!
//! Only what envelope derivation needs: unfolded field values looked up by
//! case-insensitive name. Values are kept verbatim; no encoded-word or
//! structured-field decoding happens here.

/// One header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name as written.
    pub name: String,
    /// Unfolded value with surrounding whitespace removed.
    pub value: String,
}

/// Header fields of a message, in the order they appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    /// Parses the header section at the start of a message.
    ///
    /// The section ends at the first empty line (or the end of input). A line
    /// starting with space or tab continues the previous field; unfolding
    /// only removes the line break. Lines that are neither a field nor a
    /// continuation are skipped. CRLF and bare LF are both accepted.
    #[must_use]
    pub fn parse(message: &str) -> Self {
        let mut fields: Vec<Field> = Vec::new();
        let mut in_field = false;

        for line in message.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                if let (true, Some(field)) = (in_field, fields.last_mut()) {
                    field.value.push_str(line.trim_end());
                }
                continue;
            }

            in_field = false;
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim_end();
                if !name.is_empty() && !name.contains([' ', '\t']) {
                    fields.push(Field {
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                    in_field = true;
                }
            }
        }

        for field in &mut fields {
            let trimmed = field.value.trim();
            if trimmed.len() != field.value.len() {
                field.value = trimmed.to_string();
            }
        }

        Self { fields }
    }

    /// Returns the first value of the named field.
    #[must_use]
    pub fn get<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.all(name).next()
    }

    /// Returns every value of the named field, in message order.
    pub fn all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.fields
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// Returns the number of fields.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the message has no header fields.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the fields in message order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
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
    fn test_lookup_is_case_insensitive() {
        let headers = Headers::parse("Reply-To: a@example.org\r\n\r\n");
        assert_eq!(headers.get("reply-to"), Some("a@example.org"));
        assert_eq!(headers.get("REPLY-TO"), Some("a@example.org"));
        assert_eq!(headers.get("To"), None);
    }

    #[test]
    fn test_lookup_name_need_not_outlive_result() {
        let headers = Headers::parse("From: a@example.org\r\n\r\n");
        let value = {
            let name = String::from("from");
            headers.get(&name)
        };
        assert_eq!(value, Some("a@example.org"));

        let values: Vec<&str> = {
            let name = "FROM".to_lowercase();
            headers.all(&name).collect()
        };
        assert_eq!(values, ["a@example.org"]);
    }

    #[test]
    fn test_repeated_fields_keep_order() {
        let headers = Headers::parse("Cc: one@example.org\r\nSubject: s\r\ncc: two@example.org\r\n\r\n");
        assert_eq!(
            headers.all("CC").collect::<Vec<_>>(),
            vec!["one@example.org", "two@example.org"]
        );
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.fields()[2].name, "cc");
    }

    #[test]
    fn test_unfolding_keeps_whitespace() {
        let text = concat!(
            "To: Ann <ann@example.org>,\r\n",
            "\tBen <ben@example.org>\r\n",
            "Subject:  spaced  \r\n",
            "\r\n",
            "To: body@example.org\r\n"
        );

        let headers = Headers::parse(text);
        assert_eq!(
            headers.get("To"),
            Some("Ann <ann@example.org>,\tBen <ben@example.org>")
        );
        assert_eq!(headers.get("Subject"), Some("spaced"));
        assert_eq!(headers.all("to").count(), 1);
    }

    #[test]
    fn test_bare_lf_and_missing_body() {
        let headers = Headers::parse("From: <a@example.org>\nBcc: <b@example.org>");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("bcc"), Some("<b@example.org>"));
    }

    #[test]
    fn test_junk_lines_skipped() {
        let text = "garbage line\r\n continuation of nothing\r\nBad Name: x\r\nFrom: a@example.org\r\n\r\n";
        let headers = Headers::parse(text);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("from"), Some("a@example.org"));
    }

    #[test]
    fn test_empty_input() {
        assert!(Headers::parse("").is_empty());
        assert!(Headers::parse("\r\nFrom: body@example.org").is_empty());
    }
}
