//! Line folding.
//!
//! A paragraph longer than the applicable limit is split before the last
//! space or tab that keeps the line within the limit. The whitespace
//! character starts the continuation line, so concatenating the folded
//! lines reproduces the paragraph. Without such whitespace the paragraph is
//! hard-broken at the limit. No continuation marker is inserted.

use crate::policy::LinePolicy;

/// Folds one paragraph into `out` according to `policy`.
pub(crate) fn fold_paragraph(paragraph: &str, policy: LinePolicy, out: &mut Vec<String>) {
    let start = out.len();
    let mut rest = paragraph;
    let mut limit = policy.first_line_max();

    while rest.len() > limit {
        let cut = break_point(rest, limit);
        out.push(rest[..cut].to_string());
        rest = &rest[cut..];
        limit = policy.continuation_line_max();
    }

    if !rest.is_empty() || out.len() == start {
        out.push(rest.to_string());
    }
}

/// Returns the byte index at which `text` (longer than `limit`) is split.
///
/// The result is always a char boundary greater than zero.
fn break_point(text: &str, limit: usize) -> usize {
    let bytes = text.as_bytes();

    // Index 0 is excluded so every fold makes progress.
    if let Some(pos) = (1..=limit).rev().find(|&i| matches!(bytes[i], b' ' | b'\t')) {
        return pos;
    }

    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }

    if cut == 0 {
        // A single character wider than the limit; emit it whole.
        text.chars().next().map_or(text.len(), char::len_utf8)
    } else {
        cut
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

    fn fold(text: &str, first: usize, rest: usize) -> Vec<String> {
        let mut out = Vec::new();
        fold_paragraph(text, LinePolicy::new(first, rest).unwrap(), &mut out);
        out
    }

    #[test]
    fn test_short_paragraph_untouched() {
        assert_eq!(fold("Hello, World!", 78, 78), vec!["Hello, World!"]);
    }

    #[test]
    fn test_exact_limit_untouched() {
        assert_eq!(fold("abcde", 5, 5), vec!["abcde"]);
    }

    #[test]
    fn test_empty_paragraph() {
        assert_eq!(fold("", 5, 5), vec![""]);
    }

    #[test]
    fn test_fold_at_whitespace() {
        let lines = fold("the quick brown fox", 10, 10);
        assert_eq!(lines, vec!["the quick", " brown fox"]);
        assert_eq!(lines.concat(), "the quick brown fox");
    }

    #[test]
    fn test_fold_uses_last_whitespace_within_limit() {
        // Spaces sit at indices 4 and 9; index 9 is the last within the limit.
        let lines = fold("aaaa bbbb cccc", 9, 9);
        assert_eq!(lines, vec!["aaaa bbbb", " cccc"]);
    }

    #[test]
    fn test_whitespace_exactly_at_limit() {
        let lines = fold("abcde fgh", 5, 5);
        assert_eq!(lines, vec!["abcde", " fgh"]);
    }

    #[test]
    fn test_hard_break_without_whitespace() {
        let lines = fold("abcdefghij", 4, 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_continuation_limit_applies_after_first_fold() {
        let lines = fold("abcdefghijkl", 6, 3);
        assert_eq!(lines, vec!["abcdef", "ghi", "jkl"]);
    }

    #[test]
    fn test_tab_is_a_fold_point() {
        let lines = fold("abc\tdefgh", 6, 6);
        assert_eq!(lines, vec!["abc", "\tdefgh"]);
    }

    #[test]
    fn test_leading_whitespace_not_used_as_fold_point() {
        // Only whitespace is at index 0, so a hard break is used.
        let lines = fold(" abcdefg", 4, 4);
        assert_eq!(lines, vec![" abc", "defg"]);
    }

    #[test]
    fn test_hard_break_respects_char_boundaries() {
        // "é" is two octets; a limit of 3 cannot split it.
        let lines = fold("aééa", 3, 3);
        assert_eq!(lines, vec!["aé", "éa"]);
        for line in &lines {
            assert!(line.len() <= 3);
        }
    }

    #[test]
    fn test_wide_character_over_tiny_limit() {
        let lines = fold("€€", 1, 1);
        assert_eq!(lines, vec!["€", "€"]);
    }

    #[test]
    fn test_all_lines_within_limits() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do \
                    eiusmod tempor incididunt ut labore et dolore magna aliqua.";
        let lines = fold(text, 20, 30);
        assert!(lines[0].len() <= 20);
        for line in &lines[1..] {
            assert!(line.len() <= 30);
        }
        assert_eq!(lines.concat(), text);
    }
}
