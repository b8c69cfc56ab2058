//! Size limits applied to rendered comments.
//!
//! Two strategies exist and the rendering mode picks one:
//! [`truncate_end`] keeps the head of a multi-section document, while
//! [`tail_chars`] keeps the end of a single log stream where the final error
//! usually lives.

/// Maximum length of a GitHub comment body, in characters.
pub const MAX_COMMENT_LENGTH: usize = 65536;

/// Appended to any text that was cut to fit.
pub const TRUNCATION_NOTICE: &str =
    "\n\n> [!WARNING]\n> Output truncated to fit the maximum comment size.\n";

/// Prefixed to a stream whose head was dropped.
pub const ELLIPSIS: &str = "...\n";

pub fn char_len(text: &str) -> usize { text.chars().count() }

/// The last `count` characters of `text`.
pub fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// The first `count` characters of `text`.
pub fn head_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Keep the head of `text` so that the result, including the notice, fits in `max`.
pub fn truncate_end(text: String, max: usize) -> String {
    if char_len(&text) <= max {
        return text;
    }
    let keep = max.saturating_sub(char_len(TRUNCATION_NOTICE));
    let mut out = head_chars(&text, keep).to_string();
    out.push_str(TRUNCATION_NOTICE);
    out
}

/// Number of lines a stream shows once surrounding whitespace is trimmed.
pub fn trimmed_line_count(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() { 0 } else { trimmed.lines().count() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 0), "");
        assert_eq!(tail_chars("abcdef", 2), "ef");
        assert_eq!(tail_chars("abcdef", 10), "abcdef");
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
    }

    #[test]
    fn test_head_chars() {
        assert_eq!(head_chars("abcdef", 3), "abc");
        assert_eq!(head_chars("ééé", 2), "éé");
        assert_eq!(head_chars("ab", 5), "ab");
    }

    #[test]
    fn test_truncate_end() {
        let short = "short".to_string();
        assert_eq!(truncate_end(short.clone(), 100), short);

        let text = "x".repeat(500);
        let out = truncate_end(text, 200);
        assert_eq!(char_len(&out), 200);
        assert!(out.ends_with(TRUNCATION_NOTICE));
        assert!(out.starts_with("xxxx"));
    }

    #[test]
    fn test_trimmed_line_count() {
        assert_eq!(trimmed_line_count(""), 0);
        assert_eq!(trimmed_line_count("\n\n  \n"), 0);
        assert_eq!(trimmed_line_count("one\n"), 1);
        assert_eq!(trimmed_line_count("\none\ntwo\n\n"), 2);
    }
}
