use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;

/// Remove ANSI escape sequences (colors, cursor movement) from text.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = REGEX.get_or_init(|| {
        // CSI, then OSC, then any other escape with optional intermediates, then a lone ESC
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[ -/]*[0-~]|\x1b")
            .unwrap()
    });
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }
    regex.replace_all(text, "")
}

fn longest_backtick_run(content: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in content.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// A backtick fence longer than any run of backticks inside `content`.
pub fn code_fence(content: &str) -> String {
    "`".repeat((longest_backtick_run(content) + 1).max(3))
}

/// An inline code span for `text`, ANSI-stripped and delimited so backticks
/// inside it cannot close the span.
pub fn inline_code(text: &str) -> String {
    let text = strip_ansi(text);
    let text = text.trim();
    let ticks = "`".repeat(longest_backtick_run(text) + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{ticks} {text} {ticks}")
    } else {
        format!("{ticks}{text}{ticks}")
    }
}

/// Escape text for use inside a single markdown table cell.
pub fn table_cell(text: &str) -> String {
    text.trim().replace('|', "\\|").replace("\r\n", "<br>").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let cases = [
            ("plain", "plain"),
            ("\x1b[31merror\x1b[0m: failed", "error: failed"),
            ("\x1b[1;38;5;208mbold\x1b[39m", "bold"),
            ("line\x1b[2K\x1b[1Gnext", "linenext"),
            ("\x1b]8;;https://moonrepo.dev\x07link\x1b]8;;\x07", "link"),
            // tput sgr0
            ("\x1b(Bplain\x1b[m", "plain"),
            ("\x1b7save\x1b8", "save"),
            ("\x1b=keypad\x1b>", "keypad"),
            ("\x1b#8\x1bcreset", "reset"),
            ("trailing\x1b", "trailing"),
        ];
        for (input, expected) in cases {
            let stripped = strip_ansi(input);
            assert_eq!(stripped, expected);
            assert!(!stripped.contains('\x1b'), "{input:?}");
        }
    }

    #[test]
    fn test_strip_ansi_keeps_plain_text() {
        for input in ["plain", "a [bracket] and (parens)", "tab\tand\nnewline"] {
            assert!(matches!(strip_ansi(input), Cow::Borrowed(text) if text == input));
        }
    }

    #[test]
    fn test_code_fence() {
        assert_eq!(code_fence("no ticks"), "```");
        assert_eq!(code_fence("```rust\nfn main() {}\n```"), "````");
        assert_eq!(code_fence("`````"), "``````");
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(inline_code("app:build"), "`app:build`");
        assert_eq!(inline_code("\x1b[1mapp\x1b[0m:build "), "`app:build`");
        assert_eq!(inline_code("we`ird:build"), "``we`ird:build``");
        assert_eq!(inline_code("`edge`"), "`` `edge` ``");
    }

    #[test]
    fn test_table_cell() {
        assert_eq!(table_cell(" a | b\nc\r\nd "), "a \\| b<br>c<br>d");
    }
}
