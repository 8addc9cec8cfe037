use std::borrow::Cow;

fn is_stripped(c: char) -> bool {
    c == '\u{7f}' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
}

/// Strips terminal control content from text pulled out of remote documents.
///
/// Removed:
/// - ANSI CSI sequences: `ESC [` up to a final byte in `@`..`~`
/// - ANSI OSC sequences: `ESC ]` up to BEL or ST (`ESC \`)
/// - bare ESC and every other ASCII control character, plus DEL
///
/// Tab, newline and carriage return are kept. Returns `Cow::Borrowed` when nothing
/// needs removing, which is the common case for well-formed feeds.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            c if is_stripped(c) => {}
            c => out.push(c),
        }
    }

    Cow::Owned(out)
}

/// Collapses every run of whitespace into a single space and trims both ends.
///
/// Node text extracted from HTML carries the source indentation; titles and
/// authors are compared and displayed as single-line strings.
pub fn collapse_whitespace(s: &str) -> String {
    let stripped = strip_control_chars(s);
    let mut out = String::with_capacity(stripped.len());
    for word in stripped.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "Plain title with tabs\tand\nnewlines";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_removes_controls_and_del() {
        let result = strip_control_chars("Ev\x00il\x07 Fe\x1bed\x7f");
        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(result, "Evil Feed");
    }

    #[test]
    fn test_strip_csi_sequences() {
        assert_eq!(strip_control_chars("\x1b[31mRed text\x1b[0m"), "Red text");
        assert_eq!(strip_control_chars("before\x1b[2Aafter"), "beforeafter");
        assert_eq!(strip_control_chars("Evil\x1b[31m Feed"), "Evil Feed");
    }

    #[test]
    fn test_strip_osc_sequences() {
        assert_eq!(strip_control_chars("\x1b]0;owned title\x07safe text"), "safe text");
        assert_eq!(strip_control_chars("\x1b]0;owned title\x1b\\safe text"), "safe text");
    }

    #[test]
    fn test_strip_bare_escape_and_unterminated_csi() {
        assert_eq!(strip_control_chars("before\x1bafter"), "beforeafter");
        assert_eq!(strip_control_chars("tail\x1b[12"), "tail");
    }

    #[test]
    fn test_strip_keeps_cjk_around_sequences() {
        assert_eq!(strip_control_chars("友情 \x1b[1m链接\x1b[0m"), "友情 链接");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("\n    First\t\tPost \n"), "First Post");
        assert_eq!(collapse_whitespace("   "), "");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_collapse_whitespace_keeps_cjk() {
        assert_eq!(collapse_whitespace(" 友情 链接 "), "友情 链接");
    }
}
