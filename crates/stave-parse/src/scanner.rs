//! Physical-line scanning.
//!
//! One physical line at a time: strip leading whitespace, drop blanks and
//! whole-line comments, cut in-line comments with quote awareness, trim the
//! tail, and detect `\` continuation. Joining continued lines into a logical
//! line is the parser's job; the scanner only reports what it saw.

/// Outcome of scanning one physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan<'a> {
    /// Empty line or whole-line comment.
    Blank,
    /// Line content after comment stripping and trailing trim.
    Content {
        /// The surviving text. For a continued line the trailing `\` has been
        /// removed but the spacing before it is kept.
        text: &'a str,
        /// The line ended with `\` and joins the next physical line.
        continued: bool,
        /// A `#` started a comment without whitespace in front of it.
        ambiguous_hash: bool,
    },
    /// A `'` or `"` span ran to end of line without its closing quote.
    UnterminatedQuote,
}

pub(crate) fn is_white(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Scan one physical line (without its trailing newline).
pub(crate) fn scan(raw: &str) -> Scan<'_> {
    let line = raw.trim_start_matches([' ', '\t']);
    if line.is_empty() || line.starts_with('#') {
        return Scan::Blank;
    }

    // Find an in-line comment. Quoted spans hide `#`; inside them `\X`
    // escapes any X. Outside quotes a backslash is literal.
    let bytes = line.as_bytes();
    let mut ambiguous_hash = false;
    let mut end = bytes.len();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                loop {
                    if i >= bytes.len() {
                        return Scan::UnterminatedQuote;
                    }
                    if bytes[i] == quote {
                        break;
                    }
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'#' => {
                // The blank check above guarantees i > 0 here.
                if !is_white(bytes[i - 1]) {
                    ambiguous_hash = true;
                }
                end = i;
                break;
            }
            _ => i += 1,
        }
    }

    let text = line[..end].trim_end_matches([' ', '\t']);
    if let Some(stripped) = text.strip_suffix('\\') {
        return Scan::Content {
            text: stripped,
            continued: true,
            ambiguous_hash,
        };
    }
    Scan::Content {
        text,
        continued: false,
        ambiguous_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(raw: &str) -> (&str, bool, bool) {
        match scan(raw) {
            Scan::Content {
                text,
                continued,
                ambiguous_hash,
            } => (text, continued, ambiguous_hash),
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(scan(""), Scan::Blank);
        assert_eq!(scan("   \t "), Scan::Blank);
        assert_eq!(scan("# comment"), Scan::Blank);
        assert_eq!(scan("  \t# indented comment"), Scan::Blank);
    }

    #[test]
    fn test_plain_content() {
        assert_eq!(content("foo = bar"), ("foo = bar", false, false));
        assert_eq!(content("  foo = bar  "), ("foo = bar", false, false));
    }

    #[test]
    fn test_inline_comment() {
        assert_eq!(content("foo = bar # note"), ("foo = bar", false, false));
        assert_eq!(content("foo = bar\t# note"), ("foo = bar", false, false));
    }

    #[test]
    fn test_ambiguous_hash() {
        assert_eq!(content("foo = bar#note"), ("foo = bar", false, true));
    }

    #[test]
    fn test_hash_inside_quotes() {
        assert_eq!(
            content(r#"x = "a#b" # real"#),
            (r#"x = "a#b""#, false, false)
        );
        assert_eq!(content("x = 'a#b'"), ("x = 'a#b'", false, false));
    }

    #[test]
    fn test_escaped_quote_inside_quotes() {
        assert_eq!(
            content(r#"x = "he said \"hi#there\"""#),
            (r#"x = "he said \"hi#there\"""#, false, false)
        );
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(scan("x = 'oops"), Scan::UnterminatedQuote);
        assert_eq!(scan(r#"x = "a\""#), Scan::UnterminatedQuote);
    }

    #[test]
    fn test_continuation_keeps_spacing() {
        // The spacing before the dropped backslash survives; the parser adds
        // the single join space.
        assert_eq!(content("a = 1 \\"), ("a = 1 ", true, false));
        assert_eq!(content("a = 1 \\   "), ("a = 1 ", true, false));
        assert_eq!(content("\\"), ("", true, false));
    }

    #[test]
    fn test_backslash_outside_quotes_is_literal() {
        // `\#` does not escape the comment marker outside quotes; the
        // leftover `\` then reads as a continuation.
        assert_eq!(content(r"a = b\#c"), ("a = b", true, true));
    }
}
