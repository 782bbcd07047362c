//! Logical-line classification.
//!
//! After scanning and continuation joining, every logical line becomes one or
//! more [`LineEvent`]s. Most lines produce exactly one event; a section
//! opened inline (`svc { key = value }`) produces the open followed by the
//! events of the rest of the line.

use std::borrow::Cow;

use crate::env::{self, EnvLookup};

/// Classification of a logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent<'a> {
    /// Blank or comment-only line, nothing to dispatch.
    Skip,
    /// The line continues on the next physical line.
    Continue,
    /// `key = value`.
    Assignment {
        /// Key text, free of whitespace and `=`.
        key: &'a str,
        /// Value after quote stripping or environment expansion.
        value: Cow<'a, str>,
        /// The value was wrapped in matching quotes.
        quoted: bool,
    },
    /// `kind [name] {`.
    SectionOpen {
        /// Section type.
        kind: &'a str,
        /// Section name, empty when not given.
        name: &'a str,
    },
    /// `}`.
    SectionClose,
    /// `!include` or `!include_try` directive.
    Include {
        /// Glob pattern, still relative to the including file.
        pattern: &'a str,
        /// `!include_try`: missing files and empty matches are fine.
        tolerant: bool,
    },
    /// Malformed line; the message aborts the parse.
    Error(String),
}

/// Classify the next statement of a logical line.
///
/// Returns the event and the unconsumed remainder, which is non-empty only
/// when a section brace left trailing text on the line.
pub(crate) fn classify_step<'a>(
    input: &'a str,
    lookup: &EnvLookup,
) -> (LineEvent<'a>, &'a str) {
    let line = input.trim_start_matches([' ', '\t']);
    if line.is_empty() {
        return (LineEvent::Skip, "");
    }

    // Leading token: everything up to whitespace or `=`.
    let key_end = line.find([' ', '\t', '=']).unwrap_or(line.len());
    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t']);

    if key == "!include" || key == "!include_try" {
        let tolerant = key == "!include_try";
        return (LineEvent::Include { pattern: rest, tolerant }, "");
    }

    if let Some(after_eq) = rest.strip_prefix('=') {
        let candidate = after_eq.trim_start_matches([' ', '\t']);
        let (raw_value, remainder) = split_trailing_closes(candidate);
        let (value, quoted) = decode_value(raw_value, lookup);
        return (LineEvent::Assignment { key, value, quoted }, remainder);
    }

    if key == "}" && rest.bytes().all(|b| matches!(b, b' ' | b'\t' | b'}')) {
        return (LineEvent::SectionClose, rest);
    }

    // kind { ...  or  kind name { ...
    if let Some(after_brace) = rest.strip_prefix('{') {
        return (LineEvent::SectionOpen { kind: key, name: "" }, after_brace);
    }
    let name_end = rest.find([' ', '\t']).unwrap_or(rest.len());
    let name = &rest[..name_end];
    let after_name = rest[name_end..].trim_start_matches([' ', '\t']);
    if let Some(after_brace) = after_name.strip_prefix('{') {
        return (LineEvent::SectionOpen { kind: key, name }, after_brace);
    }

    (LineEvent::Error("Expecting '='".to_string()), "")
}

/// Strip and unescape a quoted value, or environment-expand a bare one.
fn decode_value<'a>(raw: &'a str, lookup: &EnvLookup) -> (Cow<'a, str>, bool) {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return (Cow::Owned(unescape(&raw[1..raw.len() - 1])), true);
        }
    }
    (env::expand(raw, lookup), false)
}

/// Remove backslash escapes: every `\X` becomes `X`.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split whitespace-separated trailing `}` tokens off an assignment value.
///
/// Lets an inline section body end on the assignment line. Only a `}` outside
/// quotes and preceded by whitespace counts, so values like `%{sha1}` and
/// `"a }"` are untouched.
fn split_trailing_closes(value: &str) -> (&str, &str) {
    let bytes = value.as_bytes();

    // Mark which bytes sit outside quoted spans.
    let mut outside = vec![true; bytes.len()];
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'"' || c == b'\'' {
            outside[i] = false;
            i += 1;
            while i < bytes.len() && bytes[i] != c {
                outside[i] = false;
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    i += 1;
                    outside[i] = false;
                }
                i += 1;
            }
            if i < bytes.len() {
                outside[i] = false;
                i += 1;
            }
        } else {
            i += 1;
        }
    }

    let mut end = value.len();
    let mut any = false;
    loop {
        let trimmed = value[..end].trim_end_matches([' ', '\t']);
        let te = trimmed.len();
        if te < 2 || trimmed.as_bytes()[te - 1] != b'}' || !outside[te - 1] {
            break;
        }
        if !matches!(trimmed.as_bytes()[te - 2], b' ' | b'\t') {
            break;
        }
        end = te - 1;
        any = true;
    }
    if !any {
        return (value, "");
    }
    (value[..end].trim_end_matches([' ', '\t']), &value[end..])
}
