//! `$ENV:NAME` substitution for unquoted assignment values.

use std::borrow::Cow;

/// Environment lookup used during value expansion.
///
/// The parser defaults to [`std::env::var`]; tests inject a table instead of
/// mutating the process environment.
pub(crate) type EnvLookup = dyn Fn(&str) -> Option<String>;

pub(crate) fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Expand `$ENV:NAME` occurrences in `value`.
///
/// A reference is recognized only at the start of the value or after a space
/// or tab. `NAME` runs to the next space or to the end of the value. Unset
/// variables expand to the empty string; any other `$` is copied through.
pub(crate) fn expand<'a>(value: &'a str, lookup: &EnvLookup) -> Cow<'a, str> {
    if !value.contains('$') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut pos = 0;
    while let Some(off) = value[pos..].find('$') {
        let p = pos + off;
        out.push_str(&value[pos..p]);
        let at_boundary = p == 0 || matches!(value.as_bytes()[p - 1], b' ' | b'\t');
        if at_boundary && value[p..].starts_with("$ENV:") {
            let name_start = p + 5;
            let name_end = value[name_start..]
                .find(' ')
                .map(|i| name_start + i)
                .unwrap_or(value.len());
            if let Some(v) = lookup(&value[name_start..name_end]) {
                out.push_str(&v);
            }
            pos = name_end;
        } else {
            out.push('$');
            pos = p + 1;
        }
    }
    out.push_str(&value[pos..]);
    Cow::Owned(out)
}
