//! Glob-expanded include loading.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::input::{InputFrame, InputStack};

/// Expand `pattern` and push a frame for every match.
///
/// Matches are pushed in expansion order, so the parser reads the last match
/// first. With `tolerant`, an empty match set and missing files are accepted;
/// every other failure aborts.
pub(crate) fn load(pattern: &Path, tolerant: bool, stack: &mut InputStack) -> Result<(), String> {
    let pattern = pattern.to_string_lossy();

    let mut matched: Vec<PathBuf> = Vec::new();
    for alternative in expand_braces(&pattern) {
        let paths =
            glob::glob(&alternative).map_err(|e| format!("glob() failed: {e}"))?;
        for entry in paths {
            match entry {
                Ok(path) => matched.push(path),
                Err(e) => return Err(format!("glob() failed: {e}")),
            }
        }
    }

    if matched.is_empty() {
        if tolerant {
            return Ok(());
        }
        return Err("No matches".to_string());
    }

    for path in matched {
        if stack.contains(&path) {
            return Err(format!("Recursive include file: {}", path.display()));
        }
        match InputFrame::open(path.clone()) {
            Ok(frame) => stack.push(frame),
            Err(e) if tolerant && e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(format!(
                    "Couldn't open include file {}: {e}",
                    path.display()
                ));
            }
        }
    }
    Ok(())
}

/// Expand `{a,b,c}` alternatives, left to right, innermost groups included.
///
/// The glob crate has no brace support, so alternation happens before the
/// wildcard pass. A pattern without braces (or with unbalanced ones) comes
/// back unchanged.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let bytes = pattern.as_bytes();
    let mut depth = 0usize;
    let mut close = None;
    let mut splits = Vec::new();
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            b',' if depth == 1 => splits.push(i),
            _ => {}
        }
    }
    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut out = Vec::new();
    let mut start = open + 1;
    for end in splits.into_iter().chain([close]) {
        let alternative = format!("{prefix}{}{suffix}", &pattern[start..end]);
        out.extend(expand_braces(&alternative));
        start = end + 1;
    }
    out
}
