//! The stack of open input files.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One open input file with its line cursor.
pub(crate) struct InputFrame {
    pub(crate) path: PathBuf,
    reader: Box<dyn BufRead>,
    /// 1-based number of the last line read.
    pub(crate) line: u32,
}

impl InputFrame {
    pub(crate) fn open(path: PathBuf) -> io::Result<Self> {
        let file = File::open(&path)?;
        Ok(InputFrame {
            path,
            reader: Box::new(BufReader::new(file)),
            line: 0,
        })
    }

    pub(crate) fn from_reader(reader: Box<dyn BufRead>, path: PathBuf) -> Self {
        InputFrame {
            path,
            reader,
            line: 0,
        }
    }

    /// Read the next physical line into `buf`, without its line ending.
    ///
    /// Returns `false` at end of input.
    pub(crate) fn next_line(&mut self, buf: &mut String) -> io::Result<bool> {
        buf.clear();
        if self.reader.read_line(buf)? == 0 {
            return Ok(false);
        }
        self.line += 1;
        if buf.ends_with('\n') {
            buf.pop();
        }
        if buf.ends_with('\r') {
            buf.pop();
        }
        Ok(true)
    }
}

/// Stack of open inputs; the parser always reads from the top.
///
/// Pushed by includes, popped at end of file. The live frames double as the
/// cycle check: a path may appear at most once.
pub(crate) struct InputStack {
    frames: Vec<InputFrame>,
}

impl InputStack {
    pub(crate) fn new(root: InputFrame) -> Self {
        InputStack { frames: vec![root] }
    }

    pub(crate) fn push(&mut self, frame: InputFrame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<InputFrame> {
        self.frames.pop()
    }

    pub(crate) fn top(&self) -> Option<&InputFrame> {
        self.frames.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut InputFrame> {
        self.frames.last_mut()
    }

    pub(crate) fn contains(&self, path: &Path) -> bool {
        self.frames.iter().any(|frame| frame.path == path)
    }
}

/// Resolve an include path against the file containing the directive.
///
/// Absolute paths pass through; relative paths resolve against the including
/// file's directory, or pass through when it has none.
pub(crate) fn resolve_relative(path: &str, including: &Path) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    match including.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(candidate),
        _ => candidate.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_next_line_strips_endings() {
        let mut frame = InputFrame::from_reader(
            Box::new(Cursor::new("a\nb\r\nc")),
            PathBuf::from("test.conf"),
        );
        let mut buf = String::new();
        assert!(frame.next_line(&mut buf).unwrap());
        assert_eq!(buf, "a");
        assert!(frame.next_line(&mut buf).unwrap());
        assert_eq!(buf, "b");
        assert!(frame.next_line(&mut buf).unwrap());
        assert_eq!(buf, "c");
        assert_eq!(frame.line, 3);
        assert!(!frame.next_line(&mut buf).unwrap());
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative("/etc/mail/extra.conf", Path::new("/etc/mail/main.conf")),
            PathBuf::from("/etc/mail/extra.conf")
        );
        assert_eq!(
            resolve_relative("extra.conf", Path::new("/etc/mail/main.conf")),
            PathBuf::from("/etc/mail/extra.conf")
        );
        assert_eq!(
            resolve_relative("extra.conf", Path::new("main.conf")),
            PathBuf::from("extra.conf")
        );
    }

    #[test]
    fn test_contains() {
        let root = InputFrame::from_reader(Box::new(Cursor::new("")), PathBuf::from("a.conf"));
        let mut stack = InputStack::new(root);
        stack.push(InputFrame::from_reader(
            Box::new(Cursor::new("")),
            PathBuf::from("b.conf"),
        ));
        assert!(stack.contains(Path::new("a.conf")));
        assert!(stack.contains(Path::new("b.conf")));
        assert!(!stack.contains(Path::new("c.conf")));
    }
}
