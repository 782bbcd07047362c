//! Parse errors with file and line context.

use std::io;
use std::path::{Path, PathBuf};

/// Error aborting a parse.
///
/// Every variant carries the path of the frame at which the error was
/// detected; errors inside included files name the included file, not the
/// root.
#[derive(Debug)]
pub enum ParseError {
    /// The root configuration file could not be opened.
    Open {
        /// Path of the root file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// Reading from an open input failed mid-parse.
    Read {
        /// Path of the file being read.
        path: PathBuf,
        /// Last fully read line number.
        line: u32,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// A syntax, include, or handler error at a specific line.
    Parse {
        /// Path of the file containing the offending line.
        path: PathBuf,
        /// 1-based line number of the offending line.
        line: u32,
        /// Human-readable message, already enriched with section context
        /// where applicable.
        message: String,
    },
}

impl ParseError {
    /// Path of the file the error was detected in.
    pub fn path(&self) -> &Path {
        match self {
            ParseError::Open { path, .. }
            | ParseError::Read { path, .. }
            | ParseError::Parse { path, .. } => path,
        }
    }

    /// Line number of the error, if it occurred past open.
    pub fn line(&self) -> Option<u32> {
        match self {
            ParseError::Open { .. } => None,
            ParseError::Read { line, .. } | ParseError::Parse { line, .. } => Some(*line),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Open { path, source } => {
                write!(
                    f,
                    "Can't open configuration file {}: {}",
                    path.display(),
                    source
                )
            }
            ParseError::Read { path, line, source } => {
                write!(
                    f,
                    "Error in configuration file {} line {}: {}",
                    path.display(),
                    line,
                    source
                )
            }
            ParseError::Parse {
                path,
                line,
                message,
            } => {
                write!(
                    f,
                    "Error in configuration file {} line {}: {}",
                    path.display(),
                    line,
                    message
                )
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Open { source, .. } | ParseError::Read { source, .. } => Some(source),
            ParseError::Parse { .. } => None,
        }
    }
}
