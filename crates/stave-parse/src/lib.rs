//! Event-based parser for stave configuration files.
//!
//! This crate provides the low-level machinery for reading a hierarchical
//! settings file and everything it transitively includes: a line scanner
//! (comments, quoting, continuation), a logical-line classifier, a stack of
//! open input files with cycle detection, glob-expanded `!include` /
//! `!include_try` directives, and a dispatcher that hands assignments and
//! section boundaries to a consumer-supplied [`ParseHandler`].
//!
//! The parser owns no representation of the configuration itself. Consumers
//! build whatever they need from the callbacks; `stave-settings` layers a
//! definition-driven record filler on top.

pub mod callback;
mod env;
pub mod error;
pub mod event;
mod include;
mod input;
mod parser;
mod scanner;

pub use callback::{ParseHandler, SectionAction};
pub use error::ParseError;
pub use event::LineEvent;
pub use parser::{Parser, parse_file};
