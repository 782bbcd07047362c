//! The dispatch loop: reads physical lines from the input stack, joins
//! continuations, classifies each logical line, and drives a [`ParseHandler`].

use std::io::BufRead;
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use crate::callback::{ParseHandler, SectionAction};
use crate::env;
use crate::error::ParseError;
use crate::event::{self, LineEvent};
use crate::include;
use crate::input::{self, InputFrame, InputStack};
use crate::scanner::{self, Scan};

/// Parser over a root input and everything it includes.
///
/// Consumed by [`parse`](Parser::parse) or
/// [`parse_section`](Parser::parse_section); all open inputs are released
/// when parsing ends, successfully or not.
pub struct Parser {
    stack: InputStack,
    env_lookup: Box<dyn Fn(&str) -> Option<String>>,
}

impl Parser {
    /// Open the root configuration file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ParseError> {
        let path = path.into();
        let frame = InputFrame::open(path.clone())
            .map_err(|source| ParseError::Open { path, source })?;
        Ok(Parser {
            stack: InputStack::new(frame),
            env_lookup: Box::new(env::process_env),
        })
    }

    /// Parse from an already open source.
    ///
    /// `path` labels error messages and anchors relative includes.
    pub fn from_reader(reader: impl BufRead + 'static, path: impl Into<PathBuf>) -> Self {
        let frame = InputFrame::from_reader(Box::new(reader), path.into());
        Parser {
            stack: InputStack::new(frame),
            env_lookup: Box::new(env::process_env),
        }
    }

    /// Replace the environment lookup used for `$ENV:NAME` expansion.
    pub fn env_lookup(mut self, lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// Dispatch the whole input to `handler`.
    pub fn parse<H: ParseHandler + ?Sized>(self, handler: &mut H) -> Result<(), ParseError> {
        self.run(None, handler)
    }

    /// Dispatch only the subtree addressed by the `/`-separated `selector`.
    ///
    /// Each selector segment matches a section's name, or its type when the
    /// section has no name. The handler sees the matched sections themselves
    /// and the full body of the innermost one; everything else is suppressed.
    /// A selector that matches nothing is not an error; the parse succeeds
    /// with no callbacks fired.
    pub fn parse_section<H: ParseHandler + ?Sized>(
        self,
        selector: &str,
        handler: &mut H,
    ) -> Result<(), ParseError> {
        self.run(Some(selector), handler)
    }

    fn run<H: ParseHandler + ?Sized>(
        self,
        selector: Option<&str>,
        handler: &mut H,
    ) -> Result<(), ParseError> {
        let Parser {
            mut stack,
            env_lookup,
        } = self;

        let segments: Vec<String> = selector
            .map(|s| s.split('/').map(str::to_string).collect())
            .unwrap_or_default();
        let mut dispatch = Dispatch {
            handler,
            depth: 0,
            skip: 0,
            phase: if segments.is_empty() {
                Phase::Normal
            } else {
                Phase::Seeking
            },
            segments,
            pending: Vec::new(),
            last_section: None,
        };

        let mut raw = String::new();
        // Joins `\`-continued physical lines; shared across frame boundaries.
        let mut joined = String::new();
        let mut last_eof: Option<(PathBuf, u32)> = None;

        loop {
            let (got, line_no) = {
                let Some(frame) = stack.top_mut() else { break };
                match frame.next_line(&mut raw) {
                    Ok(got) => (got, frame.line),
                    Err(source) => {
                        return Err(ParseError::Read {
                            path: frame.path.clone(),
                            line: frame.line,
                            source,
                        });
                    }
                }
            };
            if !got {
                let finished = stack.pop().expect("read from a frame");
                last_eof = Some((finished.path, finished.line));
                continue;
            }

            match scanner::scan(&raw) {
                Scan::Blank => {
                    trace!("line {}: {:?}", line_no, LineEvent::Skip);
                    continue;
                }
                Scan::UnterminatedQuote => {
                    return Err(parse_error(
                        &stack,
                        line_no,
                        "Unterminated quoted string".to_string(),
                    ));
                }
                Scan::Content {
                    text,
                    continued,
                    ambiguous_hash,
                } => {
                    if ambiguous_hash {
                        let frame = stack.top().expect("frame is open");
                        warn!(
                            "Configuration file {} line {}: Ambiguous '#' character in line, \
                             treating it as comment. Add a space before it to remove this warning.",
                            frame.path.display(),
                            line_no
                        );
                    }
                    if continued {
                        trace!("line {}: {:?}", line_no, LineEvent::Continue);
                        joined.push_str(text);
                        joined.push(' ');
                        continue;
                    }
                    let logical: &str = if joined.is_empty() {
                        text
                    } else {
                        joined.push_str(text);
                        joined.as_str()
                    };

                    let mut rest = logical;
                    while !rest.is_empty() {
                        let (event, remainder) = event::classify_step(rest, env_lookup.as_ref());
                        rest = remainder;
                        trace!("line {}: {:?}", line_no, event);

                        let flow = match event {
                            LineEvent::Skip | LineEvent::Continue => Flow::Continue,
                            LineEvent::Include { pattern, tolerant } => {
                                let (resolved, at_path) = {
                                    let frame = stack.top().expect("frame is open");
                                    (
                                        input::resolve_relative(pattern, &frame.path),
                                        frame.path.clone(),
                                    )
                                };
                                if let Err(message) =
                                    include::load(&resolved, tolerant, &mut stack)
                                {
                                    return Err(ParseError::Parse {
                                        path: at_path,
                                        line: line_no,
                                        message,
                                    });
                                }
                                Flow::Continue
                            }
                            LineEvent::Assignment {
                                key,
                                value,
                                quoted: _,
                            } => dispatch
                                .assignment(key, &value)
                                .map_err(|message| parse_error(&stack, line_no, message))?,
                            LineEvent::SectionOpen { kind, name } => {
                                let flow = dispatch
                                    .open_section(kind, name)
                                    .map_err(|message| parse_error(&stack, line_no, message))?;
                                let frame = stack.top().expect("frame is open");
                                dispatch.last_section = Some((frame.path.clone(), line_no));
                                flow
                            }
                            LineEvent::SectionClose => {
                                let flow = dispatch
                                    .close_section()
                                    .map_err(|message| parse_error(&stack, line_no, message))?;
                                let frame = stack.top().expect("frame is open");
                                dispatch.last_section = Some((frame.path.clone(), line_no));
                                flow
                            }
                            LineEvent::Error(message) => {
                                return Err(parse_error(&stack, line_no, message));
                            }
                        };
                        if matches!(flow, Flow::Finished) {
                            return Ok(());
                        }
                    }
                    joined.clear();
                }
            }
        }

        if dispatch.depth > 0 {
            let (path, line) = last_eof.expect("at least the root frame was read");
            return Err(ParseError::Parse {
                path,
                line,
                message: "Missing '}'".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse `path`, optionally targeting a `/`-separated section selector.
pub fn parse_file<H: ParseHandler + ?Sized>(
    path: impl AsRef<Path>,
    selector: Option<&str>,
    handler: &mut H,
) -> Result<(), ParseError> {
    let parser = Parser::open(path.as_ref())?;
    match selector {
        Some(selector) => parser.parse_section(selector, handler),
        None => parser.parse(handler),
    }
}

fn parse_error(stack: &InputStack, line: u32, message: String) -> ParseError {
    let path = stack
        .top()
        .map(|frame| frame.path.clone())
        .unwrap_or_default();
    ParseError::Parse {
        path,
        line,
        message,
    }
}

enum Flow {
    Continue,
    Finished,
}

enum Phase {
    /// No selector: dispatch everything, honoring skip.
    Normal,
    /// Selector present, descending the matched spine without dispatching.
    Seeking,
    /// Target fully matched at depth `root`; `owed` counts spine closes
    /// still to deliver before the parse completes.
    Inside { root: u32, owed: u32 },
}

struct Dispatch<'h, H: ?Sized> {
    handler: &'h mut H,
    /// Open section count.
    depth: u32,
    /// Nesting of sections whose events are suppressed.
    skip: u32,
    /// Selector segments; empty when parsing everything.
    segments: Vec<String>,
    /// Matched spine sections not yet dispatched.
    pending: Vec<(String, String)>,
    phase: Phase,
    /// Most recent section boundary, for error enrichment.
    last_section: Option<(PathBuf, u32)>,
}

impl<H: ParseHandler + ?Sized> Dispatch<'_, H> {
    fn dispatching(&self) -> bool {
        self.skip == 0
            && match self.phase {
                Phase::Normal => true,
                Phase::Seeking => false,
                Phase::Inside { root, .. } => self.depth >= root,
            }
    }

    fn enrich(&self, message: String) -> String {
        match &self.last_section {
            Some((path, line)) => format!(
                "{message} (section changed in {} at line {})",
                path.display(),
                line
            ),
            None => message,
        }
    }

    fn assignment(&mut self, key: &str, value: &str) -> Result<Flow, String> {
        if self.dispatching() {
            self.handler
                .assignment(key, value)
                .map_err(|message| self.enrich(message))?;
        }
        Ok(Flow::Continue)
    }

    fn open_section(&mut self, kind: &str, name: &str) -> Result<Flow, String> {
        self.depth += 1;
        match self.phase {
            Phase::Normal => {
                if self.skip > 0 {
                    self.skip += 1;
                } else {
                    self.dispatch_open(kind, name)?;
                }
            }
            Phase::Seeking => {
                let next = self.pending.len();
                if self.skip == 0 && segment_matches(&self.segments[next], kind, name) {
                    self.pending.push((kind.to_string(), name.to_string()));
                    if self.pending.len() == self.segments.len() {
                        return self.enter_target();
                    }
                } else {
                    self.skip += 1;
                }
            }
            Phase::Inside { root, .. } => {
                if self.skip > 0 {
                    self.skip += 1;
                } else if self.depth - 1 >= root {
                    self.dispatch_open(kind, name)?;
                } else {
                    // Sibling of the spine after the target closed.
                    self.skip += 1;
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn dispatch_open(&mut self, kind: &str, name: &str) -> Result<(), String> {
        match self.handler.section_open(kind, name) {
            Ok(SectionAction::Enter) => Ok(()),
            Ok(SectionAction::Skip) => {
                self.skip = 1;
                Ok(())
            }
            Err(message) => Err(self.enrich(message)),
        }
    }

    /// The selector matched completely: deliver the buffered spine opens.
    fn enter_target(&mut self) -> Result<Flow, String> {
        let pending = std::mem::take(&mut self.pending);
        let total = pending.len();
        let mut owed = 0u32;
        for (i, (kind, name)) in pending.iter().enumerate() {
            match self.handler.section_open(kind, name) {
                Ok(SectionAction::Enter) => owed += 1,
                Ok(SectionAction::Skip) => {
                    self.skip = (total - i) as u32;
                    break;
                }
                Err(message) => return Err(self.enrich(message)),
            }
        }
        self.phase = Phase::Inside {
            root: self.depth,
            owed,
        };
        Ok(Flow::Continue)
    }

    fn close_section(&mut self) -> Result<Flow, String> {
        if self.depth == 0 {
            return Err("Unexpected '}'".to_string());
        }
        self.depth -= 1;
        match self.phase {
            Phase::Normal => {
                if self.skip > 0 {
                    self.skip -= 1;
                } else {
                    self.handler.section_close()?;
                }
                Ok(Flow::Continue)
            }
            Phase::Seeking => {
                if self.skip > 0 {
                    self.skip -= 1;
                } else {
                    // A spine section closed before the target matched; a
                    // later sibling may still match this segment.
                    self.pending.pop();
                }
                Ok(Flow::Continue)
            }
            Phase::Inside { root, ref mut owed } => {
                if self.skip > 0 {
                    self.skip -= 1;
                    Ok(Flow::Continue)
                } else if self.depth >= root {
                    self.handler.section_close()?;
                    Ok(Flow::Continue)
                } else {
                    // Closing the target itself or a spine ancestor.
                    self.handler.section_close()?;
                    if *owed > 0 {
                        *owed -= 1;
                        if *owed == 0 {
                            return Ok(Flow::Finished);
                        }
                    }
                    Ok(Flow::Continue)
                }
            }
        }
    }
}

fn segment_matches(segment: &str, kind: &str, name: &str) -> bool {
    if name.is_empty() {
        segment == kind
    } else {
        segment == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        reject_key: Option<&'static str>,
        skip_kinds: Vec<&'static str>,
    }

    impl ParseHandler for Recorder {
        fn assignment(&mut self, key: &str, value: &str) -> Result<(), String> {
            if self.reject_key == Some(key) {
                return Err("nope".to_string());
            }
            self.events.push(format!("kv {key}={value}"));
            Ok(())
        }

        fn section_open(&mut self, kind: &str, name: &str) -> Result<SectionAction, String> {
            if self.skip_kinds.contains(&kind) {
                return Ok(SectionAction::Skip);
            }
            self.events.push(format!("open {kind}/{name}"));
            Ok(SectionAction::Enter)
        }

        fn section_close(&mut self) -> Result<(), String> {
            self.events.push("close".to_string());
            Ok(())
        }
    }

    /// Only implements assignments; sections fall back to the default skip.
    #[derive(Default)]
    struct Flat {
        pairs: Vec<(String, String)>,
    }

    impl ParseHandler for Flat {
        fn assignment(&mut self, key: &str, value: &str) -> Result<(), String> {
            self.pairs.push((key.to_string(), value.to_string()));
            Ok(())
        }
    }

    fn parser(source: &str) -> Parser {
        Parser::from_reader(Cursor::new(source.to_string()), "test.conf")
    }

    fn parse_ok(source: &str) -> Vec<String> {
        let mut rec = Recorder::default();
        parser(source).parse(&mut rec).expect("parse");
        rec.events
    }

    fn parse_err(source: &str) -> ParseError {
        let mut rec = Recorder::default();
        parser(source).parse(&mut rec).expect_err("parse error")
    }

    #[test]
    fn test_basic_assignment() {
        assert_eq!(parse_ok("foo = bar\n"), vec!["kv foo=bar"]);
    }

    #[test]
    fn test_continuation_with_comment() {
        // One space survives from before the backslash, one comes from the
        // join itself.
        assert_eq!(parse_ok("a = 1 \\\n   2 # trailing\n"), vec!["kv a=1  2"]);
    }

    #[test]
    fn test_quoted_hash_and_escape() {
        let events = parse_ok("x = \"he said \\\"hi#there\\\"\"\n");
        assert_eq!(events, vec!["kv x=he said \"hi#there\""]);
    }

    #[test]
    fn test_ambiguous_hash_still_comments() {
        assert_eq!(parse_ok("a = b#c\n"), vec!["kv a=b"]);
    }

    #[test]
    fn test_sections_dispatched() {
        let events = parse_ok("svc imap {\nport = 143\n}\n");
        assert_eq!(events, vec!["open svc/imap", "kv port=143", "close"]);
    }

    #[test]
    fn test_open_close_balance() {
        let events = parse_ok("a {\nb {\n}\nc {\n}\n}\n");
        let opens = events.iter().filter(|e| e.starts_with("open")).count();
        let closes = events.iter().filter(|e| *e == "close").count();
        assert_eq!(opens, 3);
        assert_eq!(closes, 3);
    }

    #[test]
    fn test_handler_skip_suppresses_body() {
        let mut rec = Recorder {
            skip_kinds: vec!["private"],
            ..Recorder::default()
        };
        parser("a = 1\nprivate {\nx = 2\ninner {\ny = 3\n}\n}\nb = 4\n")
            .parse(&mut rec)
            .expect("parse");
        assert_eq!(rec.events, vec!["kv a=1", "kv b=4"]);
    }

    #[test]
    fn test_default_handler_skips_sections() {
        let mut flat = Flat::default();
        parser("a = 1\nsvc {\nb = 2\n}\nc = 3\n")
            .parse(&mut flat)
            .expect("parse");
        let keys: Vec<&str> = flat.pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_callback_rejection_enriched() {
        let mut rec = Recorder {
            reject_key: Some("key"),
            ..Recorder::default()
        };
        let err = parser("svc { key = v }\n").parse(&mut rec).expect_err("rejected");
        assert_eq!(
            err.to_string(),
            "Error in configuration file test.conf line 1: nope \
             (section changed in test.conf at line 1)"
        );
    }

    #[test]
    fn test_rejection_without_section_unenriched() {
        let mut rec = Recorder {
            reject_key: Some("key"),
            ..Recorder::default()
        };
        let err = parser("key = v\n").parse(&mut rec).expect_err("rejected");
        insta::assert_snapshot!(
            err.to_string(),
            @"Error in configuration file test.conf line 1: nope"
        );
    }

    #[test]
    fn test_unexpected_close() {
        let err = parse_err("}\n");
        insta::assert_snapshot!(
            err.to_string(),
            @"Error in configuration file test.conf line 1: Unexpected '}'"
        );
    }

    #[test]
    fn test_expecting_equals() {
        let err = parse_err("foo\n");
        insta::assert_snapshot!(
            err.to_string(),
            @"Error in configuration file test.conf line 1: Expecting '='"
        );
    }

    #[test]
    fn test_missing_close_at_eof() {
        let err = parse_err("svc {\nx = 1\n");
        insta::assert_snapshot!(
            err.to_string(),
            @"Error in configuration file test.conf line 2: Missing '}'"
        );
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_err("x = 'oops\n");
        insta::assert_snapshot!(
            err.to_string(),
            @"Error in configuration file test.conf line 1: Unterminated quoted string"
        );
    }

    #[test]
    fn test_env_expansion_law() {
        let mut flat = Flat::default();
        Parser::from_reader(
            Cursor::new("a = $ENV:HOST\nb = \"$ENV:HOST\"\n".to_string()),
            "test.conf",
        )
        .env_lookup(|name| (name == "HOST").then(|| "example.com".to_string()))
        .parse(&mut flat)
        .expect("parse");
        assert_eq!(
            flat.pairs,
            vec![
                ("a".to_string(), "example.com".to_string()),
                ("b".to_string(), "$ENV:HOST".to_string()),
            ]
        );
    }

    const TARGETED: &str = "outer {\n  inner { k = 1 }\n  other { k = 2 }\n}\n";

    #[test]
    fn test_targeted_parse() {
        let mut rec = Recorder::default();
        parser(TARGETED)
            .parse_section("outer/inner", &mut rec)
            .expect("parse");
        assert_eq!(
            rec.events,
            vec!["open outer/", "open inner/", "kv k=1", "close", "close"]
        );
    }

    #[test]
    fn test_targeted_parse_by_name() {
        let mut rec = Recorder::default();
        parser("protocol imap {\nx = 1\n}\nprotocol pop3 {\ny = 2\n}\n")
            .parse_section("pop3", &mut rec)
            .expect("parse");
        assert_eq!(
            rec.events,
            vec!["open protocol/pop3", "kv y=2", "close"]
        );
    }

    #[test]
    fn test_targeted_parse_no_match() {
        let mut rec = Recorder::default();
        parser(TARGETED)
            .parse_section("outer/nothere", &mut rec)
            .expect("parse");
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_targeted_parse_later_sibling_matches() {
        let mut rec = Recorder::default();
        parser("outer {\n}\nouter {\n  inner { k = 9 }\n}\n")
            .parse_section("outer/inner", &mut rec)
            .expect("parse");
        assert_eq!(
            rec.events,
            vec!["open outer/", "open inner/", "kv k=9", "close", "close"]
        );
    }

    #[test]
    fn test_targeted_parse_unbalanced_still_fails() {
        let mut rec = Recorder::default();
        let err = parser("a {\n")
            .parse_section("nope", &mut rec)
            .expect_err("unbalanced");
        assert!(err.to_string().contains("Missing '}'"));
    }

    #[test]
    fn test_inline_section_on_one_line() {
        let events = parse_ok("svc { key = v }\n");
        assert_eq!(events, vec!["open svc/", "kv key=v", "close"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_ok("").is_empty());
        assert!(parse_ok("\n# only a comment\n\n").is_empty());
    }
}
