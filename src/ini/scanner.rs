use super::constants::*;

use log::trace;

use std::mem;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
#[error("{line}:{col} {kind}")]
pub struct ParseError {
    pub(crate) line: usize,
    pub(crate) col: usize,
    pub(crate) kind: ScanError,
}

impl ParseError {
    /// 1-based line the error occurred on
    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based column of the offending character, or of the last character of
    /// the line for errors detected at the end of a line
    pub fn col(&self) -> usize {
        self.col
    }

    pub fn kind(&self) -> &ScanError {
        &self.kind
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] InvalidToken),
    #[error("incomplete line: expected 'key = value' or a closed section header")]
    IncompleteLine,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidToken {
    #[error("key cannot be empty")]
    EmptyKey,
    #[error("'[' must be the first character in a line")]
    MisplacedSectionStart,
    #[error("unexpected character ']' outside of a section header")]
    UnexpectedSectionEnd,
    #[error("section name cannot be empty")]
    EmptySectionName,
    #[error("expected end of line after section header, but found {0:?}")]
    TrailingCharacter(char),
}

/// The token currently being accumulated
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Target {
    Section,
    #[default]
    Key,
    Value,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Triple {
    pub section: String,
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScanOutcome {
    Triple(Triple),
    NoTriple,
}

#[derive(Debug, Eq, PartialEq)]
pub enum Step {
    Continue,
    Done(ScanOutcome),
}

/// Parsing context carried from one line to the next while loading a
/// document.
///
/// Only the current section survives a line; the key and value buffers are
/// cleared after every line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScanState {
    pub(crate) target: Target,
    pub(crate) section: String,
    pub(crate) key: String,
    pub(crate) value: String,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            target: Target::default(),
            section: DEFAULT_SECTION.to_owned(),
            key: String::new(),
            value: String::new(),
        }
    }
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The token the next character is added to
    pub fn target(&self) -> Target {
        self.target
    }

    /// Name of the section entries are currently added to
    pub fn section(&self) -> &str {
        self.section.as_str()
    }

    /// Scans a single line. `line_no` is only used for error reporting.
    ///
    /// Scanning stops at the first `'\n'`, anything after it is ignored.
    pub fn scan_line(&mut self, line_no: usize, line: &str) -> Result<ScanOutcome, ParseError> {
        let res = self.scan_chars(line_no, line);
        self.end_line();
        res
    }

    fn scan_chars(&mut self, line_no: usize, line: &str) -> Result<ScanOutcome, ParseError> {
        let mut scanner = Scanner::new(self);
        let mut col = 0;

        for c in line.chars() {
            if c == '\n' {
                break;
            }
            col += 1;

            match scanner.step(c) {
                Ok(Step::Continue) => {}
                Ok(Step::Done(outcome)) => return Ok(outcome),
                Err(kind) => {
                    return Err(ParseError {
                        line: line_no,
                        col,
                        kind,
                    })
                }
            }
        }

        scanner.finish().map_err(|kind| ParseError {
            line: line_no,
            col,
            kind,
        })
    }

    fn end_line(&mut self) {
        self.target = Target::Key;
        self.key.clear();
        self.value.clear();
    }

    fn buffer_mut(&mut self) -> &mut String {
        match self.target {
            Target::Section => &mut self.section,
            Target::Key => &mut self.key,
            Target::Value => &mut self.value,
        }
    }

    fn take_triple(&mut self) -> Triple {
        Triple {
            section: self.section.clone(),
            key: mem::take(&mut self.key),
            value: mem::take(&mut self.value),
        }
    }
}

/// Character-level state machine for one line.
///
/// Feed it with [`Scanner::step`] until it reports [`Step::Done`] or the line
/// runs out, then call [`Scanner::finish`].
#[derive(Debug)]
pub struct Scanner<'s> {
    state: &'s mut ScanState,
    // a backslash was read and not consumed yet
    escape: bool,
    // a meaningful character was read on this line
    read: bool,
    // a section header was closed on this line
    closed: bool,
}

impl<'s> Scanner<'s> {
    pub fn new(state: &'s mut ScanState) -> Self {
        Self {
            state,
            escape: false,
            read: false,
            closed: false,
        }
    }

    pub fn step(&mut self, c: char) -> Result<Step, ScanError> {
        // ignored everywhere, even right after a backslash
        if DISCARDED_CHARS.contains(&c) {
            return Ok(Step::Continue);
        }

        if self.closed {
            return self.step_after_header(c);
        }

        if c == ' ' && self.state.target != Target::Section {
            return Ok(Step::Continue);
        }

        if self.escape {
            self.escape = false;
            self.read = true;
            self.state.buffer_mut().push(c);
            return Ok(Step::Continue);
        }

        match c {
            COMMENT_CHAR => return self.comment(),
            ASSIGN_CHAR => {
                if self.state.key.is_empty() {
                    return Err(InvalidToken::EmptyKey.into());
                }
                self.state.target = Target::Value;
            }
            SECTION_START => {
                if self.read {
                    return Err(InvalidToken::MisplacedSectionStart.into());
                }
                self.state.section.clear();
                self.state.target = Target::Section;
            }
            SECTION_END => {
                if self.state.target != Target::Section {
                    return Err(InvalidToken::UnexpectedSectionEnd.into());
                }
                if self.state.section.is_empty() {
                    return Err(InvalidToken::EmptySectionName.into());
                }
                trace!("entering section {:?}", self.state.section);
                self.closed = true;
            }
            ESCAPE_CHAR => self.escape = true,
            _ => self.state.buffer_mut().push(c),
        }

        self.read = true;
        Ok(Step::Continue)
    }

    /// Decides the outcome of a line that ran out of characters
    pub fn finish(self) -> Result<ScanOutcome, ScanError> {
        if self.closed || !self.read {
            return Ok(ScanOutcome::NoTriple);
        }

        if self.state.target == Target::Section {
            return Err(ScanError::IncompleteLine);
        }

        if self.state.key.is_empty() && self.state.value.is_empty() {
            return Err(ScanError::IncompleteLine);
        }

        Ok(ScanOutcome::Triple(self.state.take_triple()))
    }

    fn comment(&mut self) -> Result<Step, ScanError> {
        if self.state.target == Target::Section {
            return Err(ScanError::IncompleteLine);
        }

        if self.state.key.is_empty() || self.state.value.is_empty() {
            return Ok(Step::Done(ScanOutcome::NoTriple));
        }

        Ok(Step::Done(ScanOutcome::Triple(self.state.take_triple())))
    }

    fn step_after_header(&mut self, c: char) -> Result<Step, ScanError> {
        match c {
            ' ' => Ok(Step::Continue),
            COMMENT_CHAR => Ok(Step::Done(ScanOutcome::NoTriple)),
            _ => Err(InvalidToken::TrailingCharacter(c).into()),
        }
    }
}
