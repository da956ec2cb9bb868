use std::ops::Range;
use std::sync::Arc;

use codespan_reporting::files::{Files, SimpleFiles};

/// Index of a file inside a [`SourceMap`]; doubles as the codespan file id.
pub type FileId = usize;

/// 1-based line and column of a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Every file read during a compilation, in load order.
///
/// Backed by codespan-reporting's `SimpleFiles` so diagnostics can be
/// rendered straight from it.
pub struct SourceMap {
    files: SimpleFiles<String, Arc<str>>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap {
            files: SimpleFiles::new(),
        }
    }

    /// Register a file. Line endings are normalised to `\n`.
    pub fn add(&mut self, name: impl Into<String>, source: &str) -> FileId {
        let text: Arc<str> = if source.contains('\r') {
            Arc::from(source.replace("\r\n", "\n").replace('\r', "\n"))
        } else {
            Arc::from(source)
        };
        self.files.add(name.into(), text)
    }

    pub fn name(&self, id: FileId) -> Option<&str> {
        self.files.get(id).ok().map(|f| f.name().as_str())
    }

    pub fn source(&self, id: FileId) -> Option<Arc<str>> {
        self.files.get(id).ok().map(|f| f.source().clone())
    }

    pub fn position(&self, id: FileId, offset: usize) -> Option<Position> {
        self.files.location(id, offset).ok().map(|loc| Position {
            line: loc.line_number,
            column: loc.column_number,
        })
    }

    pub fn files(&self) -> &SimpleFiles<String, Arc<str>> {
        &self.files
    }
}

impl Default for SourceMap {
    fn default() -> Self {
        Self::new()
    }
}

/// A position-tracked window over one file.
///
/// All grammar rules advance a cursor; rolling back is a matter of restoring
/// `pos`. Template bodies and arguments get their own cursor over the byte
/// range they were captured from, so diagnostics inside expansions still point
/// at real source.
#[derive(Debug, Clone)]
pub struct Cursor {
    file: FileId,
    text: Arc<str>,
    start: usize,
    pos: usize,
    end: usize,
}

impl Cursor {
    pub fn new(file: FileId, text: Arc<str>) -> Self {
        let end = text.len();
        Cursor {
            file,
            text,
            start: 0,
            pos: 0,
            end,
        }
    }

    pub fn over(file: FileId, text: Arc<str>, range: Range<usize>) -> Self {
        Cursor {
            file,
            text,
            start: range.start,
            pos: range.start,
            end: range.end,
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn text(&self) -> &Arc<str> {
        &self.text
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.end);
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    pub fn rest(&self) -> &str {
        &self.text[self.pos..self.end]
    }

    pub fn slice(&self, range: Range<usize>) -> &str {
        &self.text[range]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    /// The character before the cursor, if it is inside this window.
    pub fn prev(&self) -> Option<char> {
        self.text[self.start..self.pos].chars().next_back()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    pub fn eat_char(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consume characters while `pred` holds and return the consumed range.
    pub fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> Range<usize> {
        let from = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        from..self.pos
    }

    /// Spaces and tabs.
    pub fn skip_blanks(&mut self) -> bool {
        !self.eat_while(|c| c == ' ' || c == '\t').is_empty()
    }

    /// Spaces, tabs and line breaks.
    pub fn skip_space(&mut self) -> bool {
        !self.eat_while(char::is_whitespace).is_empty()
    }

    pub fn at_line_start(&self) -> bool {
        self.pos == self.start || self.text[..self.pos].ends_with('\n')
    }

    /// A line break followed by an empty (or blank) line.
    pub fn at_blank_line(&self) -> bool {
        match self.rest().strip_prefix('\n') {
            Some(after) => after.trim_start_matches([' ', '\t']).starts_with('\n'),
            None => false,
        }
    }
}
