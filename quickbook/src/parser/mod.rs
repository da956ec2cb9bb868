pub mod block;
pub mod doc_info;
pub mod error;
pub mod expand;
pub mod phrase;
pub mod state;

pub use error::{Diagnostic, ErrorKind, ParseResult};

use std::ops::Range;
use std::path::PathBuf;

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::event::{Event, Tag, TagEnd};
use crate::include::SourceLoader;
use crate::parser::state::{FileContext, State};
use crate::source::{Cursor, FileId, SourceMap};
use crate::{CompileOptions, Compilation};

/// Recursive-descent parser over one document and everything it includes.
///
/// Every grammar rule is a method. Rules append to `out` and report whether
/// they matched; [`Parser::attempt`] rolls a failed rule back so rules can be
/// tried in order. Hard errors travel up as `Err` and end the document.
pub struct Parser<'a> {
    cursor: Cursor,
    state: State,
    sources: SourceMap,
    options: &'a CompileOptions,
    loader: &'a dyn SourceLoader,
    out: Vec<Event>,
    diagnostics: Vec<Diagnostic>,
    now: NaiveDateTime,
}

struct Checkpoint {
    pos: usize,
    out: usize,
    diagnostics: usize,
    errors: usize,
}

impl<'a> Parser<'a> {
    pub fn new(
        sources: SourceMap,
        file: FileId,
        path: PathBuf,
        options: &'a CompileOptions,
        loader: &'a dyn SourceLoader,
    ) -> Self {
        let text = sources.source(file).unwrap_or_else(|| "".into());
        let now = if options.debug {
            fixed_clock()
        } else {
            Local::now().naive_local()
        };
        Parser {
            cursor: Cursor::new(file, text),
            state: State::new(
                FileContext {
                    id: file,
                    path,
                    section_base: 0,
                },
                options.default_version,
            ),
            sources,
            options,
            loader,
            out: Vec::new(),
            diagnostics: Vec::new(),
            now,
        }
    }

    /// Parse the whole document.
    pub fn run(mut self) -> Compilation {
        if let Err(diagnostic) = self.document() {
            tracing::debug!(error = %diagnostic.kind, "document aborted");
            self.report(diagnostic);
        }
        self.balance();

        Compilation {
            events: self.out,
            diagnostics: self.diagnostics,
            sources: self.sources,
            error_count: self.state.error_count,
        }
    }

    // -----------------------------------------------------------------------
    // Backtracking
    // -----------------------------------------------------------------------

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.cursor.pos(),
            out: self.out.len(),
            diagnostics: self.diagnostics.len(),
            errors: self.state.error_count,
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.cursor.set_pos(checkpoint.pos);
        self.out.truncate(checkpoint.out);
        self.diagnostics.truncate(checkpoint.diagnostics);
        self.state.error_count = checkpoint.errors;
    }

    /// Run `rule`; if it does not match, undo everything it did.
    fn attempt(&mut self, rule: impl FnOnce(&mut Self) -> ParseResult<bool>) -> ParseResult<bool> {
        let checkpoint = self.checkpoint();
        let matched = rule(self)?;
        if !matched {
            self.rollback(checkpoint);
        }
        Ok(matched)
    }

    /// Run `rule` over another piece of source, then restore the cursor.
    fn with_cursor<T>(
        &mut self,
        cursor: Cursor,
        rule: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<(T, Cursor)> {
        let saved = std::mem::replace(&mut self.cursor, cursor);
        let result = rule(self);
        let inner = std::mem::replace(&mut self.cursor, saved);
        result.map(|value| (value, inner))
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    fn push(&mut self, event: Event) {
        match event {
            Event::Text(text) => self.text(&text),
            event => self.out.push(event),
        }
    }

    /// Append text, merging with a preceding text event.
    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Event::Text(last)) = self.out.last_mut() {
            last.push_str(text);
        } else {
            self.out.push(Event::Text(text.to_string()));
        }
    }

    fn start(&mut self, tag: Tag) {
        self.out.push(Event::Start(tag));
    }

    fn end(&mut self, tag: TagEnd) {
        self.out.push(Event::End(tag));
    }

    /// Run `rule` into an empty buffer and hand back what it produced.
    /// Text never merges across the boundary.
    fn collect<T>(
        &mut self,
        rule: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<(T, Vec<Event>)> {
        let outer = std::mem::take(&mut self.out);
        let result = rule(self);
        let inner = std::mem::replace(&mut self.out, outer);
        result.map(|value| (value, inner))
    }

    /// Emit `events` as paragraphs of kind `tag`.
    ///
    /// Block events at the top level of `events` (from block templates
    /// expanded mid-paragraph) are pulled out, and the inline runs around
    /// them become separate paragraphs, so a paragraph always ends before the
    /// next block starts.
    fn flush_paragraph(&mut self, events: Vec<Event>, tag: &Tag) {
        let mut inline: Vec<Event> = Vec::new();
        let mut inline_depth = 0usize;
        let mut block_depth = 0usize;

        for event in events {
            if block_depth > 0 {
                match &event {
                    Event::Start(_) => block_depth += 1,
                    Event::End(_) => block_depth -= 1,
                    _ => {}
                }
                self.out.push(event);
                continue;
            }

            if inline_depth == 0 && event.is_block() {
                self.emit_paragraph(std::mem::take(&mut inline), tag);
                if matches!(event, Event::Start(_)) {
                    block_depth = 1;
                }
                self.out.push(event);
                continue;
            }

            match &event {
                Event::Start(_) => inline_depth += 1,
                Event::End(_) => inline_depth = inline_depth.saturating_sub(1),
                _ => {}
            }
            inline.push(event);
        }

        self.emit_paragraph(inline, tag);
    }

    fn emit_paragraph(&mut self, mut inline: Vec<Event>, tag: &Tag) {
        trim_inline(&mut inline);
        if inline.is_empty() {
            return;
        }
        self.out.push(Event::Start(tag.clone()));
        self.out.extend(inline);
        self.out.push(Event::End(tag.to_end()));
    }

    /// Close anything left open by an aborted parse.
    fn balance(&mut self) {
        let mut open = Vec::new();
        for event in &self.out {
            match event {
                Event::Start(tag) => open.push(tag.to_end()),
                Event::End(_) => {
                    open.pop();
                }
                _ => {}
            }
        }
        while let Some(end) = open.pop() {
            self.out.push(Event::End(end));
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    fn span_here(&self) -> Range<usize> {
        let pos = self.cursor.pos();
        pos..pos
    }

    fn error(&self, kind: ErrorKind, span: Range<usize>) -> Diagnostic {
        Diagnostic::error(kind, span, self.cursor.file())
    }

    fn warning(&self, kind: ErrorKind, span: Range<usize>) -> Diagnostic {
        Diagnostic::warning(kind, span, self.cursor.file())
    }

    /// Record a diagnostic and keep going.
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.state.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }
}

pub(crate) fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Letters, digits and `_`: template names, keywords and ids.
pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Strip leading whitespace from the first event and trailing whitespace
/// from the last, dropping text that becomes empty.
fn trim_inline(events: &mut Vec<Event>) {
    while let Some(Event::Text(text)) = events.first_mut() {
        let trimmed = text.trim_start();
        if trimmed.is_empty() {
            events.remove(0);
        } else {
            *text = trimmed.to_string();
            break;
        }
    }
    while let Some(Event::Text(text)) = events.last_mut() {
        let trimmed = text.trim_end();
        if trimmed.is_empty() {
            events.pop();
        } else {
            text.truncate(trimmed.len());
            break;
        }
    }
}

/// Plain text of an event run, used for ids and doc info values.
fn plain_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// The clock used with `--debug`, so output is reproducible.
fn fixed_clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 12, 20)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .unwrap_or_default()
}
