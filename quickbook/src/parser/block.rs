use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::event::{Admonition, Event, Tag, TagEnd};
use crate::include::snippet::{self, dedent};
use crate::include::{PathParameter, QuickbookPath, resolve};
use crate::parser::error::{ErrorKind, ParseResult};
use crate::parser::phrase::{PhraseEnd, at_eol_eol};
use crate::parser::state::{FileContext, OpenSection, make_id};
use crate::parser::{Parser, is_blank, is_identifier_char, plain_text, trim_inline};
use crate::source::Cursor;
use crate::template::{MarkupRange, TemplateBody, TemplateSymbol};

/// Keywords that open block markup, `[keyword ...]`.
const BLOCK_KEYWORDS: [&str; 24] = [
    "section",
    "endsect",
    "heading",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blurb",
    ":",
    "note",
    "tip",
    "important",
    "caution",
    "warning",
    "pre",
    "def",
    "template",
    "table",
    "variablelist",
    "include",
    "import",
    "xinclude",
];

pub(crate) fn is_block_keyword(name: &str) -> bool {
    BLOCK_KEYWORDS.contains(&name)
}

/// The block keyword at the start of `text`, if it is followed by a
/// non-identifier character.
fn keyword_at(text: &str) -> Option<&'static str> {
    BLOCK_KEYWORDS.into_iter().find(|keyword| {
        text.strip_prefix(keyword)
            .is_some_and(|after| !after.starts_with(is_identifier_char))
    })
}

/// Offset of the `]` closing a template body that starts at `text`.
/// Brackets nest; `\x` escapes and `'''` regions are skipped.
fn template_body_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"'''") {
            let close = text[i + 3..].find("'''")?;
            i += 3 + close + 3;
            continue;
        }
        match bytes[i] {
            b'\\' => {
                i += 1;
                if let Some(c) = text[i..].chars().next() {
                    i += c.len_utf8();
                }
                continue;
            }
            b'[' => depth += 1,
            b']' if depth == 0 => return Some(i),
            b']' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}

struct ListEntry {
    indent: usize,
    ordered: bool,
    content: Vec<Event>,
    span: Range<usize>,
}

impl Parser<'_> {
    // -----------------------------------------------------------------------
    // Block loop
    // -----------------------------------------------------------------------

    /// Parse blocks until the end of the current cursor.
    pub(crate) fn blocks(&mut self) -> ParseResult<()> {
        loop {
            self.skip_blank_lines();
            if self.cursor.at_end() {
                return Ok(());
            }

            if self.cursor.peek() == Some(']') {
                self.stray_bracket()?;
                continue;
            }
            if self.attempt(Self::block_comment)? {
                continue;
            }
            if self.cursor.peek() == Some('[') && self.attempt(Self::block_markup)? {
                continue;
            }
            if self.cursor.at_line_start()
                && (self.attempt(Self::list)?
                    || self.attempt(Self::code)?
                    || self.attempt(Self::horizontal_rule)?)
            {
                continue;
            }
            self.paragraph()?;
        }
    }

    fn skip_blank_lines(&mut self) {
        loop {
            let rest = self.cursor.rest();
            let after = rest.trim_start_matches(is_blank);
            let blanks = rest.len() - after.len();
            if after.starts_with('\n') {
                self.cursor.set_pos(self.cursor.pos() + blanks + 1);
            } else {
                if after.is_empty() {
                    self.cursor.set_pos(self.cursor.pos() + blanks);
                }
                return;
            }
        }
    }

    /// A `]` with nothing to close. Reported, then kept as text.
    fn stray_bracket(&mut self) -> ParseResult<()> {
        let pos = self.cursor.pos();
        let diagnostic = self.error(ErrorKind::syntax("mismatched ']'"), pos..pos + 1);
        self.report(diagnostic);

        self.cursor.bump();
        self.paragraph_after(|p| {
            p.text("]");
            Ok(())
        })
    }

    /// A comment on a line of its own.
    fn block_comment(&mut self) -> ParseResult<bool> {
        if !self.comment()? {
            return Ok(false);
        }
        self.cursor.skip_blanks();
        Ok(self.cursor.at_end() || self.cursor.eat_char('\n'))
    }

    pub(crate) fn at_block_markup(&self) -> bool {
        let Some(after) = self.cursor.rest().strip_prefix('[') else {
            return false;
        };
        keyword_at(after.trim_start()).is_some()
    }

    fn paragraph(&mut self) -> ParseResult<()> {
        self.paragraph_after(Self::phrase_unit)
    }

    /// A paragraph whose first piece is produced by `lead`.
    fn paragraph_after(
        &mut self,
        lead: impl FnOnce(&mut Self) -> ParseResult<()>,
    ) -> ParseResult<()> {
        let ((), content) = self.collect(|p| {
            lead(p)?;
            p.phrase(PhraseEnd::Paragraph)
        })?;
        self.flush_paragraph(content, &Tag::Paragraph);
        Ok(())
    }

    /// Blank-line separated paragraphs up to the closing `]`.
    pub(crate) fn inside_paragraph(&mut self) -> ParseResult<()> {
        loop {
            let ((), content) = self.collect(|p| p.phrase(PhraseEnd::Phrase))?;
            self.flush_paragraph(content, &Tag::Paragraph);

            if !at_eol_eol(self.cursor.rest()) {
                return Ok(());
            }
            self.cursor.skip_space();
        }
    }

    // -----------------------------------------------------------------------
    // Block markup
    // -----------------------------------------------------------------------

    fn block_markup(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('[') {
            return Ok(false);
        }
        let open = self.cursor.pos() - 1;
        self.cursor.skip_space();
        let Some(keyword) = keyword_at(self.cursor.rest()) else {
            return Ok(false);
        };
        self.cursor.eat(keyword);

        let matched = match keyword {
            "section" => self.begin_section()?,
            "endsect" => self.end_section(open)?,
            "heading" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.heading(keyword)?,
            "blurb" => self.boxed(Tag::Blurb)?,
            ":" => self.boxed(Tag::Blockquote)?,
            "pre" => self.preformatted()?,
            "def" => self.define_macro()?,
            "template" => self.define_template(open)?,
            "table" => self.table()?,
            "variablelist" => self.variable_list()?,
            "include" => self.include()?,
            "import" => self.import()?,
            "xinclude" => self.xinclude()?,
            admonition => match Admonition::from_keyword(admonition) {
                Some(kind) => self.boxed(Tag::Admonition(kind))?,
                None => false,
            },
        };
        if !matched {
            return Ok(false);
        }

        self.skip_space()?;
        if !self.cursor.eat_char(']') {
            let diagnostic = self.error(
                ErrorKind::syntax(format!("expected ']' to close [{keyword}")),
                open..self.cursor.pos(),
            );
            self.report(diagnostic);
        }
        self.cursor.skip_blanks();
        self.cursor.eat_char('\n');
        Ok(true)
    }

    /// `:id` after a keyword.
    fn element_id(&mut self) -> Option<String> {
        if !self.cursor.eat_char(':') {
            return None;
        }
        let id = self
            .cursor
            .eat_while(|c| is_identifier_char(c) || c == '-' || c == '.');
        let id = self.cursor.slice(id).to_string();
        (!id.is_empty()).then_some(id)
    }

    /// A title phrase, trimmed.
    fn title_phrase(&mut self) -> ParseResult<Vec<Event>> {
        self.skip_space()?;
        let ((), mut title) = self.collect(|p| p.phrase(PhraseEnd::Phrase))?;
        trim_inline(&mut title);
        Ok(title)
    }

    /// Raw title text running to the end of the line or the first bracket.
    fn line_title(&mut self) -> String {
        self.cursor.skip_blanks();
        let title = self.cursor.eat_while(|c| c != '\n' && c != '[' && c != ']');
        self.cursor.slice(title).trim().to_string()
    }

    fn begin_section(&mut self) -> ParseResult<bool> {
        let explicit_id = self.element_id();
        let title = self.title_phrase()?;
        let id = explicit_id.unwrap_or_else(|| make_id(&plain_text(&title)));
        let qualified_id = self.state.qualify(&id);
        let level = self.state.sections.len() + 1;

        tracing::debug!(id = %qualified_id, level, "begin section");
        self.state.sections.push(OpenSection {
            id,
            qualified_id: qualified_id.clone(),
            file: self.state.file.id,
        });
        self.start(Tag::Section {
            id: qualified_id,
            level,
        });
        self.start(Tag::Title);
        self.out.extend(title);
        self.end(TagEnd::Title);
        Ok(true)
    }

    fn end_section(&mut self, open: usize) -> ParseResult<bool> {
        if self.state.local_depth() == 0 {
            let message = if self.state.sections.is_empty() {
                "no section is open"
            } else {
                "the open section was started in another file"
            };
            return Err(self.error(
                ErrorKind::SectionMismatch(message.to_string()),
                open..self.cursor.pos(),
            ));
        }
        if let Some(section) = self.state.sections.pop() {
            tracing::debug!(id = %section.qualified_id, "end section");
        }
        self.end(TagEnd::Section);
        Ok(true)
    }

    /// Close sections the current file left open, with a warning.
    pub(crate) fn close_open_sections(&mut self) {
        let open = self.state.local_depth();
        if open == 0 {
            return;
        }
        let diagnostic = self.warning(ErrorKind::MissingEndSection(open), self.span_here());
        self.report(diagnostic);
        for _ in 0..open {
            self.state.sections.pop();
            self.end(TagEnd::Section);
        }
    }

    fn heading(&mut self, keyword: &str) -> ParseResult<bool> {
        let level = match keyword.strip_prefix('h').and_then(|n| n.parse::<u8>().ok()) {
            Some(level) => level,
            None => (self.state.sections.len() + 2).min(6) as u8,
        };
        let explicit_id = self.element_id();
        let title = self.title_phrase()?;
        let id = explicit_id.unwrap_or_else(|| make_id(&plain_text(&title)));
        let id = self.state.qualify(&id);

        self.start(Tag::Heading { level, id });
        self.out.extend(title);
        self.end(TagEnd::Heading);
        Ok(true)
    }

    /// Blurbs, block quotes and admonitions.
    fn boxed(&mut self, tag: Tag) -> ParseResult<bool> {
        self.skip_space()?;
        let end = tag.to_end();
        self.start(tag);
        self.inside_paragraph()?;
        self.end(end);
        Ok(true)
    }

    fn preformatted(&mut self) -> ParseResult<bool> {
        self.cursor.skip_blanks();
        self.cursor.eat_char('\n');

        let saved = std::mem::replace(&mut self.state.no_eols, true);
        self.start(Tag::Preformatted);
        let result = self.phrase(PhraseEnd::Phrase);
        self.state.no_eols = saved;
        result?;
        self.end(TagEnd::Preformatted);
        Ok(true)
    }

    fn define_macro(&mut self) -> ParseResult<bool> {
        self.skip_space()?;
        let name = self.cursor.eat_while(|c| !c.is_whitespace() && c != ']');
        if name.is_empty() {
            return Ok(false);
        }
        let name = self.cursor.slice(name).to_string();
        self.cursor.skip_blanks();

        let ((), mut value) = self.collect(|p| p.phrase(PhraseEnd::Phrase))?;
        trim_inline(&mut value);

        tracing::trace!(name = %name, "define macro");
        self.state.macros.insert(name, value);
        Ok(true)
    }

    /// `[template name[a b] body]`.
    fn define_template(&mut self, open: usize) -> ParseResult<bool> {
        self.skip_space()?;
        let name = match self.cursor.peek() {
            Some(c) if c.is_ascii_punctuation() && c != '[' && c != ']' => {
                self.cursor.bump();
                c.to_string()
            }
            Some(c) if is_identifier_char(c) => {
                let name = self.cursor.eat_while(is_identifier_char);
                self.cursor.slice(name).to_string()
            }
            _ => return Ok(false),
        };

        let mut params = Vec::new();
        if self.cursor.eat_char('[') {
            loop {
                self.cursor.skip_space();
                if self.cursor.eat_char(']') {
                    break;
                }
                let param = self.cursor.eat_while(|c| !c.is_whitespace() && c != ']');
                if param.is_empty() {
                    return Ok(false);
                }
                params.push(self.cursor.slice(param).to_string());
            }
        }

        let body_start = self.cursor.pos();
        self.cursor.skip_blanks();
        let body_start = if self.cursor.peek() == Some('\n') {
            body_start
        } else {
            self.cursor.pos()
        };
        let Some(length) = template_body_end(self.cursor.slice(body_start..self.cursor.end()))
        else {
            return Ok(false);
        };
        let body_end = body_start + length;
        self.cursor.set_pos(body_end);

        let file = self.cursor.file();
        let body = MarkupRange::new(file, self.cursor.text().clone(), body_start..body_end);
        let symbol = TemplateSymbol {
            name,
            params,
            body: TemplateBody::Markup(body),
            file,
            span: open..body_end,
            scope: self.state.templates.current(),
        };
        tracing::trace!(name = %symbol.name, params = symbol.params.len(), "define template");
        if let Err(kind) = self.state.templates.define(symbol) {
            return Err(self.error(kind, open..body_end));
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Tables and variable lists
    // -----------------------------------------------------------------------

    fn table(&mut self) -> ParseResult<bool> {
        let explicit_id = self.element_id();
        let title = self.line_title();

        let mut rows = Vec::new();
        let mut columns = 0;
        loop {
            self.skip_space()?;
            if self.cursor.peek() != Some('[') {
                break;
            }
            let (matched, row) = self.collect(|p| p.attempt(Self::table_row))?;
            if !matched {
                break;
            }
            columns = columns.max(count_cells(&row));
            rows.push(row);
        }

        let titled = !title.is_empty();
        let id = match explicit_id {
            Some(id) => Some(self.state.qualify(&id)),
            None if titled => Some(self.state.qualify(&make_id(&title))),
            None => None,
        };

        self.start(Tag::Table {
            id,
            columns,
            titled,
        });
        if titled {
            self.start(Tag::Title);
            self.text(&title);
            self.end(TagEnd::Title);
        }
        let mut rows = rows.into_iter();
        if rows.len() > 1 {
            if let Some(head) = rows.next() {
                self.start(Tag::TableHead);
                self.out.extend(head);
                self.end(TagEnd::TableHead);
            }
        }
        self.start(Tag::TableBody);
        for row in rows {
            self.out.extend(row);
        }
        self.end(TagEnd::TableBody);
        self.end(TagEnd::Table);
        Ok(true)
    }

    /// `[[cell][cell]...]`
    fn table_row(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('[') {
            return Ok(false);
        }
        self.start(Tag::TableRow);
        loop {
            self.skip_space()?;
            if self.cursor.eat_char(']') {
                break;
            }
            if !self.cursor.eat_char('[') {
                return Ok(false);
            }
            self.start(Tag::TableCell);
            self.skip_space()?;
            self.inside_paragraph()?;
            if !self.cursor.eat_char(']') {
                return Ok(false);
            }
            self.end(TagEnd::TableCell);
        }
        self.end(TagEnd::TableRow);
        Ok(true)
    }

    fn variable_list(&mut self) -> ParseResult<bool> {
        let title = self.line_title();
        self.start(Tag::VariableList);
        if !title.is_empty() {
            self.start(Tag::Title);
            self.text(&title);
            self.end(TagEnd::Title);
        }
        loop {
            self.skip_space()?;
            if self.cursor.peek() != Some('[') || !self.attempt(Self::varlist_entry)? {
                break;
            }
        }
        self.end(TagEnd::VariableList);
        Ok(true)
    }

    /// `[[term][definition]...]`
    fn varlist_entry(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('[') {
            return Ok(false);
        }
        self.skip_space()?;
        if !self.cursor.eat_char('[') {
            return Ok(false);
        }
        self.start(Tag::VarListEntry);
        self.start(Tag::VarListTerm);
        let term = self.title_phrase()?;
        self.out.extend(term);
        if !self.cursor.eat_char(']') {
            return Ok(false);
        }
        self.end(TagEnd::VarListTerm);

        self.start(Tag::VarListItem);
        loop {
            self.skip_space()?;
            if self.cursor.eat_char(']') {
                break;
            }
            if !self.cursor.eat_char('[') {
                return Ok(false);
            }
            self.skip_space()?;
            self.inside_paragraph()?;
            if !self.cursor.eat_char(']') {
                return Ok(false);
            }
        }
        self.end(TagEnd::VarListItem);
        self.end(TagEnd::VarListEntry);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Includes
    // -----------------------------------------------------------------------

    /// The path argument of `include`, `import` and `xinclude`.
    fn path_parameter(&mut self) -> ParseResult<Option<(PathParameter, Range<usize>)>> {
        self.skip_space()?;
        let range = self.cursor.eat_while(|c| c != ']');
        let raw = self.cursor.slice(range.clone()).trim().to_string();
        if raw.is_empty() {
            return Ok(None);
        }
        match PathParameter::parse(&raw) {
            Ok(param) => Ok(Some((param, range))),
            Err(source) => Err(self.error(
                ErrorKind::InvalidGlob {
                    pattern: raw,
                    source,
                },
                range,
            )),
        }
    }

    fn resolve_path(
        &self,
        param: &PathParameter,
        span: &Range<usize>,
    ) -> ParseResult<Vec<QuickbookPath>> {
        let dir = self
            .state
            .file
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        match resolve(param, &dir, &self.options.include_paths, self.loader) {
            Ok(paths) => Ok(paths.into_iter().collect()),
            Err(kind) => Err(self.error(kind, span.clone())),
        }
    }

    fn load(&self, path: &Path, span: &Range<usize>) -> ParseResult<String> {
        self.loader.load(path).map_err(|e| {
            self.error(
                ErrorKind::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                },
                span.clone(),
            )
        })
    }

    fn include(&mut self) -> ParseResult<bool> {
        let doc_id = self.element_id();
        let Some((param, span)) = self.path_parameter()? else {
            return Ok(false);
        };
        for path in self.resolve_path(&param, &span)? {
            self.include_file(&path.file_path, &span, doc_id.clone())?;
        }
        Ok(true)
    }

    /// Parse another file's blocks in place. The file gets its own template
    /// scope and must close the sections it opens; its doc info is skipped.
    /// A file that is already open further up the include chain is an error.
    fn include_file(
        &mut self,
        path: &Path,
        span: &Range<usize>,
        doc_id: Option<String>,
    ) -> ParseResult<()> {
        if self.state.open_files.iter().any(|open| open == path) {
            return Err(self.error(
                ErrorKind::RecursiveInclude(path.display().to_string()),
                span.clone(),
            ));
        }
        let source = self.load(path, span)?;
        let file = self.sources.add(path.display().to_string(), &source);
        let text = self.sources.source(file).unwrap_or_else(|| "".into());
        tracing::debug!(path = %path.display(), "including file");

        let saved_file = std::mem::replace(
            &mut self.state.file,
            FileContext {
                id: file,
                path: PathBuf::from(path),
                section_base: self.state.sections.len(),
            },
        );
        let saved_doc_id = doc_id.map(|id| std::mem::replace(&mut self.state.doc_id, id));
        let saved_mode = self.state.source_mode;
        let caller_scope = self.state.templates.current();
        let arena_len = self.state.templates.len();
        self.state.templates.push(caller_scope);
        self.state.open_files.push(path.to_path_buf());

        let result = self.with_cursor(Cursor::new(file, text), |p| {
            p.skip_doc_info()?;
            p.blocks()?;
            p.close_open_sections();
            Ok(())
        });

        self.state.open_files.pop();
        self.state.templates.truncate(arena_len, caller_scope);
        self.state.source_mode = saved_mode;
        if let Some(id) = saved_doc_id {
            self.state.doc_id = id;
        }
        self.state.file = saved_file;
        result.map(|_| ())
    }

    /// `[import file.cpp]`: each marked snippet becomes a template.
    fn import(&mut self) -> ParseResult<bool> {
        let Some((param, span)) = self.path_parameter()? else {
            return Ok(false);
        };
        for path in self.resolve_path(&param, &span)? {
            let source = self.load(&path.file_path, &span)?;
            let snippets = snippet::extract(&path.file_path, &source);
            tracing::debug!(
                path = %path.file_path.display(),
                snippets = snippets.len(),
                "importing code snippets"
            );
            for snippet in snippets {
                let symbol = TemplateSymbol {
                    name: snippet.id,
                    params: Vec::new(),
                    body: TemplateBody::Code {
                        language: snippet.language,
                        code: snippet.code,
                    },
                    file: self.cursor.file(),
                    span: span.clone(),
                    scope: self.state.templates.current(),
                };
                if let Err(kind) = self.state.templates.define(symbol) {
                    return Err(self.error(kind, span));
                }
            }
        }
        Ok(true)
    }

    fn xinclude(&mut self) -> ParseResult<bool> {
        let Some((param, _)) = self.path_parameter()? else {
            return Ok(false);
        };
        self.push(Event::XInclude(param.value));
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Line based blocks
    // -----------------------------------------------------------------------

    /// Indented lines, with blank lines allowed between them.
    fn code(&mut self) -> ParseResult<bool> {
        let text = self.cursor.text().clone();
        let mut lines: Vec<Range<usize>> = Vec::new();
        let mut kept = 0;
        let mut end = self.cursor.pos();

        while !self.cursor.at_end() {
            let line_start = self.cursor.pos();
            let line_len = self.cursor.rest().find('\n').unwrap_or(self.cursor.rest().len());
            let line = &text[line_start..line_start + line_len];
            let blank = line.trim().is_empty();
            if !blank && !line.starts_with(is_blank) {
                break;
            }
            if blank && lines.is_empty() {
                break;
            }
            lines.push(line_start..line_start + line_len);
            self.cursor.set_pos(line_start + line_len);
            self.cursor.eat_char('\n');
            if !blank {
                kept = lines.len();
                end = self.cursor.pos();
            }
        }

        if kept == 0 {
            return Ok(false);
        }
        self.cursor.set_pos(end);
        let lines: Vec<&str> = lines[..kept].iter().map(|r| &text[r.clone()]).collect();
        let code = dedent(&lines);
        let language = self.state.source_mode;
        self.push(Event::CodeBlock {
            language,
            text: code,
        });
        Ok(true)
    }

    fn horizontal_rule(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat("----") {
            return Ok(false);
        }
        self.cursor.eat_while(|c| c != '\n');
        self.cursor.eat_char('\n');
        self.push(Event::Rule);
        Ok(true)
    }

    /// `*` and `#` items; indentation decides nesting.
    fn list(&mut self) -> ParseResult<bool> {
        let mut items = Vec::new();
        loop {
            let line_start = self.cursor.pos();
            let indent = self.cursor.eat_while(is_blank).len();
            let ordered = match self.cursor.peek() {
                Some('*') => false,
                Some('#') => true,
                _ => break,
            };
            if !self.cursor.peek_nth(1).is_some_and(is_blank) {
                self.cursor.set_pos(line_start);
                break;
            }
            self.cursor.bump();
            self.cursor.skip_blanks();

            let ((), content) = self.collect(|p| p.phrase(PhraseEnd::ListItem))?;
            items.push(ListEntry {
                indent,
                ordered,
                content,
                span: line_start..self.cursor.pos(),
            });

            if self.at_phrase_end(PhraseEnd::Phrase) {
                break;
            }
            // The phrase stopped at the next item's line.
            self.cursor.skip_blanks();
            self.cursor.eat_char('\n');
        }

        if items.is_empty() {
            return Ok(false);
        }
        self.build_list(items);
        Ok(true)
    }

    fn build_list(&mut self, items: Vec<ListEntry>) {
        let mut levels: Vec<(usize, bool)> = Vec::new();

        for item in items {
            match levels.last().copied() {
                Some((indent, _)) if item.indent > indent => {
                    self.start(Tag::List {
                        ordered: item.ordered,
                    });
                    levels.push((item.indent, item.ordered));
                }
                Some(_) => {
                    self.end(TagEnd::ListItem);
                    while levels.len() > 1 && levels.last().is_some_and(|(i, _)| item.indent < *i) {
                        levels.pop();
                        self.end(TagEnd::List);
                        self.end(TagEnd::ListItem);
                    }
                    if levels.last().is_some_and(|(_, ordered)| *ordered != item.ordered) {
                        let diagnostic = self.error(
                            ErrorKind::syntax("mixing ordered and unordered list items"),
                            item.span.clone(),
                        );
                        self.report(diagnostic);
                    }
                }
                None => {
                    self.start(Tag::List {
                        ordered: item.ordered,
                    });
                    levels.push((item.indent, item.ordered));
                }
            }
            self.start(Tag::ListItem);
            self.flush_paragraph(item.content, &Tag::SimplePara);
        }

        if !levels.is_empty() {
            self.end(TagEnd::ListItem);
        }
        while levels.pop().is_some() {
            self.end(TagEnd::List);
            if !levels.is_empty() {
                self.end(TagEnd::ListItem);
            }
        }
    }
}

/// Cells directly inside a row.
fn count_cells(row: &[Event]) -> usize {
    let mut depth = 0usize;
    let mut cells = 0;
    for event in row {
        match event {
            Event::Start(tag) => {
                if depth == 1 && *tag == Tag::TableCell {
                    cells += 1;
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    cells
}
