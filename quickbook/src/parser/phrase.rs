use std::collections::BTreeMap;

use crate::event::{Event, Format, Image, LinkKind, SourceMode, Tag, TagEnd};
use crate::parser::block::is_block_keyword;
use crate::parser::error::{ErrorKind, ParseResult};
use crate::parser::{Parser, is_blank, is_identifier_char};
use crate::template::args::scan_arguments;
use crate::template::MarkupRange;
use crate::version::Epoch;

/// Where a run of phrase markup stops, besides `]` and a blank line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhraseEnd {
    /// Only `]` and blank lines.
    Phrase,
    /// Also the start of block markup.
    Paragraph,
    /// Also a line starting with the next list marker.
    ListItem,
}

/// Delimiters of `*simple*` formatting.
const SIMPLE_DELIMITERS: &str = "*'_^-\"~/=";
/// Symbols of the bracketed `[* formatted]` form.
const FORMAT_SYMBOLS: &str = "*'_^-\"~";

fn is_graph(c: char) -> bool {
    !c.is_whitespace() && !c.is_control()
}

/// Two line endings, with only blanks between and before them.
pub(crate) fn at_eol_eol(rest: &str) -> bool {
    rest.trim_start_matches(is_blank)
        .strip_prefix('\n')
        .is_some_and(|after| after.trim_start_matches(is_blank).starts_with('\n'))
}

fn at_next_list_item(rest: &str) -> bool {
    rest.trim_start_matches(is_blank)
        .strip_prefix('\n')
        .map(|after| after.trim_start_matches(is_blank))
        .is_some_and(|line| {
            let mut chars = line.chars();
            matches!(chars.next(), Some('*' | '#')) && chars.next().is_some_and(is_blank)
        })
}

impl Parser<'_> {
    // -----------------------------------------------------------------------
    // Phrase loop
    // -----------------------------------------------------------------------

    pub(crate) fn at_phrase_end(&self, end: PhraseEnd) -> bool {
        let rest = self.cursor.rest();
        if rest.is_empty() || rest.starts_with(']') {
            return true;
        }
        if !self.state.no_eols && at_eol_eol(rest) {
            return true;
        }
        match end {
            PhraseEnd::Phrase => false,
            PhraseEnd::Paragraph => self.at_block_markup(),
            PhraseEnd::ListItem => at_next_list_item(rest),
        }
    }

    /// Parse phrase markup up to (not including) its terminator.
    pub(crate) fn phrase(&mut self, end: PhraseEnd) -> ParseResult<()> {
        while !self.at_phrase_end(end) {
            self.phrase_unit()?;
        }
        Ok(())
    }

    /// One piece of markup, or one literal character.
    pub(crate) fn phrase_unit(&mut self) -> ParseResult<()> {
        if !self.common()? {
            self.literal_char();
        }
        Ok(())
    }

    /// A `[` that is not markup: the bracket, its contents and the closing
    /// `]` (if any) are kept as text.
    fn unmatched_bracket(&mut self) -> ParseResult<()> {
        self.literal_char();
        self.phrase(PhraseEnd::Phrase)?;
        if self.cursor.eat_char(']') {
            self.text("]");
        }
        Ok(())
    }

    fn literal_char(&mut self) {
        let start = self.cursor.pos();
        let Some(c) = self.cursor.bump() else {
            return;
        };
        if c == '[' && !self.options.lenient {
            let diagnostic = self.error(
                ErrorKind::syntax("unmatched '[' is not markup"),
                start..start + 1,
            );
            self.report(diagnostic);
        }
        let mut buf = [0; 4];
        self.text(c.encode_utf8(&mut buf));
    }

    /// The ordered alternatives shared by every phrase context.
    pub(crate) fn common(&mut self) -> ParseResult<bool> {
        if self.macro_reference()? {
            return Ok(true);
        }
        match self.cursor.peek() {
            Some('[') => {
                if self.attempt(Self::comment)? || self.attempt(Self::phrase_markup)? {
                    return Ok(true);
                }
                self.unknown_template()?;
                self.unmatched_bracket()?;
                Ok(true)
            }
            Some('`') => {
                if self.attempt(Self::code_block)? {
                    return Ok(true);
                }
                self.attempt(Self::inline_code)
            }
            Some('\\') | Some('\'') => {
                if self.attempt(Self::escape)? {
                    return Ok(true);
                }
                self.attempt(Self::simple_format)
            }
            Some(c) if SIMPLE_DELIMITERS.contains(c) => self.attempt(Self::simple_format),
            _ => Ok(false),
        }
    }

    fn macro_reference(&mut self) -> ParseResult<bool> {
        let rest = self.cursor.rest();
        let Some(name) = self.state.match_macro(rest) else {
            return Ok(false);
        };
        if rest[name.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            return Ok(false);
        }
        let name = name.to_string();
        self.cursor.set_pos(self.cursor.pos() + name.len());
        let events = self.state.macros.get(&name).cloned().unwrap_or_default();
        for event in events {
            self.push(event);
        }
        Ok(true)
    }

    /// `[/ comment]`, with nested brackets.
    pub(crate) fn comment(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat("[/") {
            return Ok(false);
        }
        Ok(self.skip_balanced())
    }

    /// Skip up to and including the `]` closing an already opened bracket.
    pub(crate) fn skip_balanced(&mut self) -> bool {
        let mut depth = 0usize;
        while let Some(c) = self.cursor.bump() {
            match c {
                '[' => depth += 1,
                ']' if depth == 0 => return true,
                ']' => depth -= 1,
                _ => {}
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Code
    // -----------------------------------------------------------------------

    /// ` ``code`` ` or ` ```code``` `, copied verbatim.
    fn code_block(&mut self) -> ParseResult<bool> {
        let fence = self.cursor.eat_while(|c| c == '`');
        let width = fence.len();
        if !(2..=3).contains(&width) {
            return Ok(false);
        }
        let start = self.cursor.pos();
        let rest = self.cursor.rest();
        let closing = "`".repeat(width);
        let Some(offset) = rest.find(&closing) else {
            return Ok(false);
        };
        let code = rest[..offset].to_string();
        self.cursor.set_pos(start + offset);
        self.cursor.eat_while(|c| c == '`');
        let language = self.state.source_mode;
        self.push(Event::CodeBlock {
            language,
            text: code,
        });
        Ok(true)
    }

    /// `` `code` ``, which never spans a blank line.
    fn inline_code(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('`') {
            return Ok(false);
        }
        let start = self.cursor.pos();
        loop {
            let rest = self.cursor.rest();
            if rest.starts_with('`') {
                break;
            }
            if rest.is_empty() || at_eol_eol(rest) {
                return Ok(false);
            }
            self.cursor.bump();
        }
        let code = self.cursor.slice(start..self.cursor.pos()).to_string();
        self.cursor.eat_char('`');
        self.push(Event::Code(code));
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Escapes and simple formatting
    // -----------------------------------------------------------------------

    fn escape(&mut self) -> ParseResult<bool> {
        if self.cursor.eat("\\n") {
            self.push(Event::LineBreak);
            return Ok(true);
        }
        if self.cursor.eat("\\ ") {
            self.text(" ");
            return Ok(true);
        }
        if self.cursor.starts_with("\\u") {
            let digits = self.cursor.rest()[2..]
                .chars()
                .take_while(char::is_ascii_hexdigit)
                .take(4)
                .count();
            if digits > 0 {
                let from = self.cursor.pos() + 2;
                let hex = self.cursor.slice(from..from + digits).to_string();
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    self.cursor.set_pos(from + digits);
                    let mut buf = [0; 4];
                    self.text(c.encode_utf8(&mut buf));
                    return Ok(true);
                }
            }
        }
        if self.cursor.eat_char('\\') {
            return match self.cursor.peek() {
                Some(c) if c.is_ascii_punctuation() => {
                    self.cursor.bump();
                    let mut buf = [0; 4];
                    self.text(c.encode_utf8(&mut buf));
                    Ok(true)
                }
                _ => Ok(false),
            };
        }
        if self.cursor.eat("'''") {
            self.cursor.eat_char('\n');
            let start = self.cursor.pos();
            let Some(offset) = self.cursor.rest().find("'''") else {
                return Ok(false);
            };
            let raw = self.cursor.slice(start..start + offset).to_string();
            self.cursor.set_pos(start + offset + 3);
            self.push(Event::Raw(raw));
            return Ok(true);
        }
        Ok(false)
    }

    /// `*bold*`, `'italic'`, `_underline_` and friends.
    ///
    /// The content starts and ends with a non-space character, never runs
    /// past `[` or the end of the phrase, and the closing delimiter must be
    /// followed by whitespace, punctuation or the end of input.
    fn simple_format(&mut self) -> ParseResult<bool> {
        if self.cursor.prev().is_some_and(char::is_alphanumeric) {
            return Ok(false);
        }
        let Some(delimiter) = self.cursor.bump() else {
            return Ok(false);
        };
        let Some(format) = Format::from_symbol(delimiter) else {
            return Ok(false);
        };
        let start = self.cursor.pos();
        let closes = |rest: &str| {
            let mut chars = rest.chars();
            chars.next() == Some(delimiter)
                && chars
                    .next()
                    .is_none_or(|c| c.is_whitespace() || c.is_ascii_punctuation())
        };

        let Some(first) = self.cursor.bump() else {
            return Ok(false);
        };
        if !is_graph(first) {
            return Ok(false);
        }

        // A single character: `*c*`.
        if !closes(self.cursor.rest()) {
            loop {
                let rest = self.cursor.rest();
                let mut chars = rest.chars();
                let graph_then_delimiter = match (chars.next(), chars.next()) {
                    (Some(c), Some(d)) => is_graph(c) && d == delimiter,
                    _ => false,
                };
                if graph_then_delimiter
                    || rest.starts_with('[')
                    || self.at_phrase_end(PhraseEnd::Phrase)
                {
                    break;
                }
                self.cursor.bump();
            }
            match self.cursor.bump() {
                Some(last) if is_graph(last) => {}
                _ => return Ok(false),
            }
            if !closes(self.cursor.rest()) {
                return Ok(false);
            }
        }

        let content = self.cursor.slice(start..self.cursor.pos()).to_string();
        self.cursor.eat_char(delimiter);
        self.start(Tag::Formatted(format));
        self.text(&content);
        self.end(TagEnd::Formatted);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Bracket markup
    // -----------------------------------------------------------------------

    /// `[...]` inline markup. Alternatives are tried in order; each one
    /// consumes its closing `]`.
    fn phrase_markup(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('[') {
            return Ok(false);
        }
        let alternatives: [fn(&mut Self) -> ParseResult<bool>; 10] = [
            Self::callout_link,
            Self::cond_phrase,
            Self::image,
            Self::url,
            Self::link,
            Self::anchor,
            Self::source_mode,
            Self::formatted,
            Self::footnote,
            Self::call_template,
        ];
        for alternative in alternatives {
            if self.attempt(alternative)? {
                return Ok(true);
            }
        }
        self.attempt(Self::line_break)
    }

    fn close(&mut self) -> bool {
        self.cursor.eat_char(']')
    }

    /// Skip whitespace and comments.
    pub(crate) fn skip_space(&mut self) -> ParseResult<()> {
        loop {
            self.cursor.skip_space();
            if !self.cursor.starts_with("[/") || !self.attempt(Self::comment)? {
                return Ok(());
            }
        }
    }

    /// Not followed by an identifier character, then optional space.
    pub(crate) fn hard_space(&mut self) -> ParseResult<bool> {
        if self.cursor.peek().is_some_and(is_identifier_char) {
            return Ok(false);
        }
        self.skip_space()?;
        Ok(true)
    }

    fn callout_link(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat("[callout]") {
            return Ok(false);
        }
        let role = self.cursor.eat_while(|c| c != ' ' && c != ']');
        if !self.cursor.eat_char(' ') {
            return Ok(false);
        }
        let id = self.cursor.eat_while(|c| c != ']');
        let role = self.cursor.slice(role).to_string();
        let id = self.cursor.slice(id).to_string();
        if !self.close() {
            return Ok(false);
        }
        self.push(Event::Callout { role, id });
        Ok(true)
    }

    /// `[? macro phrase]`: the phrase is kept only if the macro is defined.
    fn cond_phrase(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('?') {
            return Ok(false);
        }
        self.cursor.skip_blanks();
        let name = self.cursor.eat_while(|c| !c.is_whitespace() && c != ']');
        if name.is_empty() {
            return Ok(false);
        }
        let defined = self
            .state
            .macros
            .contains_key(self.cursor.slice(name));
        let ((), content) = self.collect(|p| p.phrase(PhraseEnd::Phrase))?;
        if !self.close() {
            return Ok(false);
        }
        if defined {
            for event in content {
                self.push(event);
            }
        }
        Ok(true)
    }

    fn image(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('$') {
            return Ok(false);
        }
        self.cursor.skip_blanks();
        let image = match self.state.epoch {
            Epoch::V1_4 => {
                let start = self.cursor.pos();
                while !self.at_phrase_end(PhraseEnd::Phrase) {
                    self.cursor.bump();
                }
                Image {
                    file: self.cursor.slice(start..self.cursor.pos()).trim().to_string(),
                    attributes: BTreeMap::new(),
                }
            }
            Epoch::V1_5 => {
                let start = self.cursor.pos();
                while !self.cursor.starts_with("[") && !self.at_phrase_end(PhraseEnd::Phrase) {
                    self.cursor.bump();
                }
                let file = self
                    .cursor
                    .slice(start..self.cursor.pos())
                    .trim()
                    .to_string();
                if file.is_empty() {
                    return Ok(false);
                }
                let attributes = self.image_attributes()?;
                Image { file, attributes }
            }
        };
        if !self.close() {
            return Ok(false);
        }
        self.push(Event::Image(image));
        Ok(true)
    }

    /// `[key value]` pairs after an image file name. A repeated or missing
    /// key is reported and the attribute ignored.
    fn image_attributes(&mut self) -> ParseResult<BTreeMap<String, String>> {
        let mut attributes = BTreeMap::new();
        while self.cursor.peek() == Some('[') {
            let attribute_start = self.cursor.pos();
            self.cursor.bump();
            let key = self.cursor.eat_while(is_identifier_char);
            let key = self.cursor.slice(key).to_string();
            self.cursor.skip_space();
            let value = self.cursor.eat_while(|c| c != '[' && c != ']');
            let value = self.cursor.slice(value).trim_end().to_string();
            if !self.close() {
                self.cursor.set_pos(attribute_start);
                break;
            }
            if key.is_empty() {
                let diagnostic = self.warning(
                    ErrorKind::syntax("image attribute without a name"),
                    attribute_start..self.cursor.pos(),
                );
                self.report(diagnostic);
            } else if attributes.contains_key(&key) {
                let diagnostic = self.warning(
                    ErrorKind::syntax(format!("duplicate image attribute: {key}")),
                    attribute_start..self.cursor.pos(),
                );
                self.report(diagnostic);
            } else {
                attributes.insert(key, value);
            }
            self.skip_space()?;
        }
        Ok(attributes)
    }

    fn url(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('@') {
            return Ok(false);
        }
        self.link_body(LinkKind::Url)
    }

    fn link(&mut self) -> ParseResult<bool> {
        let Some((keyword, kind)) = LinkKind::KEYWORDS
            .iter()
            .find(|(keyword, _)| self.cursor.starts_with(keyword))
            .copied()
        else {
            return Ok(false);
        };
        self.cursor.eat(keyword);
        if !self.hard_space()? {
            return Ok(false);
        }
        self.link_body(kind)
    }

    /// Destination, then optional link text. Without text the destination
    /// doubles as the text.
    fn link_body(&mut self, kind: LinkKind) -> ParseResult<bool> {
        let dest = self.cursor.eat_while(|c| c != ']' && !c.is_whitespace());
        let dest = self.cursor.slice(dest).to_string();
        self.start(Tag::Link {
            kind,
            dest: dest.clone(),
        });
        if self.close() {
            self.text(&dest);
        } else {
            if !self.hard_space()? {
                return Ok(false);
            }
            let start = self.out.len();
            self.phrase(PhraseEnd::Phrase)?;
            if !self.close() {
                return Ok(false);
            }
            if self.out.len() == start {
                self.text(&dest);
            }
        }
        self.end(TagEnd::Link);
        Ok(true)
    }

    fn anchor(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat_char('#') {
            return Ok(false);
        }
        self.cursor.skip_blanks();
        let start = self.cursor.pos();
        while !self.at_phrase_end(PhraseEnd::Phrase) {
            self.cursor.bump();
        }
        let id = self.cursor.slice(start..self.cursor.pos()).trim().to_string();
        if !self.close() {
            return Ok(false);
        }
        self.push(Event::Anchor(id));
        Ok(true)
    }

    fn source_mode(&mut self) -> ParseResult<bool> {
        let Some(mode) = SourceMode::ALL
            .into_iter()
            .find(|mode| self.cursor.starts_with(mode.as_str()))
        else {
            return Ok(false);
        };
        self.cursor.eat(mode.as_str());
        if !self.close() {
            return Ok(false);
        }
        self.state.source_mode = mode;
        Ok(true)
    }

    /// `[* bold]`, `['italic]` and the other bracketed formats.
    fn formatted(&mut self) -> ParseResult<bool> {
        let Some(symbol) = self.cursor.peek().filter(|c| FORMAT_SYMBOLS.contains(*c)) else {
            return Ok(false);
        };
        let Some(format) = Format::from_symbol(symbol) else {
            return Ok(false);
        };
        self.cursor.bump();
        self.cursor.skip_blanks();
        self.start(Tag::Formatted(format));
        self.phrase(PhraseEnd::Phrase)?;
        if !self.close() {
            return Ok(false);
        }
        self.end(TagEnd::Formatted);
        Ok(true)
    }

    fn footnote(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat("footnote") {
            return Ok(false);
        }
        self.cursor.skip_blanks();
        let ((), content) = self.collect(|p| p.phrase(PhraseEnd::Phrase))?;
        if !self.close() {
            return Ok(false);
        }
        self.start(Tag::Footnote);
        self.flush_paragraph(content, &Tag::Paragraph);
        self.end(TagEnd::Footnote);
        Ok(true)
    }

    fn line_break(&mut self) -> ParseResult<bool> {
        if !self.cursor.eat("br") || !self.close() {
            return Ok(false);
        }
        self.push(Event::LineBreak);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Template calls
    // -----------------------------------------------------------------------

    /// The name of a template call: one punctuation character, or an
    /// identifier followed by a hard space.
    fn template_name(&mut self) -> ParseResult<Option<String>> {
        match self.cursor.peek() {
            Some(c) if c.is_ascii_punctuation() && c != '[' && c != ']' => {
                self.cursor.bump();
                Ok(Some(c.to_string()))
            }
            Some(c) if is_identifier_char(c) => {
                let name = self.cursor.eat_while(is_identifier_char);
                let name = self.cursor.slice(name).to_string();
                if !self.hard_space()? {
                    return Ok(None);
                }
                Ok(Some(name))
            }
            _ => Ok(None),
        }
    }

    fn call_template(&mut self) -> ParseResult<bool> {
        let call_start = self.cursor.pos().saturating_sub(1);
        let escape = self.cursor.eat_char('`');
        let Some(name) = self.template_name()? else {
            return Ok(false);
        };
        let Some(symbol) = self.state.templates.lookup(&name) else {
            return Ok(false);
        };

        let args_start = self.cursor.pos();
        let Some((close, ranges)) = scan_arguments(self.cursor.rest(), self.state.epoch) else {
            return Ok(false);
        };
        let text = self.cursor.text().clone();
        let file = self.cursor.file();
        let args = ranges
            .into_iter()
            .map(|r| MarkupRange::new(file, text.clone(), args_start + r.start..args_start + r.end))
            .collect();
        self.cursor.set_pos(args_start + close + 1);

        self.expand(symbol, args, escape, call_start..self.cursor.pos())?;
        Ok(true)
    }

    /// A `[` that matched no markup but looks like a template call. An
    /// undefined name is a hard error in strict mode; a defined one means the
    /// arguments did not scan. Otherwise the bracket is text and a warning is
    /// recorded.
    fn unknown_template(&mut self) -> ParseResult<()> {
        let bracket = self.cursor.pos();
        self.cursor.eat_char('[');
        self.cursor.eat_char('`');
        let start = self.cursor.pos();
        let name = self.cursor.eat_while(is_identifier_char);
        let name = self.cursor.slice(name).to_string();
        let followed_by_space = self
            .cursor
            .peek()
            .is_none_or(|c| !is_identifier_char(c));
        self.cursor.set_pos(bracket);

        if name.is_empty()
            || !followed_by_space
            || is_block_keyword(&name)
            || LinkKind::KEYWORDS.iter().any(|(k, _)| *k == name)
        {
            return Ok(());
        }

        let span = bracket..start + name.len();
        if self.state.templates.lookup(&name).is_some() {
            // Defined, so the call failed on its argument list.
            let kind = ErrorKind::syntax(format!(
                "unbalanced brackets in the arguments to template `{name}`"
            ));
            let diagnostic = if self.options.lenient {
                self.warning(kind, span)
            } else {
                self.error(kind, span)
            };
            self.report(diagnostic);
            return Ok(());
        }
        if self.options.lenient {
            let diagnostic = self.warning(ErrorKind::UnknownTemplate(name), span);
            self.report(diagnostic);
            Ok(())
        } else {
            Err(self.error(ErrorKind::UnknownTemplate(name), span))
        }
    }
}
