use std::ops::Range;

use crate::event::doc_info::DOC_TYPES;
use crate::event::{Author, Copyright, DocInfo, Event, SourceMode, Tag, TagEnd};
use crate::parser::error::{ErrorKind, ParseResult};
use crate::parser::state::make_id;
use crate::parser::Parser;
use crate::version::QuickbookVersion;

/// Doc info as written, before defaults are applied.
struct ParsedDocInfo {
    info: DocInfo,
    version: Option<(QuickbookVersion, Range<usize>)>,
    source_mode: Option<SourceMode>,
}

/// Collapse runs of whitespace to single spaces.
fn collapse(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `2005, 2006-2008 Jane Doe`: leading year tokens, then the holder.
fn parse_copyright(value: &str) -> Copyright {
    let mut years = Vec::new();
    let mut rest = value.trim();
    loop {
        let token_end = rest
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(rest.len());
        let token = &rest[..token_end];
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit() || c == '-') {
            break;
        }
        years.push(token.to_string());
        rest = rest[token_end..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }
    Copyright {
        years,
        holder: collapse(rest),
    }
}

/// `[Surname, First] [Other, Name]`
fn parse_authors(value: &str) -> Vec<Author> {
    let mut authors = Vec::new();
    let mut rest = value;
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']') else {
            break;
        };
        let inner = &rest[open + 1..open + close];
        let (surname, firstname) = inner.split_once(',').unwrap_or((inner, ""));
        authors.push(Author {
            firstname: collapse(firstname),
            surname: collapse(surname),
        });
        rest = &rest[open + close + 1..];
    }
    authors
}

impl Parser<'_> {
    /// The whole document: doc info, then blocks.
    pub(crate) fn document(&mut self) -> ParseResult<()> {
        let info = self.doc_info()?;
        self.define_builtin_macros();

        let has_info = info.is_some();
        if let Some(info) = info {
            self.start(Tag::Document(Box::new(info)));
        }
        self.blocks()?;
        self.close_open_sections();
        if has_info {
            self.end(TagEnd::Document);
        }
        Ok(())
    }

    /// Parse and apply the main file's doc info, fixing the version.
    fn doc_info(&mut self) -> ParseResult<Option<DocInfo>> {
        let checkpoint = self.checkpoint();
        let Some(parsed) = self.parse_doc_info()? else {
            self.rollback(checkpoint);
            tracing::debug!(version = %self.state.version, "no doc info");
            return Ok(None);
        };

        let version = match parsed.version {
            Some((version, span)) if version > QuickbookVersion::LATEST => {
                let diagnostic = self.error(
                    ErrorKind::syntax(format!(
                        "quickbook version {version} is newer than this compiler supports ({})",
                        QuickbookVersion::LATEST
                    )),
                    span,
                );
                self.report(diagnostic);
                QuickbookVersion::LATEST
            }
            Some((version, _)) => version,
            None => QuickbookVersion::IMPLICIT,
        };
        self.state.set_version(version);
        if let Some(mode) = parsed.source_mode {
            self.state.source_mode = mode;
        }

        let mut info = parsed.info;
        if info.id.is_empty() {
            info.id = make_id(&info.title);
        }
        if info.last_revision.is_empty() {
            info.last_revision = self
                .now
                .format("$Date: %Y/%m/%d %H:%M:%S $")
                .to_string();
        }
        self.state.doc_id = info.id.clone();

        tracing::debug!(
            doc_type = %info.doc_type,
            id = %info.id,
            version = %version,
            "doc info"
        );
        Ok(Some(info))
    }

    /// Included files may carry doc info of their own; it is parsed and
    /// thrown away.
    pub(crate) fn skip_doc_info(&mut self) -> ParseResult<()> {
        let checkpoint = self.checkpoint();
        if self.parse_doc_info()?.is_none() {
            self.rollback(checkpoint);
        }
        Ok(())
    }

    fn parse_doc_info(&mut self) -> ParseResult<Option<ParsedDocInfo>> {
        self.skip_space()?;
        let open = self.cursor.pos();
        if !self.cursor.eat_char('[') {
            return Ok(None);
        }
        self.cursor.skip_space();
        let doc_type = self.cursor.eat_while(|c| c.is_ascii_alphabetic());
        let doc_type = self.cursor.slice(doc_type).to_string();
        if !DOC_TYPES.contains(&doc_type.as_str()) {
            return Ok(None);
        }
        if self.cursor.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Ok(None);
        }
        self.cursor.skip_blanks();
        let title = self.cursor.eat_while(|c| c != '\n' && c != '[' && c != ']');
        let title = collapse(self.cursor.slice(title));

        let mut parsed = ParsedDocInfo {
            info: DocInfo {
                doc_type,
                title,
                ..DocInfo::default()
            },
            version: None,
            source_mode: None,
        };

        loop {
            self.skip_space()?;
            if self.cursor.eat_char(']') || self.cursor.at_end() {
                break;
            }
            let attribute_start = self.cursor.pos();
            if !self.cursor.eat_char('[') {
                let diagnostic = self.error(
                    ErrorKind::syntax("expected a doc info attribute"),
                    attribute_start..attribute_start + 1,
                );
                self.report(diagnostic);
                self.skip_balanced();
                break;
            }
            let name = self.cursor.eat_while(|c| !c.is_whitespace() && c != '[' && c != ']');
            let name = self.cursor.slice(name).to_string();
            self.cursor.skip_space();
            let value_start = self.cursor.pos();
            if !self.skip_balanced() {
                let diagnostic = self.error(
                    ErrorKind::syntax(format!("unclosed doc info attribute `{name}`")),
                    attribute_start..self.cursor.pos(),
                );
                self.report(diagnostic);
                break;
            }
            let value = self.cursor.slice(value_start..self.cursor.pos() - 1).to_string();
            self.doc_attribute(
                &mut parsed,
                &name,
                &value,
                attribute_start..self.cursor.pos(),
            );
        }

        tracing::trace!(span = ?(open..self.cursor.pos()), "parsed doc info");
        Ok(Some(parsed))
    }

    fn doc_attribute(
        &mut self,
        parsed: &mut ParsedDocInfo,
        name: &str,
        value: &str,
        span: Range<usize>,
    ) {
        let info = &mut parsed.info;
        match name {
            "quickbook" => match QuickbookVersion::parse(value) {
                Some(version) => parsed.version = Some((version, span)),
                None => {
                    let diagnostic = self.error(
                        ErrorKind::syntax(format!("invalid quickbook version `{}`", value.trim())),
                        span,
                    );
                    self.report(diagnostic);
                }
            },
            "version" => info.version = Some(collapse(value)),
            "id" => info.id = value.trim().to_string(),
            "dirname" => info.dirname = Some(value.trim().to_string()),
            "copyright" => info.copyrights.push(parse_copyright(value)),
            "purpose" => info.purpose = Some(collapse(value)),
            "category" => info.categories.push(collapse(value)),
            "authors" => info.authors.extend(parse_authors(value)),
            "license" => info.license = Some(collapse(value)),
            "last-revision" => info.last_revision = collapse(value),
            "source-mode" => match SourceMode::from_name(value.trim()) {
                Some(mode) => parsed.source_mode = Some(mode),
                None => {
                    let diagnostic = self.error(
                        ErrorKind::syntax(format!("unknown source mode `{}`", value.trim())),
                        span,
                    );
                    self.report(diagnostic);
                }
            },
            _ => {
                let diagnostic = self.error(
                    ErrorKind::syntax(format!("unknown doc info attribute `{name}`")),
                    span,
                );
                self.report(diagnostic);
            }
        }
    }

    /// `__DATE__`, `__TIME__` and `__FILENAME__`.
    fn define_builtin_macros(&mut self) {
        let builtins = [
            ("__DATE__", self.now.format("%Y-%b-%d").to_string()),
            ("__TIME__", self.now.format("%I:%M:%S %p").to_string()),
            ("__FILENAME__", self.state.file.path.display().to_string()),
        ];
        for (name, value) in builtins {
            self.state
                .macros
                .insert(name.to_string(), vec![Event::Text(value)]);
        }
    }
}
