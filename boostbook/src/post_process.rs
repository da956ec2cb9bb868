//! Pretty printer for the encoder's XML.
//!
//! Block elements go on their own lines, indented by nesting depth. Text and
//! inline elements flow inside them and are wrapped at whitespace once a line
//! gets longer than the configured width. Verbatim elements such as
//! `programlisting` are copied byte for byte.

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostProcessError {
    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("closing tag </{found}> does not match <{expected}>")]
    Mismatched { expected: String, found: String },
    #[error("closing tag </{0}> has no opening tag")]
    UnexpectedClose(String),
    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostProcessOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Wrap text lines longer than this.
    pub linewidth: usize,
}

impl Default for PostProcessOptions {
    fn default() -> Self {
        PostProcessOptions {
            indent: 2,
            linewidth: 80,
        }
    }
}

const BLOCK_ELEMENTS: &[&str] = &[
    "appendix",
    "article",
    "author",
    "blockquote",
    "book",
    "bridgehead",
    "caution",
    "chapter",
    "copyright",
    "entry",
    "important",
    "informaltable",
    "itemizedlist",
    "legalnotice",
    "library",
    "listitem",
    "note",
    "orderedlist",
    "para",
    "part",
    "preface",
    "programlisting",
    "qandadiv",
    "qandaset",
    "reference",
    "row",
    "section",
    "set",
    "sidebar",
    "simpara",
    "table",
    "tbody",
    "term",
    "tgroup",
    "thead",
    "tip",
    "title",
    "variablelist",
    "varlistentry",
    "warning",
];

const VERBATIM_ELEMENTS: &[&str] = &["programlisting", "literallayout", "screen"];

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
        || name.ends_with("info")
        || name.ends_with("purpose")
        || name.ends_with("category")
        || name == "xi:include"
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Open { name: String, raw: String },
    Empty { name: String, raw: String },
    Close { name: String, raw: String },
    /// Declarations, processing instructions and comments.
    Other(String),
    Text(String),
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Reader over the encoder's output. The printer checks nesting itself.
fn xml_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader.config_mut().allow_unmatched_ends = true;
    reader
}

/// Split `xml` into tokens, each carrying its markup as written.
fn tokenize(xml: &str) -> Result<Vec<Token>, PostProcessError> {
    let mut reader = xml_reader(xml);
    let mut tokens = Vec::new();
    loop {
        let event = reader.read_event().map_err(|e| PostProcessError::Xml {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;
        let token = match event {
            Event::Start(e) => Token::Open {
                name: decode(e.name().as_ref()),
                raw: format!("<{}>", decode(&e)),
            },
            Event::Empty(e) => Token::Empty {
                name: decode(e.name().as_ref()),
                raw: format!("<{}/>", decode(&e)),
            },
            Event::End(e) => Token::Close {
                name: decode(e.name().as_ref()),
                raw: format!("</{}>", decode(&e)),
            },
            Event::Text(e) => Token::Text(decode(&e)),
            Event::GeneralRef(e) => Token::Text(format!("&{};", decode(&e))),
            Event::CData(e) => Token::Text(format!("<![CDATA[{}]]>", decode(&e))),
            Event::Comment(e) => Token::Other(format!("<!--{}-->", decode(&e))),
            Event::PI(e) => Token::Other(format!("<?{}?>", decode(&e))),
            Event::DocType(e) => Token::Other(format!("<!DOCTYPE {}>", decode(&e))),
            Event::Decl(_) => {
                let end = reader.buffer_position() as usize;
                let declaration = xml
                    .get(..end)
                    .and_then(|head| head.rfind("<?").map(|start| &head[start..]))
                    .unwrap_or_default();
                Token::Other(declaration.to_string())
            }
            Event::Eof => break,
        };
        // Entity references arrive apart from the text around them.
        if let Token::Text(text) = &token {
            if let Some(Token::Text(previous)) = tokens.last_mut() {
                previous.push_str(text);
                continue;
            }
        }
        tokens.push(token);
    }
    Ok(tokens)
}

struct Printer {
    options: PostProcessOptions,
    out: String,
    column: usize,
    stack: Vec<String>,
    /// Whitespace was seen since the last thing written.
    space: bool,
    /// Something inline was written on the current block's line.
    inline: bool,
}

impl Printer {
    /// Indentation of the current line: one step per open block element.
    fn indent_width(&self) -> usize {
        self.stack.iter().filter(|name| is_block(name)).count() * self.options.indent
    }

    fn newline(&mut self) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        let width = self.indent_width();
        self.out.extend(std::iter::repeat_n(' ', width));
        self.column = width;
        self.space = false;
        self.inline = false;
    }

    fn write(&mut self, text: &str) {
        self.out.push_str(text);
        self.column += text.chars().count();
    }

    /// Inline content: honour pending whitespace, wrapping there if needed.
    fn write_inline(&mut self, text: &str) {
        if self.space {
            if self.column + 1 + text.chars().count() > self.options.linewidth
                && self.column > self.indent_width()
            {
                self.newline();
            } else if self.inline {
                self.write(" ");
            }
        }
        self.space = false;
        self.write(text);
        self.inline = true;
    }

    fn text(&mut self, text: &str) {
        if text.starts_with(char::is_whitespace) {
            self.space = true;
        }
        let mut words = text.split_whitespace().peekable();
        while let Some(word) = words.next() {
            self.write_inline(word);
            if words.peek().is_some() {
                self.space = true;
            }
        }
        if text.ends_with(char::is_whitespace) {
            self.space = true;
        }
    }

    fn open_other(&mut self, raw: &str) {
        self.newline();
        self.write(raw);
    }

    fn open_block(&mut self, name: String, raw: &str) {
        self.newline();
        self.write(raw);
        self.stack.push(name);
    }

    fn close(&mut self, name: &str, raw: &str) -> Result<(), PostProcessError> {
        let Some(expected) = self.stack.pop() else {
            return Err(PostProcessError::UnexpectedClose(name.to_string()));
        };
        if expected != name {
            return Err(PostProcessError::Mismatched {
                expected,
                found: name.to_string(),
            });
        }
        if is_block(name) {
            if !self.inline {
                self.newline();
            }
            self.write(raw);
            self.inline = false;
            self.space = false;
        } else {
            self.write_inline(raw);
        }
        Ok(())
    }

    /// Copy tokens untouched up to the close of the verbatim element `name`.
    fn verbatim(
        &mut self,
        name: &str,
        tokens: &mut impl Iterator<Item = Token>,
    ) -> Result<(), PostProcessError> {
        let mut depth = 0usize;
        for token in tokens.by_ref() {
            match token {
                Token::Close { name: n, raw } if n == name && depth == 0 => {
                    self.stack.pop();
                    self.out.push_str(&raw);
                    self.inline = false;
                    self.space = false;
                    return Ok(());
                }
                Token::Close { name: n, raw } => {
                    if n == name {
                        depth -= 1;
                    }
                    self.out.push_str(&raw);
                }
                Token::Open { name: n, raw } => {
                    if n == name {
                        depth += 1;
                    }
                    self.out.push_str(&raw);
                }
                Token::Empty { raw, .. } | Token::Other(raw) | Token::Text(raw) => {
                    self.out.push_str(&raw)
                }
            }
        }
        Err(PostProcessError::Unclosed(name.to_string()))
    }
}

/// Re-indent `xml`. Fails if the markup is not well nested.
pub fn post_process(xml: &str, options: &PostProcessOptions) -> Result<String, PostProcessError> {
    let tokens = tokenize(xml)?;
    tracing::trace!(tokens = tokens.len(), "post-processing XML");

    let mut printer = Printer {
        options: *options,
        out: String::with_capacity(xml.len()),
        column: 0,
        stack: Vec::new(),
        space: false,
        inline: false,
    };

    let mut tokens = tokens.into_iter();
    while let Some(token) = tokens.next() {
        match token {
            Token::Other(raw) => printer.open_other(&raw),
            Token::Text(text) => printer.text(&text),
            Token::Open { name, raw } if VERBATIM_ELEMENTS.contains(&name.as_str()) => {
                printer.open_block(name.clone(), &raw);
                printer.verbatim(&name, &mut tokens)?;
            }
            Token::Open { name, raw } if is_block(&name) => printer.open_block(name, &raw),
            Token::Open { name, raw } => {
                printer.write_inline(&raw);
                printer.stack.push(name);
            }
            Token::Empty { name, raw } if is_block(&name) => {
                printer.newline();
                printer.write(&raw);
            }
            Token::Empty { raw, .. } => printer.write_inline(&raw),
            Token::Close { name, raw } => printer.close(&name, &raw)?,
        }
    }

    if let Some(open) = printer.stack.last() {
        return Err(PostProcessError::Unclosed(open.to_string()));
    }
    printer.out.push('\n');
    Ok(printer.out)
}

