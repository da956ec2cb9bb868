pub mod doc_info;

use std::collections::BTreeMap;
use std::fmt;

pub use doc_info::{Author, Copyright, DocInfo};

/// One unit of compiler output.
///
/// The stream is flat: containers are bracketed by `Start`/`End` pairs and
/// everything else is a leaf. Events arrive at the encoder in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start(Tag),
    End(TagEnd),
    /// Plain text, escaped by the encoder.
    Text(String),
    /// Markup passed through untouched (`'''...'''` and escaped templates).
    Raw(String),
    /// Inline code span.
    Code(String),
    /// Verbatim code: fenced code, indented code, imported snippets.
    CodeBlock {
        language: SourceMode,
        text: String,
    },
    Image(Image),
    Anchor(String),
    LineBreak,
    Callout {
        role: String,
        id: String,
    },
    /// Horizontal rule.
    Rule,
    XInclude(String),
}

impl Event {
    /// Whether this event starts (or is) a block-level construct.
    ///
    /// Used to split paragraphs around blocks produced mid-paragraph.
    pub fn is_block(&self) -> bool {
        match self {
            Event::Start(tag) => tag.is_block(),
            Event::CodeBlock { .. } | Event::Rule | Event::XInclude(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Document(Box<DocInfo>),
    /// `id` is fully qualified (doc id and enclosing sections joined by `.`).
    Section {
        id: String,
        level: usize,
    },
    Title,
    Paragraph,
    SimplePara,
    Heading {
        level: u8,
        id: String,
    },
    Formatted(Format),
    Link {
        kind: LinkKind,
        dest: String,
    },
    Footnote,
    List {
        ordered: bool,
    },
    ListItem,
    Table {
        id: Option<String>,
        columns: usize,
        titled: bool,
    },
    TableHead,
    TableBody,
    TableRow,
    TableCell,
    VariableList,
    VarListEntry,
    VarListTerm,
    VarListItem,
    Admonition(Admonition),
    Blurb,
    Blockquote,
    Preformatted,
}

impl Tag {
    pub fn to_end(&self) -> TagEnd {
        match self {
            Tag::Document(_) => TagEnd::Document,
            Tag::Section { .. } => TagEnd::Section,
            Tag::Title => TagEnd::Title,
            Tag::Paragraph => TagEnd::Paragraph,
            Tag::SimplePara => TagEnd::SimplePara,
            Tag::Heading { .. } => TagEnd::Heading,
            Tag::Formatted(_) => TagEnd::Formatted,
            Tag::Link { .. } => TagEnd::Link,
            Tag::Footnote => TagEnd::Footnote,
            Tag::List { .. } => TagEnd::List,
            Tag::ListItem => TagEnd::ListItem,
            Tag::Table { .. } => TagEnd::Table,
            Tag::TableHead => TagEnd::TableHead,
            Tag::TableBody => TagEnd::TableBody,
            Tag::TableRow => TagEnd::TableRow,
            Tag::TableCell => TagEnd::TableCell,
            Tag::VariableList => TagEnd::VariableList,
            Tag::VarListEntry => TagEnd::VarListEntry,
            Tag::VarListTerm => TagEnd::VarListTerm,
            Tag::VarListItem => TagEnd::VarListItem,
            Tag::Admonition(_) => TagEnd::Admonition,
            Tag::Blurb => TagEnd::Blurb,
            Tag::Blockquote => TagEnd::Blockquote,
            Tag::Preformatted => TagEnd::Preformatted,
        }
    }

    pub fn is_block(&self) -> bool {
        !matches!(
            self,
            Tag::Formatted(_) | Tag::Link { .. } | Tag::Footnote | Tag::Title
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEnd {
    Document,
    Section,
    Title,
    Paragraph,
    SimplePara,
    Heading,
    Formatted,
    Link,
    Footnote,
    List,
    ListItem,
    Table,
    TableHead,
    TableBody,
    TableRow,
    TableCell,
    VariableList,
    VarListEntry,
    VarListTerm,
    VarListItem,
    Admonition,
    Blurb,
    Blockquote,
    Preformatted,
}

impl TagEnd {
    pub fn is_block(&self) -> bool {
        !matches!(
            self,
            TagEnd::Formatted | TagEnd::Link | TagEnd::Footnote | TagEnd::Title
        )
    }
}

/// Inline formatting, from `*bold*` or `[* bold]` style markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bold,
    Italic,
    Underline,
    Teletype,
    Strikethrough,
    Quote,
    Replaceable,
}

impl Format {
    /// The formatting selected by a simple-markup delimiter or the symbol of
    /// a bracketed `[<symbol> ...]` role.
    pub fn from_symbol(c: char) -> Option<Format> {
        match c {
            '*' => Some(Format::Bold),
            '\'' | '/' => Some(Format::Italic),
            '_' => Some(Format::Underline),
            '^' | '=' => Some(Format::Teletype),
            '-' => Some(Format::Strikethrough),
            '"' => Some(Format::Quote),
            '~' => Some(Format::Replaceable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Link,
    Url,
    Funcref,
    Classref,
    Memberref,
    Enumref,
    Macroref,
    Headerref,
    Conceptref,
    Globalref,
}

impl LinkKind {
    /// Keyword table for `[<keyword> dest text]` role links.
    pub const KEYWORDS: [(&'static str, LinkKind); 9] = [
        ("link", LinkKind::Link),
        ("funcref", LinkKind::Funcref),
        ("classref", LinkKind::Classref),
        ("memberref", LinkKind::Memberref),
        ("enumref", LinkKind::Enumref),
        ("macroref", LinkKind::Macroref),
        ("headerref", LinkKind::Headerref),
        ("conceptref", LinkKind::Conceptref),
        ("globalref", LinkKind::Globalref),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admonition {
    Note,
    Tip,
    Important,
    Caution,
    Warning,
}

impl Admonition {
    pub fn from_keyword(keyword: &str) -> Option<Admonition> {
        match keyword {
            "note" => Some(Admonition::Note),
            "tip" => Some(Admonition::Tip),
            "important" => Some(Admonition::Important),
            "caution" => Some(Admonition::Caution),
            "warning" => Some(Admonition::Warning),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Admonition::Note => "note",
            Admonition::Tip => "tip",
            Admonition::Important => "important",
            Admonition::Caution => "caution",
            Admonition::Warning => "warning",
        }
    }
}

/// Language used for code blocks, set by `[c++]`, `[python]`, `[teletype]`
/// or the `source-mode` doc-info attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    #[default]
    Cpp,
    Python,
    Teletype,
}

impl SourceMode {
    pub const ALL: [SourceMode; 3] = [SourceMode::Cpp, SourceMode::Python, SourceMode::Teletype];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Cpp => "c++",
            SourceMode::Python => "python",
            SourceMode::Teletype => "teletype",
        }
    }

    pub fn from_name(name: &str) -> Option<SourceMode> {
        SourceMode::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub file: String,
    /// Keyed attributes such as `width`, `height`, `alt`; sorted by key.
    pub attributes: BTreeMap<String, String>,
}
