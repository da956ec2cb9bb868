/// Front matter of a document: `[book Title [quickbook 1.5] [id ...] ...]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocInfo {
    /// `book`, `article`, `library`, `chapter`, ...
    pub doc_type: String,
    pub title: String,
    pub id: String,
    pub dirname: Option<String>,
    pub version: Option<String>,
    pub copyrights: Vec<Copyright>,
    pub authors: Vec<Author>,
    pub license: Option<String>,
    pub purpose: Option<String>,
    pub categories: Vec<String>,
    pub last_revision: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Copyright {
    pub years: Vec<String>,
    pub holder: String,
}

/// An author written as `[Surname, Firstname]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub firstname: String,
    pub surname: String,
}

pub const DOC_TYPES: [&str; 11] = [
    "book",
    "article",
    "library",
    "chapter",
    "part",
    "appendix",
    "preface",
    "qandadiv",
    "qandaset",
    "reference",
    "set",
];
