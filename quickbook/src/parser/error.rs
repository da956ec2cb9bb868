use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic as Report, Label, Severity};
use thiserror::Error;

use crate::include::glob::GlobError;
use crate::source::FileId;

/// What went wrong. The `Display` text is the headline of the diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unknown template `{0}`")]
    UnknownTemplate(String),

    #[error("invalid number of arguments passed to `{name}`: expecting {expected}, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("template `{0}` is already defined in this scope")]
    DuplicateTemplate(String),

    #[error("infinite template recursion detected while expanding `{0}`")]
    RecursiveTemplate(String),

    #[error("`{0}` is already being included")]
    RecursiveInclude(String),

    #[error("mismatched [endsect]: {0}")]
    SectionMismatch(String),

    #[error("missing [endsect] detected at end of file ({0} section(s) still open)")]
    MissingEndSection(usize),

    #[error("invalid glob `{pattern}`: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: GlobError,
    },

    #[error("file name is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("cannot load `{path}`: {message}")]
    Io { path: String, message: String },
}

impl ErrorKind {
    pub fn syntax(message: impl Into<String>) -> Self {
        ErrorKind::Syntax(message.into())
    }
}

/// A positioned error or warning.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub span: Range<usize>,
    pub file_id: FileId,
    pub severity: Severity,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(kind: ErrorKind, span: Range<usize>, file_id: FileId) -> Self {
        Diagnostic {
            kind,
            span,
            file_id,
            severity: Severity::Error,
            notes: Vec::new(),
        }
    }

    pub fn warning(kind: ErrorKind, span: Range<usize>, file_id: FileId) -> Self {
        Diagnostic {
            kind,
            span,
            file_id,
            severity: Severity::Warning,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Report<usize> {
        Report::new(self.severity)
            .with_message(self.message())
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

pub type ParseResult<T> = Result<T, Diagnostic>;
