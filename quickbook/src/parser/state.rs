use std::collections::HashMap;
use std::path::PathBuf;

use crate::event::{Event, SourceMode};
use crate::source::FileId;
use crate::template::TemplateScopes;
use crate::version::{Epoch, QuickbookVersion};

/// A `[section]` that has not been closed yet.
#[derive(Debug, Clone)]
pub struct OpenSection {
    /// The id as written (or derived from the title).
    pub id: String,
    /// `id` prefixed with the document id and enclosing section ids.
    pub qualified_id: String,
    pub file: FileId,
}

/// The file currently being parsed.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub id: FileId,
    pub path: PathBuf,
    /// Number of sections open when this file was entered. Sections below
    /// this depth belong to an including file and cannot be closed here.
    pub section_base: usize,
}

/// Everything that lives for the whole document.
#[derive(Debug)]
pub struct State {
    pub version: QuickbookVersion,
    pub epoch: Epoch,
    pub doc_id: String,
    pub sections: Vec<OpenSection>,
    pub file: FileContext,
    /// Paths of the main file and every include being parsed, outermost
    /// first.
    pub open_files: Vec<PathBuf>,
    pub source_mode: SourceMode,
    /// `[def]` replacements, already parsed to events.
    pub macros: HashMap<String, Vec<Event>>,
    pub templates: TemplateScopes,
    /// Set inside `[pre]`; a blank line then no longer ends a phrase.
    pub no_eols: bool,
    pub template_depth: usize,
    pub error_count: usize,
}

impl State {
    pub fn new(file: FileContext, version: QuickbookVersion) -> Self {
        State {
            version,
            epoch: version.epoch(),
            doc_id: String::new(),
            sections: Vec::new(),
            open_files: vec![file.path.clone()],
            file,
            source_mode: SourceMode::default(),
            macros: HashMap::new(),
            templates: TemplateScopes::new(),
            no_eols: false,
            template_depth: 0,
            error_count: 0,
        }
    }

    pub fn set_version(&mut self, version: QuickbookVersion) {
        self.version = version;
        self.epoch = version.epoch();
    }

    /// Section depth, counting only sections opened in the current file.
    pub fn local_depth(&self) -> usize {
        self.sections.len().saturating_sub(self.file.section_base)
    }

    /// Qualify `id` with the document id and the enclosing sections.
    pub fn qualify(&self, id: &str) -> String {
        let parent = match self.sections.last() {
            Some(section) => section.qualified_id.as_str(),
            None => self.doc_id.as_str(),
        };
        if parent.is_empty() {
            id.to_string()
        } else {
            format!("{parent}.{id}")
        }
    }

    /// The longest macro name at the start of `text`.
    pub fn match_macro(&self, text: &str) -> Option<&str> {
        self.macros
            .keys()
            .filter(|name| text.starts_with(name.as_str()))
            .max_by_key(|name| name.len())
            .map(String::as_str)
    }
}

/// Derive an id from title text: lower case, anything but ASCII
/// alphanumerics becomes `_`.
pub fn make_id(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
