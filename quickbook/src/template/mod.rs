pub mod args;

use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use crate::event::SourceMode;
use crate::parser::error::ErrorKind;
use crate::source::{Cursor, FileId};

pub use args::{TemplateArg, break_arguments};

/// Index of a scope in a [`TemplateScopes`] arena.
pub type ScopeId = usize;

/// Markup captured from a source file, kept unexpanded until use.
#[derive(Debug, Clone)]
pub struct MarkupRange {
    pub file: FileId,
    pub text: Arc<str>,
    pub range: Range<usize>,
}

impl MarkupRange {
    pub fn new(file: FileId, text: Arc<str>, range: Range<usize>) -> Self {
        MarkupRange { file, text, range }
    }

    pub fn as_str(&self) -> &str {
        &self.text[self.range.clone()]
    }

    pub fn cursor(&self) -> Cursor {
        Cursor::over(self.file, self.text.clone(), self.range.clone())
    }

    /// Block markup starts with a line break after any leading blanks.
    pub fn is_block(&self) -> bool {
        self.as_str()
            .trim_start_matches([' ', '\t'])
            .starts_with('\n')
    }
}

#[derive(Debug, Clone)]
pub enum TemplateBody {
    Markup(MarkupRange),
    /// An imported code snippet.
    Code { language: SourceMode, code: String },
}

#[derive(Debug, Clone)]
pub struct TemplateSymbol {
    pub name: String,
    pub params: Vec<String>,
    pub body: TemplateBody,
    /// Where the template was defined, for diagnostics.
    pub file: FileId,
    pub span: Range<usize>,
    /// The scope the body expands in. Definitions use the scope they were
    /// written in; bound arguments use the caller's scope.
    pub scope: ScopeId,
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Rc<TemplateSymbol>>,
}

/// Lexically scoped template definitions.
///
/// Scopes live in an arena and point at their parent by index. A scope
/// created for an expansion or an include is discarded by truncating the
/// arena back to its length from before the scope was pushed.
#[derive(Debug)]
pub struct TemplateScopes {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for TemplateScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateScopes {
    pub fn new() -> Self {
        TemplateScopes {
            scopes: vec![Scope::default()],
            current: 0,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn set_current(&mut self, scope: ScopeId) {
        self.current = scope;
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Create a scope under `parent` and make it current.
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            parent: Some(parent),
            symbols: HashMap::new(),
        });
        self.current = self.scopes.len() - 1;
        self.current
    }

    /// Drop every scope created after the arena had `len` entries.
    pub fn truncate(&mut self, len: usize, current: ScopeId) {
        self.scopes.truncate(len.max(1));
        self.current = current;
    }

    /// Add `symbol` to the current scope.
    pub fn define(&mut self, symbol: TemplateSymbol) -> Result<(), ErrorKind> {
        let scope = &mut self.scopes[self.current];
        if scope.symbols.contains_key(&symbol.name) {
            return Err(ErrorKind::DuplicateTemplate(symbol.name));
        }
        scope.symbols.insert(symbol.name.clone(), Rc::new(symbol));
        Ok(())
    }

    /// Find `name` in the current scope or its ancestors.
    pub fn lookup(&self, name: &str) -> Option<Rc<TemplateSymbol>> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let s = &self.scopes[id];
            if let Some(symbol) = s.symbols.get(name) {
                return Some(symbol.clone());
            }
            scope = s.parent;
        }
        None
    }
}
