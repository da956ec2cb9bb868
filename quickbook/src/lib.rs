pub mod encoder;
pub mod event;
pub mod include;
pub mod parser;
pub mod source;
pub mod template;
pub mod version;

use std::io;
use std::path::{Path, PathBuf};

pub use crate::encoder::{EncodeError, Encoder};
pub use crate::event::{Event, Tag, TagEnd};
pub use crate::include::{FsLoader, MemoryLoader, SourceLoader};
pub use crate::parser::{Diagnostic, ErrorKind};
pub use crate::source::SourceMap;
pub use crate::version::{Epoch, QuickbookVersion};

use crate::parser::Parser;

/// Knobs for one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Searched, in order, after the including file's directory.
    pub include_paths: Vec<PathBuf>,
    /// An unmatched `[` is plain text. When off it is a syntax error.
    pub lenient: bool,
    /// Pin `__DATE__`, `__TIME__` and `last-revision` to a fixed clock.
    pub debug: bool,
    /// Version of a document that has no doc info at all.
    pub default_version: QuickbookVersion,
    /// Nesting limit for template expansion.
    pub max_template_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            include_paths: Vec::new(),
            lenient: true,
            debug: false,
            default_version: QuickbookVersion::V1_5,
            max_template_depth: 100,
        }
    }
}

/// The result of compiling one document.
///
/// Events are always balanced, even when the document was aborted by a hard
/// error; in that case they cover the part parsed before the error.
pub struct Compilation {
    pub events: Vec<Event>,
    pub diagnostics: Vec<Diagnostic>,
    /// Every file read, for rendering diagnostics.
    pub sources: SourceMap,
    pub error_count: usize,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Feed the event stream to `encoder`.
    pub fn encode<E: Encoder + ?Sized>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        for event in &self.events {
            encoder.emit(event.clone())?;
        }
        encoder.finish()
    }
}

/// Compiles quickbook documents read through a [`SourceLoader`].
pub struct Compiler<L: SourceLoader = FsLoader> {
    options: CompileOptions,
    loader: L,
}

impl Compiler<FsLoader> {
    pub fn new(options: CompileOptions) -> Self {
        Compiler {
            options,
            loader: FsLoader,
        }
    }
}

impl<L: SourceLoader> Compiler<L> {
    pub fn with_loader(options: CompileOptions, loader: L) -> Self {
        Compiler { options, loader }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile `source` as if it were the file `name`. Includes are resolved
    /// relative to `name`'s directory.
    pub fn compile_str(&self, name: impl AsRef<Path>, source: &str) -> Compilation {
        let path = name.as_ref().to_path_buf();
        let mut sources = SourceMap::new();
        let file = sources.add(path.display().to_string(), source);
        tracing::debug!(file = %path.display(), "compiling");
        Parser::new(sources, file, path, &self.options, &self.loader).run()
    }

    /// Load `path` through the loader and compile it.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> io::Result<Compilation> {
        let path = path.as_ref();
        let source = self.loader.load(path)?;
        Ok(self.compile_str(path, &source))
    }
}

/// Compile a standalone document with default options and no includes
/// beyond the current directory.
pub fn compile_str(source: &str) -> Compilation {
    Compiler::new(CompileOptions::default()).compile_str("<string>", source)
}
