pub mod glob;
pub mod snippet;

use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::include::glob::{GlobError, check_glob, find_glob_char, glob, glob_unescape};
use crate::parser::error::ErrorKind;

/// Where source text comes from. The compiler never touches the filesystem
/// directly, so tests can run against an in-memory tree.
pub trait SourceLoader {
    fn load(&self, path: &Path) -> io::Result<String>;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Names of the entries of `dir`.
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<OsString>>;
}

/// Loads from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        // "" is the current directory
        path.as_os_str().is_empty() || path.is_dir()
    }

    fn read_dir(&self, dir: &Path) -> io::Result<Vec<OsString>> {
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            names.push(entry?.file_name());
        }
        Ok(names)
    }
}

/// A fixed set of files keyed by path, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no such file in memory loader")
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .keys()
            .any(|file| file.starts_with(path) && file.as_path() != path)
    }

    fn read_dir(&self, dir: &Path) -> io::Result<Vec<OsString>> {
        let mut names = BTreeSet::new();
        for file in self.files.keys() {
            if let Ok(relative) = file.strip_prefix(dir) {
                if let Some(first) = relative.components().next() {
                    names.insert(first.as_os_str().to_os_string());
                }
            }
        }
        Ok(names.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Path,
    Glob,
}

/// The path argument of an `include`, `import` or `xinclude`, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParameter {
    pub value: String,
    pub kind: PathKind,
}

impl PathParameter {
    pub fn parse(value: &str) -> Result<PathParameter, GlobError> {
        let value = value.trim();
        if check_glob(value)? {
            Ok(PathParameter {
                value: value.to_string(),
                kind: PathKind::Glob,
            })
        } else {
            Ok(PathParameter {
                value: glob_unescape(value),
                kind: PathKind::Path,
            })
        }
    }
}

/// A resolved include target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct QuickbookPath {
    /// The actual location of the file.
    pub file_path: PathBuf,
    /// The path as written relative to the search root it was found under.
    pub abstract_path: PathBuf,
}

/// Resolve an include path against the including file's directory and then
/// each include search path.
///
/// A plain path resolves to the first existing candidate (or the local
/// candidate when none exists, so the load reports the failure). A glob
/// collects every match under every root.
pub fn resolve(
    param: &PathParameter,
    current_dir: &Path,
    include_paths: &[PathBuf],
    loader: &dyn SourceLoader,
) -> Result<BTreeSet<QuickbookPath>, ErrorKind> {
    let mut result = BTreeSet::new();

    match param.kind {
        PathKind::Glob => {
            search_glob(&mut result, current_dir, Path::new(""), &param.value, loader)?;
            for root in include_paths {
                search_glob(&mut result, root, Path::new(""), &param.value, loader)?;
            }
        }
        PathKind::Path => {
            let path = Path::new(&param.value);
            let abstract_path = path.to_path_buf();
            if path.is_absolute() {
                result.insert(QuickbookPath {
                    file_path: abstract_path.clone(),
                    abstract_path,
                });
                return Ok(result);
            }

            let local = current_dir.join(path);
            let found = std::iter::once(local.clone())
                .chain(include_paths.iter().map(|root| root.join(path)))
                .find(|candidate| loader.is_file(candidate))
                .unwrap_or(local);
            result.insert(QuickbookPath {
                file_path: found,
                abstract_path,
            });
        }
    }

    Ok(result)
}

fn join(base: &Path, part: &str) -> PathBuf {
    if part.is_empty() {
        base.to_path_buf()
    } else {
        base.join(part)
    }
}

fn search_glob(
    out: &mut BTreeSet<QuickbookPath>,
    base: &Path,
    abstract_base: &Path,
    pattern: &str,
    loader: &dyn SourceLoader,
) -> Result<(), ErrorKind> {
    let Some(glob_pos) = find_glob_char(pattern, 0) else {
        let plain = glob_unescape(pattern);
        let path = join(base, &plain);
        if loader.is_file(&path) {
            out.insert(QuickbookPath {
                file_path: path,
                abstract_path: join(abstract_base, &plain),
            });
        }
        return Ok(());
    };

    // Everything before the component holding the first glob character is a
    // literal directory prefix.
    let (dir_part, rest) = match pattern[..glob_pos].rfind('/') {
        Some(slash) => (&pattern[..slash], &pattern[slash + 1..]),
        None => ("", pattern),
    };
    let dir_part = glob_unescape(dir_part);
    let dir = join(base, &dir_part);
    let abstract_dir = join(abstract_base, &dir_part);

    let (component, remainder) = match rest.find('/') {
        Some(slash) => (&rest[..slash], Some(&rest[slash + 1..])),
        None => (rest, None),
    };

    if !loader.is_dir(&dir) {
        return Ok(());
    }

    let entries = loader.read_dir(&dir).map_err(|e| ErrorKind::Io {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    for entry in entries {
        let name = entry
            .to_str()
            .ok_or_else(|| ErrorKind::Encoding(entry.to_string_lossy().into_owned()))?;
        if !glob(component, name) {
            continue;
        }
        let path = dir.join(name);
        let abstract_path = abstract_dir.join(name);
        match remainder {
            Some(remainder) => {
                if loader.is_dir(&path) {
                    search_glob(out, &path, &abstract_path, remainder, loader)?;
                }
            }
            None => {
                if loader.is_file(&path) {
                    out.insert(QuickbookPath {
                        file_path: path,
                        abstract_path,
                    });
                }
            }
        }
    }

    Ok(())
}
