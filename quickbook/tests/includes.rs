use std::path::{Path, PathBuf};

use quickbook::include::glob::{GlobError, check_glob, glob};
use quickbook::include::{PathKind, PathParameter, resolve};
use quickbook::{Compilation, CompileOptions, Compiler, ErrorKind, Event, FsLoader, MemoryLoader, Tag, TagEnd};

fn compile_with(loader: MemoryLoader, name: &str, source: &str) -> Compilation {
    Compiler::with_loader(CompileOptions::default(), loader).compile_str(name, source)
}

fn texts(events: &[Event]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn glob_star() {
    assert!(glob("*.qbk", "foo.qbk"));
    assert!(!glob("*.qbk", "foo.qbk.bak"));
    assert!(glob("*", "anything"));
    assert!(!glob("*", ""));
    assert!(glob("a*b*c", "aXXbYYc"));
    assert!(!glob("a*b*c", "aXXbYY"));
}

#[test]
fn glob_ranges() {
    for name in ["ax", "bx", "cx"] {
        assert!(glob("[abc]x", name), "{name}");
    }
    assert!(!glob("[abc]x", "dx"));
    assert!(glob("[a-c]x", "bx"));
    assert!(glob("[^a-c]x", "dx"));
    assert!(!glob("[^a-c]x", "ax"));
    assert!(glob("file?.txt", "file1.txt"));
    assert!(glob("\\*.txt", "*.txt"));
    assert!(!glob("\\*.txt", "a.txt"));
}

#[test]
fn glob_never_splits_combining_sequences() {
    // "e" + COMBINING ACUTE ACCENT is one character to `?`.
    let decomposed = "e\u{301}.qbk";
    assert!(glob("?.qbk", decomposed));
    assert!(!glob("??.qbk", decomposed));
    assert!(!glob("e.qbk", decomposed));
    assert!(!glob("[e].qbk", decomposed));
    assert!(glob("*.qbk", decomposed));
}

#[test]
fn glob_uses_grapheme_clusters() {
    // DEVANAGARI STRESS SIGN UDATTA extends the preceding letter.
    assert!(glob("?", "a\u{951}"));
    assert!(!glob("??", "a\u{951}"));
    assert!(!glob("[a]", "a\u{951}"));
    assert!(glob("*x", "a\u{951}x"));
    // Precomposed and plain non-ASCII letters are a single cluster each.
    assert!(glob("caf?", "caf\u{e9}"));
    assert!(glob("??.qbk", "\u{65e5}\u{672c}.qbk"));
    assert!(!glob("?.qbk", "\u{65e5}\u{672c}.qbk"));
}

#[test]
fn glob_validation() {
    assert_eq!(check_glob("plain/file.qbk"), Ok(false));
    assert_eq!(check_glob("*.qbk"), Ok(true));
    assert_eq!(check_glob("dir/[ab].qbk"), Ok(true));
    assert_eq!(check_glob("**/x.qbk"), Err(GlobError::DoubleStar));
    assert_eq!(check_glob("a]b"), Err(GlobError::UnevenBrackets));
    assert_eq!(check_glob("[a"), Err(GlobError::UnevenBrackets));
    assert_eq!(check_glob("[]"), Err(GlobError::EmptyRange));
    assert_eq!(check_glob("[a[b]]"), Err(GlobError::NestedBrackets));
    assert_eq!(check_glob("[a/b]"), Err(GlobError::SlashInRange));
    assert_eq!(check_glob("x\\"), Err(GlobError::TrailingEscape));
    assert_eq!(check_glob("a\\/b"), Err(GlobError::EscapedSlash));
    assert_eq!(check_glob("*\u{e9}"), Err(GlobError::NonAscii));
    assert_eq!(check_glob("caf\u{e9}.qbk"), Ok(false));
}

#[test]
fn path_parameters() {
    assert_eq!(
        PathParameter::parse(" a\\[b\\].qbk "),
        Ok(PathParameter {
            value: "a[b].qbk".to_string(),
            kind: PathKind::Path,
        })
    );
    assert_eq!(
        PathParameter::parse("parts/*.qbk").map(|p| p.kind),
        Ok(PathKind::Glob)
    );
}

#[test]
fn resolve_prefers_local_then_include_paths() {
    let loader = MemoryLoader::new()
        .with_file("docs/local.qbk", "")
        .with_file("shared/local.qbk", "")
        .with_file("shared/only_shared.qbk", "");
    let include_paths = [PathBuf::from("shared")];

    let resolved = |value: &str| {
        let param = PathParameter::parse(value).expect("valid path");
        resolve(&param, Path::new("docs"), &include_paths, &loader)
            .expect("resolves")
            .into_iter()
            .map(|p| p.file_path)
            .collect::<Vec<_>>()
    };

    assert_eq!(resolved("local.qbk"), [PathBuf::from("docs/local.qbk")]);
    assert_eq!(
        resolved("only_shared.qbk"),
        [PathBuf::from("shared/only_shared.qbk")]
    );
    // Missing files resolve locally so the load reports them.
    assert_eq!(resolved("missing.qbk"), [PathBuf::from("docs/missing.qbk")]);
    assert_eq!(
        resolved("*.qbk"),
        [
            PathBuf::from("docs/local.qbk"),
            PathBuf::from("shared/local.qbk"),
            PathBuf::from("shared/only_shared.qbk"),
        ]
    );
}

#[test]
fn include_inserts_blocks() {
    let loader = MemoryLoader::new()
        .with_file("docs/main.qbk", "[include part.qbk]\nAfter.\n")
        .with_file("docs/part.qbk", "[section Part]\nIncluded.\n[endsect]\n");
    let compilation = Compiler::with_loader(CompileOptions::default(), loader)
        .compile_file("docs/main.qbk")
        .expect("main exists");
    assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics);
    assert_eq!(texts(&compilation.events), ["Part", "Included.", "After."]);
    assert_eq!(
        compilation.events[0],
        Event::Start(Tag::Section {
            id: "part".to_string(),
            level: 1,
        })
    );
    assert_eq!(compilation.sources.name(1), Some("docs/part.qbk"));
}

#[test]
fn include_with_id_overrides_the_doc_id() {
    let loader = MemoryLoader::new().with_file("part.qbk", "[section Sub]\n[endsect]\n");
    let compilation = compile_with(
        loader,
        "main.qbk",
        "[article Main\n]\n[include:other part.qbk]\n[section After]\n[endsect]\n",
    );
    assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics);
    let ids: Vec<&str> = compilation
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Start(Tag::Section { id, .. }) => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, ["other.sub", "main.after"]);
}

#[test]
fn included_sections_must_close_in_their_file() {
    let loader = MemoryLoader::new().with_file("part.qbk", "[section Open]\nText.\n");
    let compilation = compile_with(loader, "main.qbk", "[include part.qbk]\nMain.\n");
    assert!(!compilation.has_errors());
    assert_eq!(compilation.diagnostics.len(), 1);
    assert_eq!(compilation.diagnostics[0].kind, ErrorKind::MissingEndSection(1));
    assert_eq!(compilation.diagnostics[0].file_id, 1);
    // The section is closed before the main file continues.
    let main = compilation
        .events
        .iter()
        .position(|e| *e == Event::Text("Main.".to_string()))
        .expect("main text");
    assert_eq!(compilation.events[main - 2], Event::End(TagEnd::Section));

    let loader = MemoryLoader::new().with_file("closer.qbk", "[endsect]\n");
    let compilation = compile_with(
        loader,
        "main.qbk",
        "[section Outer]\n[include closer.qbk]\n[endsect]\n",
    );
    assert_eq!(compilation.error_count, 1);
    assert!(matches!(
        compilation.diagnostics[0].kind,
        ErrorKind::SectionMismatch(_)
    ));
}

#[test]
fn glob_include_in_sorted_order() {
    let loader = MemoryLoader::new()
        .with_file("parts/b.qbk", "B.\n")
        .with_file("parts/a.qbk", "A.\n")
        .with_file("parts/notes.txt", "skipped\n");
    let compilation = compile_with(loader, "main.qbk", "[include parts/*.qbk]\n");
    assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics);
    assert_eq!(texts(&compilation.events), ["A.", "B."]);
}

#[test]
fn invalid_glob_is_fatal() {
    let compilation = compile_with(MemoryLoader::new(), "main.qbk", "[include **/*.qbk]\n");
    assert_eq!(compilation.error_count, 1);
    assert!(matches!(
        compilation.diagnostics[0].kind,
        ErrorKind::InvalidGlob {
            source: GlobError::DoubleStar,
            ..
        }
    ));
}

#[test]
fn missing_include_is_an_io_error() {
    let compilation = compile_with(MemoryLoader::new(), "main.qbk", "Before.\n\n[include nowhere.qbk]\n");
    assert_eq!(compilation.error_count, 1);
    assert!(matches!(compilation.diagnostics[0].kind, ErrorKind::Io { .. }));
    assert_eq!(texts(&compilation.events), ["Before."]);
}

#[test]
fn templates_defined_in_an_include_stay_there() {
    let loader = MemoryLoader::new().with_file("defs.qbk", "[template private body]\n");
    let compilation = compile_with(loader, "main.qbk", "[include defs.qbk]\n[private]\n");
    assert!(!compilation.has_errors());
    assert_eq!(texts(&compilation.events), ["[private]"]);
    assert!(matches!(
        compilation.diagnostics[0].kind,
        ErrorKind::UnknownTemplate(_)
    ));
}

#[test]
fn included_doc_info_is_skipped() {
    let loader = MemoryLoader::new().with_file("part.qbk", "[article Part\n[quickbook 1.5]\n]\nBody.\n");
    let compilation = compile_with(loader, "main.qbk", "[include part.qbk]\n");
    assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics);
    assert_eq!(texts(&compilation.events), ["Body."]);
    assert!(
        !compilation
            .events
            .iter()
            .any(|e| matches!(e, Event::Start(Tag::Document(_))))
    );
}

#[test]
fn include_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
    std::fs::write(dir.path().join("sub/one.qbk"), "One.\n").expect("write");
    std::fs::write(dir.path().join("sub/two.qbk"), "Two.\n").expect("write");
    let main = dir.path().join("main.qbk");
    std::fs::write(&main, "[include sub/*.qbk]\n[include sub/one.qbk]\n").expect("write");

    let compilation = Compiler::new(CompileOptions::default())
        .compile_file(&main)
        .expect("main exists");
    assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics);
    assert_eq!(texts(&compilation.events), ["One.", "Two.", "One."]);

    let missing = Compiler::with_loader(CompileOptions::default(), FsLoader)
        .compile_file(dir.path().join("absent.qbk"));
    assert!(missing.is_err());
}

#[test]
fn file_including_itself_is_an_error() {
    let loader = MemoryLoader::new().with_file("a.qbk", "A.\n\n[include a.qbk]\n");
    let compilation = compile_with(loader, "main.qbk", "[include a.qbk]\n");
    assert_eq!(compilation.error_count, 1);
    assert_eq!(
        compilation.diagnostics[0].kind,
        ErrorKind::RecursiveInclude("a.qbk".to_string())
    );
    // Reported at the directive inside the included file.
    assert_eq!(compilation.diagnostics[0].file_id, 1);
    assert_eq!(texts(&compilation.events), ["A."]);

    let compilation = compile_with(MemoryLoader::new(), "main.qbk", "[include main.qbk]\n");
    assert_eq!(
        compilation.diagnostics[0].kind,
        ErrorKind::RecursiveInclude("main.qbk".to_string())
    );
}

#[test]
fn include_cycle_through_two_files_is_an_error() {
    let loader = MemoryLoader::new()
        .with_file("a.qbk", "[include b.qbk]\n")
        .with_file("b.qbk", "[include a.qbk]\n");
    let compilation = compile_with(loader, "main.qbk", "[include a.qbk]\n");
    assert_eq!(compilation.error_count, 1);
    assert_eq!(
        compilation.diagnostics[0].kind,
        ErrorKind::RecursiveInclude("a.qbk".to_string())
    );
    assert_eq!(compilation.sources.name(2), Some("b.qbk"));
    assert_eq!(compilation.diagnostics[0].file_id, 2);
}

#[test]
fn same_file_may_be_included_twice_in_sequence() {
    let loader = MemoryLoader::new().with_file("part.qbk", "Part.\n");
    let compilation = compile_with(loader, "main.qbk", "[include part.qbk]\n[include part.qbk]\n");
    assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics);
    assert_eq!(texts(&compilation.events), ["Part.", "Part."]);
}
