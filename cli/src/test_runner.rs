//! Runner for `.test.qbk` fixtures: TOML front matter between `---` lines,
//! then the quickbook source to compile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use quickbook::{Compilation, CompileOptions, Compiler, Diagnostic};

const EXTENSION: &str = ".test.qbk";

#[derive(Debug, Deserialize)]
pub struct ExpectedDiagnostic {
    /// Substring that must appear in the message.
    pub contains: String,

    /// If set, the span must start on this 1-based line of the fixture body.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Human-readable test description.
    pub description: Option<String>,

    /// Compile with an unmatched `[` treated as an error.
    pub strict: bool,

    /// Extra include directories, relative to the fixture.
    pub include_paths: Vec<PathBuf>,

    /// Expected XML (before pretty printing), compared trimmed.
    pub expect_output: Option<String>,

    /// Substrings the XML must contain.
    pub expect_contains: Vec<String>,

    /// An error whose message contains this substring must be reported.
    pub expect_error: Option<String>,

    /// Exact number of errors.
    pub expect_error_count: Option<usize>,

    /// If present (even empty), warning count and content are checked.
    pub expect_warnings: Option<Vec<ExpectedDiagnostic>>,
}

/// Split a fixture into its TOML config and quickbook source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map_or("?", |s| s.trim_end_matches(EXTENSION))
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };
    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let options = CompileOptions {
        include_paths: config.include_paths.iter().map(|p| base_dir.join(p)).collect(),
        lenient: !config.strict,
        debug: true,
        ..CompileOptions::default()
    };
    let compilation = Compiler::new(options).compile_str(path, source);

    let outcome = match check(&config, source, &compilation) {
        Some(reason) => TestOutcome::Fail(reason),
        None => TestOutcome::Pass,
    };
    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Compare a compilation against the fixture's expectations. Returns
/// `Some(reason)` on the first mismatch.
fn check(config: &TestConfig, source: &str, compilation: &Compilation) -> Option<String> {
    let errors: Vec<&Diagnostic> = compilation
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .collect();

    if let Some(expected) = &config.expect_error {
        if !errors.iter().any(|e| e.message().contains(expected.as_str())) {
            return Some(format!(
                "expected an error containing \"{}\", got: {}",
                expected,
                describe(&errors)
            ));
        }
    } else if config.expect_error_count.is_none() && compilation.has_errors() {
        return Some(format!("unexpected errors: {}", describe(&errors)));
    }

    if let Some(count) = config.expect_error_count {
        if compilation.error_count != count {
            return Some(format!(
                "expected {} error(s), got {}: {}",
                count,
                compilation.error_count,
                describe(&errors)
            ));
        }
    }

    if config.expect_output.is_some() || !config.expect_contains.is_empty() {
        let xml = match boostbook::to_boostbook(compilation) {
            Ok(xml) => xml,
            Err(e) => return Some(format!("encoding failed: {}", e)),
        };
        if let Some(expected) = &config.expect_output {
            if xml.trim() != expected.trim() {
                return Some(format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected.trim(),
                    xml.trim()
                ));
            }
        }
        for needle in &config.expect_contains {
            if !xml.contains(needle.as_str()) {
                return Some(format!(
                    "output does not contain \"{}\"\n  actual: {}",
                    needle,
                    xml.trim()
                ));
            }
        }
    }

    let expected_warnings = config.expect_warnings.as_ref()?;
    let warnings: Vec<&Diagnostic> = compilation
        .diagnostics
        .iter()
        .filter(|d| !d.is_error())
        .collect();
    check_warnings(source, &warnings, expected_warnings)
}

fn describe(diagnostics: &[&Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "(none)".to_string();
    }
    diagnostics
        .iter()
        .map(|d| d.message())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

fn check_warnings(
    source: &str,
    warnings: &[&Diagnostic],
    expected: &[ExpectedDiagnostic],
) -> Option<String> {
    if warnings.len() != expected.len() {
        let actual: Vec<String> = warnings.iter().map(|w| format!("  - {}", w.message())).collect();
        return Some(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            warnings.len(),
            if actual.is_empty() {
                "    (none)".to_string()
            } else {
                actual.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in warnings.iter().zip(expected).enumerate() {
        let message = actual.message();
        if !message.contains(&expected.contains) {
            return Some(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, message
            ));
        }
        if let Some(expected_line) = expected.line {
            // Only spans in the fixture itself have a meaningful line.
            let actual_line = if actual.file_id == 0 {
                byte_offset_to_line(source, actual.span.start)
            } else {
                0
            };
            if actual_line != expected_line {
                return Some(format!(
                    "warning[{}]: expected on line {}, but span is on line {}",
                    i, expected_line, actual_line
                ));
            }
        }
    }

    None
}

/// Fixtures grouped by category (subfolder relative to root); files directly
/// in `root` get category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(EXTENSION))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", EXTENSION, path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Pick the categories to run. An empty request means all of them.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }
    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

/// Run every fixture under `path` (or the single file `path`).
/// Returns the exit code: 0 when everything passed.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let all = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover_categorized(path)
    };
    if all.is_empty() {
        eprintln!("no {} files found in {}", EXTENSION, path.display());
        return 1;
    }

    let selected = select(&all, categories);
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        eprintln!();
        eprintln!("{}", paint(category_label(category), "1", no_color));

        for file in *files {
            let result = run_single_test(file);
            if matches!(result.outcome, TestOutcome::Pass) {
                passed += 1;
                eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label());
            } else {
                eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label());
                failures.push(result);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!(
            "test result: {}. {} passed, 0 failed",
            paint("ok", "32", no_color),
            passed
        );
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}
