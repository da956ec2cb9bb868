//! Code snippets marked up inside C++ or Python sources, for `[import]`.
//!
//! ```text
//! //[ example          #[ example
//! int x = 1;           x = 1
//! //<-                 #<-
//! hidden();            hidden()
//! //->                 #->
//! //]                  #]
//! ```
//!
//! C++ sources may also use the block form `/*[id*/ ... /*]*/`. Snippets may
//! nest; marker lines and hidden regions never appear in the output.

use std::path::Path;

use crate::event::SourceMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub id: String,
    pub code: String,
    pub language: SourceMode,
}

enum Marker<'a> {
    Start(&'a str),
    End,
    HideStart,
    HideEnd,
}

pub fn language_for(path: &Path) -> SourceMode {
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => SourceMode::Python,
        _ => SourceMode::Cpp,
    }
}

/// Every snippet in `source`, in the order their start markers appear.
pub fn extract(path: &Path, source: &str) -> Vec<Snippet> {
    let language = language_for(path);
    let mut open: Vec<(usize, Vec<&str>)> = Vec::new();
    let mut snippets: Vec<Snippet> = Vec::new();
    let mut hidden = false;

    for line in source.lines() {
        match marker(line.trim(), language) {
            Some(Marker::Start(id)) => {
                snippets.push(Snippet {
                    id: id.to_string(),
                    code: String::new(),
                    language,
                });
                open.push((snippets.len() - 1, Vec::new()));
            }
            Some(Marker::End) => {
                if let Some((index, lines)) = open.pop() {
                    snippets[index].code = dedent(&lines);
                }
            }
            Some(Marker::HideStart) => hidden = true,
            Some(Marker::HideEnd) => hidden = false,
            None if hidden => {}
            None => {
                for (_, lines) in &mut open {
                    lines.push(line);
                }
            }
        }
    }

    // Unterminated snippets run to the end of the file.
    while let Some((index, lines)) = open.pop() {
        snippets[index].code = dedent(&lines);
    }

    snippets
}

fn marker(line: &str, language: SourceMode) -> Option<Marker<'_>> {
    let (line_comment, hide_start, hide_end) = match language {
        SourceMode::Python => ("#", "#<-", "#->"),
        _ => ("//", "//<-", "//->"),
    };

    if line == hide_start {
        return Some(Marker::HideStart);
    }
    if line == hide_end {
        return Some(Marker::HideEnd);
    }

    if let Some(rest) = line.strip_prefix(line_comment) {
        if let Some(id) = rest.strip_prefix('[') {
            return snippet_id(id.trim_start()).map(Marker::Start);
        }
        if rest.trim() == "]" {
            return Some(Marker::End);
        }
    }

    if language != SourceMode::Python {
        if let Some(rest) = line.strip_prefix("/*[") {
            let id = rest.strip_suffix("*/")?;
            return snippet_id(id.trim()).map(Marker::Start);
        }
        if line == "/*]*/" {
            return Some(Marker::End);
        }
    }

    None
}

fn snippet_id(text: &str) -> Option<&str> {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    (end > 0).then(|| &text[..end])
}

/// Strip leading and trailing blank lines and the common indentation.
pub fn dedent(lines: &[&str]) -> String {
    let is_blank = |l: &&str| l.trim().is_empty();
    let first = lines.iter().position(|l| !is_blank(l));
    let last = lines.iter().rposition(|l| !is_blank(l));
    let (Some(first), Some(last)) = (first, last) else {
        return String::new();
    };
    let lines = &lines[first..=last];

    let indent = lines
        .iter()
        .filter(|l| !is_blank(l))
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    let mut out = String::new();
    for line in lines {
        if line.len() >= indent {
            out.push_str(&line[indent..]);
        }
        out.push('\n');
    }
    out
}
