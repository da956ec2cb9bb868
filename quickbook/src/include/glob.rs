//! ASCII shell-style globs for `include`, `import` and `xinclude` paths.
//!
//! Patterns support `*`, `?`, `[...]` ranges (with `^` negation and `\`
//! escapes) and `\` escapes. `**` is rejected. Filenames are matched as UTF-8
//! and a wildcard never consumes only part of a grapheme cluster.

use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlobError {
    #[error("uneven square brackets")]
    UnevenBrackets,
    #[error("'**' not supported")]
    DoubleStar,
    #[error("empty range")]
    EmptyRange,
    #[error("trailing escape")]
    TrailingEscape,
    #[error("contains escaped slash")]
    EscapedSlash,
    #[error("nested square brackets")]
    NestedBrackets,
    #[error("slash in square brackets")]
    SlashInRange,
    #[error("invalid character, globs are ascii only")]
    NonAscii,
}

/// Validate `pattern`, returning whether it contains any glob syntax.
///
/// Runs before any matching so malformed patterns are reported once, at the
/// include site.
pub fn check_glob(pattern: &str) -> Result<bool, GlobError> {
    let bytes = pattern.as_bytes();
    let mut is_glob = false;
    let mut is_ascii = true;
    let mut i = 0;

    while i < bytes.len() {
        if !(32..=127).contains(&bytes[i]) {
            is_ascii = false;
        }
        match bytes[i] {
            b'\\' => i = check_escape(bytes, i)?,
            b'[' => {
                i = check_range(bytes, i)?;
                is_glob = true;
            }
            b']' => return Err(GlobError::UnevenBrackets),
            b'?' => {
                is_glob = true;
                i += 1;
            }
            b'*' => {
                is_glob = true;
                i += 1;
                if bytes.get(i) == Some(&b'*') {
                    return Err(GlobError::DoubleStar);
                }
            }
            _ => i += 1,
        }
    }

    if is_glob && !is_ascii {
        return Err(GlobError::NonAscii);
    }
    Ok(is_glob)
}

fn check_escape(bytes: &[u8], i: usize) -> Result<usize, GlobError> {
    match bytes.get(i + 1) {
        None => Err(GlobError::TrailingEscape),
        Some(b'\\') | Some(b'/') => Err(GlobError::EscapedSlash),
        Some(_) => Ok(i + 2),
    }
}

fn check_range(bytes: &[u8], i: usize) -> Result<usize, GlobError> {
    let mut i = i + 1;
    if bytes.get(i) == Some(&b']') {
        return Err(GlobError::EmptyRange);
    }
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i = check_escape(bytes, i)?,
            b'[' => return Err(GlobError::NestedBrackets),
            b']' => return Ok(i + 1),
            b'/' => return Err(GlobError::SlashInRange),
            _ => i += 1,
        }
    }
    Err(GlobError::UnevenBrackets)
}

/// Match a validated pattern against a single path component.
pub fn glob(pattern: &str, filename: &str) -> bool {
    // Without this '*' would match an empty name.
    if filename.is_empty() {
        return pattern.is_empty();
    }

    let p = pattern.as_bytes();
    let f = filename;
    let mut pi = 0;
    let mut fi = 0;

    if !match_section(p, &mut pi, f, &mut fi) {
        return false;
    }

    while pi < p.len() {
        // match_section only stops early at a '*'
        pi += 1;
        if pi == p.len() {
            return true;
        }
        if p[pi] == b'*' {
            return false;
        }
        loop {
            if fi == f.len() {
                return false;
            }
            if match_section(p, &mut pi, f, &mut fi) {
                break;
            }
            fi = end_of_char(f, fi);
        }
    }

    fi == f.len()
}

/// Match the pattern up to the next `*`. Only advances on success.
fn match_section(p: &[u8], p_begin: &mut usize, f: &str, f_begin: &mut usize) -> bool {
    let mut pi = *p_begin;
    let mut fi = *f_begin;
    let fb = f.as_bytes();

    while pi < p.len() && p[pi] != b'*' {
        if fi == f.len() {
            return false;
        }
        match p[pi] {
            b'[' => {
                if starts_with_combining(f, fi) {
                    return false;
                }
                if !match_range(p, &mut pi, f, &mut fi) {
                    return false;
                }
            }
            b'?' => {
                if starts_with_combining(f, fi) {
                    return false;
                }
                pi += 1;
                fi = end_of_char(f, fi);
            }
            mut c => {
                if c == b'\\' {
                    pi += 1;
                    match p.get(pi) {
                        Some(&escaped) => c = escaped,
                        None => return false,
                    }
                }
                if c != fb[fi] {
                    return false;
                }
                pi += 1;
                fi += 1;
            }
        }
    }

    if pi == p.len() && fi != f.len() {
        return false;
    }
    if starts_with_combining(f, fi) {
        return false;
    }

    *p_begin = pi;
    *f_begin = fi;
    true
}

fn match_range(p: &[u8], p_begin: &mut usize, f: &str, f_begin: &mut usize) -> bool {
    let mut pi = *p_begin + 1;
    if pi == p.len() {
        return false;
    }

    let prevent_match = starts_with_combining(f, *f_begin);
    let mut invert = false;
    let mut matched = false;

    if p[pi] == b'^' {
        invert = true;
        pi += 1;
        if pi == p.len() {
            return false;
        }
    }

    let x = f.as_bytes()[*f_begin];

    loop {
        let mut first = p[pi];
        pi += 1;
        if first == b']' {
            break;
        }
        if pi == p.len() {
            return false;
        }
        if first == b'\\' {
            first = p[pi];
            pi += 1;
            if pi == p.len() {
                return false;
            }
        }

        if p[pi] != b'-' {
            matched = matched || first == x;
            continue;
        }

        pi += 1;
        if pi == p.len() {
            return false;
        }
        let mut second = p[pi];
        pi += 1;
        if second == b']' {
            matched = matched || first == x || x == b'-';
            break;
        }
        if pi == p.len() {
            return false;
        }
        if second == b'\\' {
            second = p[pi];
            pi += 1;
            if pi == p.len() {
                return false;
            }
        }
        matched = matched || (first <= x && x <= second);
    }

    // A range only ever matches a single-codepoint cluster.
    let fi = end_of_char(f, *f_begin);
    if f.get(*f_begin..fi).is_some_and(|cluster| cluster.chars().nth(1).is_some()) {
        matched = false;
    }

    *p_begin = pi;
    *f_begin = fi;
    !prevent_match && matched != invert
}

/// Find the first unescaped glob character at or after `from`.
pub fn find_glob_char(pattern: &str, from: usize) -> Option<usize> {
    let bytes = pattern.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'[' | b']' | b'?' | b'*' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Drop the backslashes from an escaped, glob-free pattern segment.
pub fn glob_unescape(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(c);
        }
    }
    result
}

// Positions are byte offsets into a filename.

/// Skip to the end of the grapheme cluster starting at `i`.
fn end_of_char(f: &str, i: usize) -> usize {
    f.get(i..)
        .and_then(|rest| rest.graphemes(true).next())
        .map_or((i + 1).min(f.len()), |grapheme| i + grapheme.len())
}

/// True when `i` falls inside a grapheme cluster, after its first codepoint.
fn starts_with_combining(f: &str, i: usize) -> bool {
    if i == 0 || i >= f.len() || !f.is_char_boundary(i) {
        return false;
    }
    !f.grapheme_indices(true).any(|(offset, _)| offset == i)
}
