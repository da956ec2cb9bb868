use std::ops::Range;

use crate::template::MarkupRange;
use crate::version::Epoch;

/// One argument of a template call: unexpanded markup at the call site.
pub type TemplateArg = MarkupRange;

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\u{b}' | '\u{c}' | '\r')
}

/// Split the last argument at its first run of whitespace until there are
/// as many arguments as parameters, or nothing left to split.
pub fn break_arguments(args: &mut Vec<TemplateArg>, params: usize) {
    while args.len() < params {
        let Some(last) = args.last() else {
            break;
        };
        let text = last.as_str();
        let Some(l_pos) = text.find(is_space) else {
            break;
        };
        let Some(r_off) = text[l_pos..].find(|c| !is_space(c)) else {
            break;
        };
        let r_pos = l_pos + r_off;

        let start = last.range.start;
        let end = last.range.end;
        let second = MarkupRange::new(last.file, last.text.clone(), start + r_pos..end);
        if let Some(last) = args.last_mut() {
            last.range = start..start + l_pos;
        }
        args.push(second);
    }
}

/// Scan a call's argument list up to the `]` that closes the call.
///
/// Returns the offset of that `]` in `text` and the byte ranges of each
/// argument. Arguments are separated by `..` outside nested brackets. In the
/// 1.5 epoch a backslash escapes the following character, so `\]` neither
/// closes a bracket nor the call. `None` when the call is never closed.
pub fn scan_arguments(text: &str, epoch: Epoch) -> Option<(usize, Vec<Range<usize>>)> {
    let bytes = text.as_bytes();
    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if epoch >= Epoch::V1_5 => {
                i += 1;
                if let Some(c) = text[i..].chars().next() {
                    i += c.len_utf8();
                }
                continue;
            }
            b'[' => depth += 1,
            b']' if depth == 0 => {
                if i > 0 {
                    ranges.push(start..i);
                }
                return Some((i, ranges));
            }
            b']' => depth -= 1,
            b'.' if depth == 0 && bytes.get(i + 1) == Some(&b'.') => {
                ranges.push(start..i);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    None
}
