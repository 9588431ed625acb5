//! Scanning and encoding functions shared by more than one rendering pass.

use regex::Regex;
use std::sync::LazyLock;

/// Encodes section heading text into a format suitable for use as an element
/// ID and URL fragment.
pub fn anchor_encode(s: &str) -> String {
    static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
    let text = TAG.replace_all(s, "");
    let text = html_escape::decode_html_entities(&text);
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '<' | '>' | '&' | '#'))
        .collect()
}

/// Finds the end of a brace expression whose opening braces end just before
/// `start`. Returns the byte index of the first of `close` consecutive closing
/// braces which balance the expression.
///
/// Braces are counted individually, so `{{{a}}}` nested inside a `{{...}}`
/// expression is balanced by its own closing braces before the outer
/// expression can end.
pub fn find_close(text: &str, start: usize, close: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0_usize;
    let mut index = start;
    while let Some(offset) = memchr::memchr2(b'{', b'}', &bytes[index..]) {
        let at = index + offset;
        if bytes[at] == b'{' {
            depth += 1;
            index = at + 1;
        } else if depth == 0 {
            if bytes[at..].iter().take(close).filter(|b| **b == b'}').count() == close {
                return Some(at);
            }
            index = at + 1;
        } else {
            depth -= 1;
            index = at + 1;
        }
    }
    None
}

/// Splits text on `delimiter` characters which are not nested inside a brace
/// expression or a `[[...]]` link.
pub fn split_top_level(text: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut brace_depth = 0_usize;
    let mut link_depth = 0_usize;
    let mut part_start = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((index, c)) = iter.next() {
        match c {
            '{' => brace_depth += 1,
            '}' => brace_depth = brace_depth.saturating_sub(1),
            '[' if iter.next_if(|(_, c)| *c == '[').is_some() => link_depth += 1,
            ']' if link_depth > 0 && iter.next_if(|(_, c)| *c == ']').is_some() => {
                link_depth -= 1;
            }
            c if c == delimiter && brace_depth == 0 && link_depth == 0 => {
                parts.push(&text[part_start..index]);
                part_start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[part_start..]);
    parts
}

/// Finds the first top-level occurrence of `delimiter`, using the same nesting
/// rules as [`split_top_level`].
pub fn split_once_top_level(text: &str, delimiter: char) -> Option<(&str, &str)> {
    let mut parts = split_top_level(text, delimiter).into_iter();
    let first = parts.next()?;
    parts
        .next()
        .map(|_| (first, &text[first.len() + delimiter.len_utf8()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors() {
        assert_eq!(anchor_encode("  Five  Pillars "), "Five_Pillars");
        assert_eq!(anchor_encode("<b>Bold</b> &amp; brave"), "Bold__brave");
        assert_eq!(anchor_encode("🆕 Title"), "🆕_Title");
    }

    #[test]
    fn close_braces() {
        let text = "{{a|{{{b|c}}}}}x";
        assert_eq!(find_close(text, 2, 2), Some(13));
        let text = "{{{a|{{{b}}}}}}";
        assert_eq!(find_close(text, 3, 3), Some(12));
        assert_eq!(find_close("{{a", 2, 2), None);
        assert_eq!(find_close("{{a}b", 2, 2), None);
    }

    #[test]
    fn top_level_split() {
        assert_eq!(
            split_top_level("T|a|{{U|b|c}}|[[L|d]]|e=f", '|'),
            vec!["T", "a", "{{U|b|c}}", "[[L|d]]", "e=f"]
        );
        assert_eq!(split_top_level("", '|'), vec![""]);
        assert_eq!(split_once_top_level("a={{b|c=d}}", '='), Some(("a", "{{b|c=d}}")));
        assert_eq!(split_once_top_level("{{b|c=d}}", '='), None);
    }
}
