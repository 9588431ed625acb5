//! Strip markers for literal regions.
//!
//! Code fences, `<nowiki>`, and `<pre>` content is removed from the text
//! before any other pass runs and replaced by an opaque marker. Markers are
//! restored, with their content HTML-escaped, just before sanitisation.

use regex::Regex;
use std::sync::LazyLock;

/// The start of a strip marker.
const MARKER_PREFIX: &str = "\x7fUNIQ-";
/// The end of a strip marker.
const MARKER_SUFFIX: &str = "-QINU\x7f";

/// Removes the strip marker delimiter character from untrusted text so that
/// authors cannot forge a marker.
pub(super) fn remove_delimiters(text: &str) -> String {
    text.replace('\x7f', "")
}

/// Protected content.
#[derive(Clone, Debug)]
enum StripMarker {
    /// Content that is a block by itself and must not be wrapped in a
    /// paragraph.
    Block(String),
    /// Content that flows with the surrounding text.
    Inline(String),
}

impl StripMarker {
    /// The HTML to restore.
    fn html(&self) -> &str {
        match self {
            StripMarker::Block(html) | StripMarker::Inline(html) => html,
        }
    }
}

/// The protected regions of a single render.
#[derive(Debug, Default)]
pub(super) struct StripMarkers(Vec<StripMarker>);

impl StripMarkers {
    /// Replaces every literal region of `text` with a strip marker.
    pub fn extract(&mut self, text: &str) -> String {
        static NOWIKI: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?is)<nowiki\s*/>|<nowiki\s*>(.*?)</nowiki\s*>").unwrap()
        });
        static PRE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?is)<pre(?:\s[^>]*)?>(.*?)</pre\s*>").unwrap());

        let text = self.extract_fences(text);
        let text = NOWIKI.replace_all(&text, |caps: &regex::Captures<'_>| {
            caps.get(1).map_or_else(String::new, |content| {
                self.push_inline(html_escape::encode_text(content.as_str()).into_owned())
            })
        });
        PRE.replace_all(&text, |caps: &regex::Captures<'_>| {
            let content = html_escape::encode_text(&caps[1]);
            self.push_block(format!("<pre>{content}</pre>"))
        })
        .into_owned()
    }

    /// Returns true if the whole line is one block strip marker.
    pub fn is_block(&self, line: &str) -> bool {
        self.index_of(line)
            .and_then(|index| self.0.get(index))
            .is_some_and(|marker| matches!(marker, StripMarker::Block(_)))
    }

    /// Protects inline HTML.
    pub fn push_inline(&mut self, html: String) -> String {
        self.push(StripMarker::Inline(html))
    }

    /// Protects block HTML.
    pub fn push_block(&mut self, html: String) -> String {
        self.push(StripMarker::Block(html))
    }

    /// Replaces every strip marker in `text` with its content.
    pub fn unstrip(&self, text: &str) -> String {
        static MARKER: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\x7fUNIQ-([0-9]+)-QINU\x7f").unwrap());

        if !text.contains(MARKER_PREFIX) {
            return text.to_string();
        }

        MARKER
            .replace_all(text, |caps: &regex::Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.0.get(index))
                    .map_or("", StripMarker::html)
                    .to_string()
            })
            .into_owned()
    }

    /// Replaces fenced code blocks with block strip markers. A fence without
    /// a closing line runs to the end of the text.
    fn extract_fences(&mut self, text: &str) -> String {
        if !text.contains("```") {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut lines = text.split_inclusive('\n');
        while let Some(line) = lines.next() {
            let trimmed = line.trim();
            let Some(info) = trimmed.strip_prefix("```") else {
                out += line;
                continue;
            };

            // ```one line of code```
            if let Some(code) = info.strip_suffix("```")
                && !code.is_empty()
            {
                out += &self.push_code(None, code);
                out += line_ending(line);
                continue;
            }

            let language = info.trim();
            let language = (!language.is_empty()
                && language
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
            .then_some(language);

            let mut code = String::new();
            let mut ending = "";
            for line in lines.by_ref() {
                if line.trim().starts_with("```") {
                    ending = line_ending(line);
                    break;
                }
                code += line;
            }
            if code.ends_with('\n') {
                code.pop();
                if code.ends_with('\r') {
                    code.pop();
                }
            }
            out += &self.push_code(language, &code);
            out += ending;
        }
        out
    }

    /// Protects a code block.
    fn push_code(&mut self, language: Option<&str>, code: &str) -> String {
        let code = html_escape::encode_text(code);
        let html = if let Some(language) = language {
            format!(r#"<pre><code class="language-{language}">{code}</code></pre>"#)
        } else {
            format!("<pre><code>{code}</code></pre>")
        };
        self.push_block(html)
    }

    /// Adds a marker and returns its text.
    fn push(&mut self, marker: StripMarker) -> String {
        let index = self.0.len();
        self.0.push(marker);
        format!("{MARKER_PREFIX}{index}{MARKER_SUFFIX}")
    }

    /// Returns the index of the marker if `text` is exactly one strip marker.
    fn index_of(&self, text: &str) -> Option<usize> {
        text.strip_prefix(MARKER_PREFIX)?
            .strip_suffix(MARKER_SUFFIX)?
            .parse()
            .ok()
    }
}

/// Returns the line terminator of a line, if it has one.
fn line_ending(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences() {
        let mut markers = StripMarkers::default();
        let text = markers.extract("before\n```rust\nlet x = {{y}};\n<b>\n```\nafter");
        assert_eq!(text, "before\n\x7fUNIQ-0-QINU\x7f\nafter");
        assert!(markers.is_block("\x7fUNIQ-0-QINU\x7f"));
        assert_eq!(
            markers.unstrip(&text),
            "before\n<pre><code class=\"language-rust\">let x = {{y}};\n&lt;b&gt;</code></pre>\nafter"
        );
    }

    #[test]
    fn unterminated_fence() {
        let mut markers = StripMarkers::default();
        let text = markers.extract("a\n```\n[[x]]\n");
        assert_eq!(text, "a\n\x7fUNIQ-0-QINU\x7f");
        assert_eq!(markers.unstrip(&text), "a\n<pre><code>[[x]]</code></pre>");
    }

    #[test]
    fn nowiki_and_pre() {
        let mut markers = StripMarkers::default();
        let text = markers.extract("x <nowiki>''{{a}}''</nowiki> y<nowiki/>z\n<PRE>a < b</pre>");
        assert_eq!(text, "x \x7fUNIQ-0-QINU\x7f yz\n\x7fUNIQ-1-QINU\x7f");
        assert!(!markers.is_block("\x7fUNIQ-0-QINU\x7f"));
        assert!(markers.is_block("\x7fUNIQ-1-QINU\x7f"));
        assert_eq!(
            markers.unstrip(&text),
            "x ''{{a}}'' yz\n<pre>a &lt; b</pre>"
        );
    }

    #[test]
    fn forged_markers() {
        assert_eq!(remove_delimiters("\x7fUNIQ-0-QINU\x7f"), "UNIQ-0-QINU");
        let markers = StripMarkers::default();
        assert_eq!(markers.unstrip("a\x7fUNIQ-9-QINU\x7fb"), "ab");
    }
}
