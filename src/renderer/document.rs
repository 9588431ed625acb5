//! Block and inline markup.
//!
//! The document is processed one line at a time. Each line is classified as a
//! heading, rule, list item, quote, table start, blank, raw block, or
//! paragraph text, and consecutive lines of the same kind are grouped into one
//! container. Inline markup is converted inside every container.

use super::{State, table};
use regex::Regex;
use std::sync::LazyLock;

/// Converts block and inline markup in `text` to HTML.
pub(super) fn transform(state: &mut State<'_>, text: &str) -> String {
    let lines = text.lines().collect::<Vec<_>>();
    let mut doc = Document::default();

    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        let trimmed = line.trim();
        index += 1;

        if trimmed.starts_with("{|") {
            doc.flush(state);
            let start = index - 1;
            let end = lines[index..]
                .iter()
                .position(|line| line.trim_start().starts_with("|}"))
                .map_or(lines.len(), |offset| index + offset);
            let html = table::render(state, &lines[start..end]);
            doc.push_block(&html);
            index = end + 1;
        } else if let Some((level, content)) = heading(line) {
            doc.flush(state);
            let html = render_heading(state, level, content);
            doc.push_block(&html);
        } else if RULE.is_match(line) {
            doc.flush(state);
            doc.push_block("<hr>");
        } else if let Some(caps) = LIST_ITEM.captures(line) {
            let kind = if caps.get(1).is_some() {
                ListKind::Unordered
            } else {
                ListKind::Ordered(caps[2].parse().unwrap_or(1))
            };
            doc.push_list_item(state, kind, &caps[3]);
        } else if let Some(caps) = QUOTE.captures(line) {
            doc.push_quote(state, &caps[1]);
        } else if trimmed.is_empty() {
            doc.flush(state);
        } else if state.strip_markers.is_block(trimmed) {
            doc.flush(state);
            doc.push_block(trimmed);
        } else if BLOCK_TAG.is_match(trimmed) {
            doc.flush(state);
            let html = inline(state, line);
            doc.push_block(&html);
        } else {
            doc.push_text(state, line);
        }
    }

    doc.flush(state);
    doc.out
}

/// `---`
static RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*-{3,}\s*$").unwrap());

/// `- item`, `* item`, or `1. item`
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:([-*])|([0-9]{1,9})\.)\s+(.*)$").unwrap());

/// `> quote`
static QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^>\s?(.*)$").unwrap());

/// A line that starts with a block-level HTML tag.
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^</?(?:address|blockquote|caption|center|dd|div|dl|dt|figcaption|figure|h[1-6]|hr|li|ol|p|pre|table|tbody|td|tfoot|th|thead|tr|ul|references)\b",
    )
    .unwrap()
});

/// The kind of a list container.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ListKind {
    /// `<ul>`.
    Unordered,
    /// `<ol>`, with the number of the first item.
    Ordered(u32),
}

impl ListKind {
    /// Returns true if an item of kind `other` continues a list of this kind.
    fn continues(self, other: ListKind) -> bool {
        matches!(
            (self, other),
            (ListKind::Unordered, ListKind::Unordered) | (ListKind::Ordered(_), ListKind::Ordered(_))
        )
    }
}

/// Pending block containers.
#[derive(Debug, Default)]
struct Document {
    /// Finished HTML.
    out: String,
    /// Items of the open list.
    list: Option<(ListKind, Vec<String>)>,
    /// Lines of the open paragraph.
    paragraph: Vec<String>,
    /// Lines of the open blockquote.
    quote: Vec<String>,
}

impl Document {
    /// Closes every open container.
    fn flush(&mut self, state: &mut State<'_>) {
        self.flush_paragraph(state);
        self.flush_list();
        self.flush_quote(state);
    }

    /// Closes the open list.
    fn flush_list(&mut self) {
        let Some((kind, items)) = self.list.take() else {
            return;
        };
        let (open, close) = match kind {
            ListKind::Unordered => ("<ul>".to_string(), "</ul>"),
            ListKind::Ordered(1) => ("<ol>".to_string(), "</ol>"),
            ListKind::Ordered(start) => (format!(r#"<ol start="{start}">"#), "</ol>"),
        };
        self.out += &open;
        for item in items {
            self.out += "<li>";
            self.out += &item;
            self.out += "</li>";
        }
        self.out += close;
        self.out.push('\n');
    }

    /// Closes the open paragraph.
    fn flush_paragraph(&mut self, state: &mut State<'_>) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = self.paragraph.join("\n");
        self.paragraph.clear();
        self.out += "<p>";
        self.out += &inline(state, text.trim());
        self.out += "</p>\n";
    }

    /// Closes the open blockquote.
    fn flush_quote(&mut self, state: &mut State<'_>) {
        if self.quote.is_empty() {
            return;
        }
        let text = self.quote.join("\n");
        self.quote.clear();
        self.out += "<blockquote><p>";
        self.out += &inline(state, text.trim());
        self.out += "</p></blockquote>\n";
    }

    /// Emits finished block HTML.
    fn push_block(&mut self, html: &str) {
        self.out += html;
        self.out.push('\n');
    }

    /// Adds a list item, starting a new list if the kind changed.
    fn push_list_item(&mut self, state: &mut State<'_>, kind: ListKind, content: &str) {
        self.flush_paragraph(state);
        self.flush_quote(state);
        if self
            .list
            .as_ref()
            .is_some_and(|(current, _)| !current.continues(kind))
        {
            self.flush_list();
        }
        let item = inline(state, content.trim());
        self.list
            .get_or_insert_with(|| (kind, Vec::new()))
            .1
            .push(item);
    }

    /// Adds a blockquote line.
    fn push_quote(&mut self, state: &mut State<'_>, content: &str) {
        self.flush_paragraph(state);
        self.flush_list();
        self.quote.push(content.to_string());
    }

    /// Adds a paragraph line.
    fn push_text(&mut self, state: &mut State<'_>, line: &str) {
        self.flush_list();
        self.flush_quote(state);
        self.paragraph.push(line.to_string());
    }
}

/// Parses a heading line. Returns the level and content.
fn heading(line: &str) -> Option<(u8, &str)> {
    static HASH: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.+?)[ \t]*$").unwrap());
    static EQUALS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(={1,6})[ \t]*(.+?)[ \t]*(={1,6})[ \t]*$").unwrap());

    if let Some(caps) = HASH.captures(line) {
        let level = caps[1].len();
        let content = caps.get(2)?.as_str();
        return Some((u8::try_from(level).ok()?, content));
    }

    let caps = EQUALS.captures(line)?;
    let level = caps[1].len().min(caps[3].len());
    let content = caps.get(2)?.as_str();
    Some((u8::try_from(level).ok()?, content))
}

/// Renders a heading and records it in the outline.
fn render_heading(state: &mut State<'_>, level: u8, content: &str) -> String {
    let html = inline(state, content);
    let id = state.outline.push(level, plain_text(content));
    format!(
        r#"<h{level} id="{}">{html}</h{level}>"#,
        html_escape::encode_double_quoted_attribute(&id)
    )
}

/// Converts heading markup to plain text for the outline.
fn plain_text(content: &str) -> String {
    static LINK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\[(?:[^\[\]|]*\|)?([^\[\]|]*)\]\]").unwrap());
    static MARKUP: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]*>|'{2,}|\*\*|~~|`").unwrap());

    let text = LINK.replace_all(content, "$1");
    let text = MARKUP.replace_all(&text, "");
    html_escape::decode_html_entities(text.trim()).into_owned()
}

/// Converts inline markup to HTML.
///
/// Inline code is protected first so that its content is never treated as
/// emphasis.
pub(super) fn inline(state: &mut State<'_>, text: &str) -> String {
    static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
    static STRONG_EMPHASIS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"'''''(.+?)'''''").unwrap());
    static STRONG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|'''(.+?)'''").unwrap());
    static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"''(.+?)''|\*([^*\s](?:[^*\n]*[^*\s])?)\*").unwrap()
    });
    static STRIKE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~(.+?)~~").unwrap());

    let text = if text.contains('`') {
        let markers = &mut state.strip_markers;
        CODE.replace_all(text, |caps: &regex::Captures<'_>| {
            markers.push_inline(format!(
                "<code>{}</code>",
                html_escape::encode_text(&caps[1])
            ))
        })
        .into_owned()
    } else {
        text.to_string()
    };

    let text = STRONG_EMPHASIS.replace_all(&text, "<strong><em>$1</em></strong>");
    let text = STRONG.replace_all(&text, |caps: &regex::Captures<'_>| {
        format!("<strong>{}</strong>", either(caps))
    });
    let text = EMPHASIS.replace_all(&text, |caps: &regex::Captures<'_>| {
        format!("<em>{}</em>", either(caps))
    });
    STRIKE.replace_all(&text, "<s>$1</s>").into_owned()
}

/// Returns whichever of the first two capture groups matched.
fn either<'t>(caps: &regex::Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::MemoryDatabase,
        renderer::{RenderContext, Renderer},
    };

    fn with_state<R>(f: impl FnOnce(&mut State<'_>) -> R) -> R {
        let config = Config::default();
        let db = MemoryDatabase::new();
        let renderer = Renderer::new(&config, &db);
        let ctx = RenderContext::new("Test", "Wiki");
        let mut state = State::new(&renderer, &ctx);
        f(&mut state)
    }

    #[test]
    fn headings() {
        assert_eq!(heading("# 🆕 Title"), Some((1, "🆕 Title")));
        assert_eq!(heading("###### Six"), Some((6, "Six")));
        assert_eq!(heading("####### Seven"), None);
        assert_eq!(heading("#hashtag"), None);
        assert_eq!(heading("== Wiki =="), Some((2, "Wiki")));
        assert_eq!(heading("=== Uneven =="), Some((2, "Uneven")));
        assert_eq!(heading("a == b"), None);
    }

    #[test]
    fn heading_ids() {
        with_state(|state| {
            let html = transform(state, "## Five ''Pillars''\n## Five Pillars");
            assert_eq!(
                html,
                "<h2 id=\"Five_Pillars\">Five <em>Pillars</em></h2>\n<h2 id=\"Five_Pillars_2\">Five Pillars</h2>\n"
            );
        });
    }

    #[test]
    fn emphasis() {
        with_state(|state| {
            assert_eq!(
                inline(state, "**a** '''b''' ''c'' *d* ~~e~~"),
                "<strong>a</strong> <strong>b</strong> <em>c</em> <em>d</em> <s>e</s>"
            );
            assert_eq!(inline(state, "2 * 3 * 4"), "2 * 3 * 4");
            assert_eq!(
                inline(state, "'''''both'''''"),
                "<strong><em>both</em></strong>"
            );
            let html = inline(state, "`**not bold**`");
            assert_eq!(
                state.strip_markers.unstrip(&html),
                "<code>**not bold**</code>"
            );
        });
    }

    #[test]
    fn lists() {
        with_state(|state| {
            assert_eq!(
                transform(state, "- a\n* b\n1. c\n2. d\n\n3. e"),
                "<ul><li>a</li><li>b</li></ul>\n<ol><li>c</li><li>d</li></ol>\n<ol start=\"3\"><li>e</li></ol>\n"
            );
        });
    }

    #[test]
    fn blocks() {
        with_state(|state| {
            assert_eq!(
                transform(state, "para\nline two\n---\n> quoted\n> more\n<div>raw</div>\nend"),
                "<p>para\nline two</p>\n<hr>\n<blockquote><p>quoted\nmore</p></blockquote>\n<div>raw</div>\n<p>end</p>\n"
            );
        });
    }
}
