//! Wikitext tables.
//!
//! ```wikitext
//! {| class="data"
//! |+ Caption
//! ! Header !! Header
//! |-
//! | style="color: red" | Cell || Cell
//! continues the previous cell
//! |}
//! ```

use super::{State, document::inline};
use crate::common::split_once_top_level;

/// A table cell.
#[derive(Debug)]
struct Cell {
    /// Whether this is a header cell.
    header: bool,
    /// Raw attributes.
    attrs: String,
    /// Raw content.
    content: String,
}

/// Renders a table. `lines` starts with the `{|` line and excludes the `|}`
/// line.
pub(super) fn render(state: &mut State<'_>, lines: &[&str]) -> String {
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };

    let attrs = first.trim().trim_start_matches("{|").trim();
    let mut caption = None::<String>;
    let mut rows = vec![Vec::<Cell>::new()];

    for line in rest {
        let trimmed = line.trim_start();
        if let Some(text) = trimmed.strip_prefix("|+") {
            caption = Some(text.trim().to_string());
        } else if trimmed.starts_with("|-") {
            rows.push(Vec::new());
        } else if let Some(text) = trimmed.strip_prefix('!') {
            let row = current_row(&mut rows);
            for cell in text.split("!!").flat_map(|cell| cell.split("||")) {
                row.push(parse_cell(cell, true));
            }
        } else if let Some(text) = trimmed.strip_prefix('|') {
            let row = current_row(&mut rows);
            for cell in text.split("||") {
                row.push(parse_cell(cell, false));
            }
        } else if let Some(cell) = rows.last_mut().and_then(|row| row.last_mut()) {
            cell.content.push('\n');
            cell.content += line;
        } else if !trimmed.is_empty() {
            log::debug!("Dropping table text outside of a cell: {trimmed}");
        }
    }

    let mut out = String::from("<table");
    if attrs.is_empty() || !attrs.to_ascii_lowercase().contains("class") {
        out += r#" class="wiki-table""#;
    }
    if !attrs.is_empty() {
        out.push(' ');
        out += attrs;
    }
    out.push('>');

    if let Some(caption) = caption {
        out += "<caption>";
        out += &inline(state, &caption);
        out += "</caption>";
    }

    for row in rows.into_iter().filter(|row| !row.is_empty()) {
        out += "<tr>";
        for cell in row {
            let tag = if cell.header { "th" } else { "td" };
            out.push('<');
            out += tag;
            if !cell.attrs.is_empty() {
                out.push(' ');
                out += &cell.attrs;
            }
            out.push('>');
            out += &inline(state, cell.content.trim());
            out += "</";
            out += tag;
            out.push('>');
        }
        out += "</tr>";
    }

    out += "</table>";
    out
}

/// Returns the row that new cells are added to.
fn current_row(rows: &mut Vec<Vec<Cell>>) -> &mut Vec<Cell> {
    if rows.is_empty() {
        rows.push(Vec::new());
    }
    let last = rows.len() - 1;
    &mut rows[last]
}

/// Splits a cell into its attributes and content. Text before a top-level `|`
/// is only treated as attributes if it looks like attributes.
fn parse_cell(text: &str, header: bool) -> Cell {
    let (attrs, content) = match split_once_top_level(text, '|') {
        Some((attrs, content)) if attrs.contains('=') => (attrs.trim(), content),
        _ => ("", text),
    };
    Cell {
        header,
        attrs: attrs.to_string(),
        content: content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::MemoryDatabase,
        renderer::{RenderContext, Renderer},
    };

    fn render_table(source: &str) -> String {
        let config = Config::default();
        let db = MemoryDatabase::new();
        let renderer = Renderer::new(&config, &db);
        let ctx = RenderContext::new("Test", "Wiki");
        let mut state = State::new(&renderer, &ctx);
        let lines = source.lines().collect::<Vec<_>>();
        render(&mut state, &lines)
    }

    #[test]
    fn basic() {
        assert_eq!(
            render_table("{|\n|+ Pillars\n! Name !! Arabic\n|-\n| Prayer || ''Salah''"),
            r#"<table class="wiki-table"><caption>Pillars</caption><tr><th>Name</th><th>Arabic</th></tr><tr><td>Prayer</td><td><em>Salah</em></td></tr></table>"#
        );
    }

    #[test]
    fn attributes() {
        assert_eq!(
            render_table("{| class=\"data\"\n|-\n| colspan=\"2\" | Wide\n| [[A|b]]"),
            r#"<table class="data"><tr><td colspan="2">Wide</td><td>[[A|b]]</td></tr></table>"#
        );
        assert_eq!(
            render_table("{| border=\"1\"\n| a"),
            r#"<table class="wiki-table" border="1"><tr><td>a</td></tr></table>"#
        );
    }

    #[test]
    fn continuation() {
        assert_eq!(
            render_table("{|\n| first\nsecond line\n|-"),
            r#"<table class="wiki-table"><tr><td>first
second line</td></tr></table>"#
        );
    }
}
