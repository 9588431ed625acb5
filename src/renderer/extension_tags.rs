//! Citation references.
//! <https://www.mediawiki.org/wiki/Special:MyLanguage/Extension:Cite>

use super::{Reference, Result, State};
use core::fmt::Write as _;
use regex::Regex;
use std::sync::LazyLock;

/// Stored citation references, in order of appearance.
#[derive(Debug, Default)]
pub(crate) struct References(Vec<Reference>);

impl References {
    /// Adds a reference with the given text. Returns the page-unique ordinal of
    /// the reference.
    fn insert(&mut self, html: &str) -> usize {
        let ordinal = self.0.len() + 1;
        self.0.push(Reference {
            ordinal,
            html: html.to_string(),
        });
        ordinal
    }

    /// Returns true if there are no references.
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the references.
    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.0.iter()
    }
}

/// Replaces every `<ref>` with a numbered footnote marker and renders the
/// collected bibliography.
///
/// The bibliography goes where the first `<references/>` tag is. Any later
/// `<references/>` tags are removed. If there are references but no tag, the
/// bibliography is appended to the document.
pub(super) fn collect_references(state: &mut State<'_>, text: &str) -> Result<String> {
    static REF: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<ref(?:\s[^>]*[^/>])?\s*>(.*?)</ref\s*>").unwrap()
    });
    static SELF_CLOSING: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<ref(?:\s[^>]*)?/>").unwrap());
    static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)<references\s*/>|<references\s*>\s*</references\s*>").unwrap()
    });

    let text = REF.replace_all(text, |caps: &regex::Captures<'_>| {
        let id = state.references.insert(caps[1].trim());
        format!(
            r##"<sup class="reference" id="cite-ref-{id}"><a href="#cite-note-{id}">[{id}]</a></sup>"##
        )
    });

    // Named references are not deduplicated, so a reuse has nothing to show
    let text = SELF_CLOSING.replace_all(&text, "");

    let mut bibliography = if state.references.is_empty() {
        None
    } else {
        Some(render_bibliography(state)?)
    };
    let had_placeholder = PLACEHOLDER.is_match(&text);
    let mut text = PLACEHOLDER
        .replace_all(&text, |_: &regex::Captures<'_>| {
            bibliography.take().unwrap_or_default()
        })
        .into_owned();

    if !had_placeholder && let Some(bibliography) = bibliography {
        text.push('\n');
        text += &bibliography;
    }
    Ok(text)
}

/// Renders the numbered bibliography.
fn render_bibliography(state: &State<'_>) -> Result<String> {
    let mut out = format!(
        r#"<div class="wiki-references"><h2>{}</h2><ol class="references">"#,
        html_escape::encode_text(&state.config().references_heading)
    );
    for reference in state.references.iter() {
        let id = reference.ordinal;
        write!(
            out,
            r##"<li id="cite-note-{id}"><a href="#cite-ref-{id}">^</a> {}</li>"##,
            reference.html
        )?;
    }
    out += "</ol></div>";
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::MemoryDatabase,
        renderer::{RenderContext, Renderer},
    };

    fn collect(text: &str) -> (String, Vec<Reference>) {
        let config = Config::default();
        let db = MemoryDatabase::new();
        let renderer = Renderer::new(&config, &db);
        let ctx = RenderContext::new("Test", "Wiki");
        let mut state = State::new(&renderer, &ctx);
        let html = collect_references(&mut state, text).unwrap();
        (html, state.references.iter().cloned().collect())
    }

    #[test]
    fn numbering() {
        let (html, references) = collect(
            r#"<p>A<ref>One</ref> B<ref name="x"> Two </ref> C<REF>Three</REF><ref name="x" /></p>"#,
        );
        assert_eq!(
            references.iter().map(|r| r.ordinal).collect::<Vec<_>>(),
            [1, 2, 3]
        );
        assert_eq!(references[1].html, "Two");
        assert!(!html.contains("<ref"));
        assert!(html.starts_with(
            r##"<p>A<sup class="reference" id="cite-ref-1"><a href="#cite-note-1">[1]</a></sup> B"##
        ));
        assert!(html.ends_with(
            r##"<li id="cite-note-3"><a href="#cite-ref-3">^</a> Three</li></ol></div>"##
        ));
    }

    #[test]
    fn placeholder() {
        let (html, _) = collect("<p>A<ref>One</ref></p>\n<references/>\n<p>B</p>\n<references />");
        assert_eq!(
            html,
            r##"<p>A<sup class="reference" id="cite-ref-1"><a href="#cite-note-1">[1]</a></sup></p>
<div class="wiki-references"><h2>References</h2><ol class="references"><li id="cite-note-1"><a href="#cite-ref-1">^</a> One</li></ol></div>
<p>B</p>
"##
        );
    }

    #[test]
    fn no_references() {
        let (html, references) = collect("<p>Plain</p>\n<references/>");
        assert!(references.is_empty());
        assert_eq!(html, "<p>Plain</p>\n");
    }
}
