//! Links, file embeds, and categories.

use super::{Result, State, image, try_replace_all};
use crate::{
    common::anchor_encode,
    config::{Config, DEFAULT_CONFIG},
    title::{Namespace, Title, canonical, url_encode},
};
use regex::Regex;
use std::sync::LazyLock;

/// The maximum number of passes over nested wiki links.
const MAX_LINK_PASSES: usize = 8;

/// The maximum number of redirects followed for one link.
const MAX_REDIRECTS: usize = 2;

/// Resolves every `[[...]]` wiki link, then every external link.
///
/// Wiki links are resolved innermost-first: each pass replaces links which do
/// not contain other links, so a link inside a file caption is rendered before
/// the file link that contains it.
pub(super) fn resolve_links(state: &mut State<'_>, text: &str) -> Result<String> {
    static WIKILINK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\[([^\[\]]*)\]\]([a-z]+)?").unwrap());

    let mut text = text.to_string();
    for _ in 0..MAX_LINK_PASSES {
        if !text.contains("[[") {
            break;
        }
        let mut changed = false;
        text = try_replace_all(&WIKILINK, &text, |caps| {
            changed = true;
            render_wikilink(state, &caps[1], caps.get(2).map_or("", |m| m.as_str()))
        })?;
        if !changed {
            break;
        }
    }

    Ok(render_external_links(&text))
}

/// Renders a wikilink.
fn render_wikilink(state: &mut State<'_>, inner: &str, trail: &str) -> Result<String> {
    let (target, label) = inner
        .split_once('|')
        .map_or((inner, None), |(target, label)| (target, Some(label)));
    let title = Title::new(target, state.config());

    if title.text().is_empty() && title.fragment().is_none() {
        return Ok(format!("&#91;&#91;{inner}&#93;&#93;{trail}"));
    }

    if !title.is_colon() {
        match title.namespace() {
            Namespace::Category => {
                state.categories.insert(title.text().to_string());
                return Ok(trail.to_string());
            }
            Namespace::File => {
                let arguments = label.map_or_else(Vec::new, |label| label.split('|').collect());
                return Ok(image::render_image(state, &title, &arguments)? + trail);
            }
            _ => {}
        }
    }

    let display = label
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| target.trim().trim_start_matches(':').trim_start());
    render_internal_link(state, title, display, trail)
}

/// Renders an internal link.
fn render_internal_link(
    state: &mut State<'_>,
    mut title: Title,
    display: &str,
    trail: &str,
) -> Result<String> {
    if title.text().is_empty() {
        let href = LinkKind::Internal(title).to_href(state.config());
        return Ok(format!(
            r#"<a href="{href}" class="wiki-link">{display}{trail}</a>"#
        ));
    }

    resolve_redirects(state, &mut title)?;
    let name = title.text().to_string();
    let exists = state.renderer.articles.exists(&name)?;
    let class = if exists {
        "wiki-link"
    } else {
        state.red_links.insert(&name);
        "wiki-link missing"
    };

    let href = LinkKind::Internal(title).to_href(state.config());
    Ok(format!(
        r#"<a href="{href}" class="{class}" title="{}">{display}{trail}</a>"#,
        html_escape::encode_double_quoted_attribute(&name)
    ))
}

/// Follows redirects from the title, stopping early at a redirect loop.
fn resolve_redirects(state: &mut State<'_>, title: &mut Title) -> Result {
    let mut seen = vec![title.text().to_string()];
    for _ in 0..MAX_REDIRECTS {
        let Some(target) = state.renderer.redirects.resolve(title.text())? else {
            break;
        };
        let target = canonical(&target);
        if seen.contains(&target) {
            log::warn!("Redirect loop at '{title}'");
            break;
        }
        title.redirect_to(&target);
        seen.push(target);
    }
    Ok(())
}

/// Renders markdown images, markdown links, and bracketed external links.
fn render_external_links(text: &str) -> String {
    static MD_IMAGE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[([^\[\]\n]*)\]\(([^()\s]+)\)").unwrap());
    static MD_LINK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\[\]\n]+)\]\(([^()\s]+)\)").unwrap());
    static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"\[((?:https?:)?//[^\s\[\]<>"]+)(?:[ \t]+([^\]\n]*))?\]"#).unwrap()
    });

    if !text.contains('[') {
        return text.to_string();
    }

    let text = MD_IMAGE.replace_all(text, |caps: &regex::Captures<'_>| {
        format!(
            r#"<img src="{}" alt="{}">"#,
            LinkKind::External(&caps[2]).to_href(&DEFAULT_CONFIG),
            html_escape::encode_double_quoted_attribute(&caps[1])
        )
    });
    let text = MD_LINK.replace_all(&text, |caps: &regex::Captures<'_>| {
        external_anchor(&caps[2], &caps[1])
    });
    let mut ordinal = 0;
    BRACKETED
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            if let Some(label) = caps.get(2).filter(|label| !label.as_str().trim().is_empty()) {
                external_anchor(&caps[1], label.as_str().trim())
            } else {
                ordinal += 1;
                external_anchor(&caps[1], &format!("[{ordinal}]"))
            }
        })
        .into_owned()
}

/// Renders an anchor for an external link.
fn external_anchor(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{}" class="external">{label}</a>"#,
        LinkKind::External(url).to_href(&DEFAULT_CONFIG)
    )
}

/// A kind of link to render.
#[derive(Debug)]
enum LinkKind<'a> {
    /// An external link.
    External(&'a str),
    /// An internal link.
    Internal(Title),
}

impl LinkKind<'_> {
    /// Converts the link to a URI-encoded string suitable for use in an HTML
    /// `href` attribute.
    fn to_href(&self, config: &Config) -> String {
        match self {
            LinkKind::External(url) => {
                html_escape::encode_double_quoted_attribute(url).into_owned()
            }
            LinkKind::Internal(title) => {
                let fragment = title
                    .fragment()
                    .map(|fragment| format!("#{}", anchor_encode(fragment)))
                    .unwrap_or_default();
                let fragment = html_escape::encode_double_quoted_attribute(&fragment);
                if title.text().is_empty() {
                    fragment.into_owned()
                } else {
                    format!(
                        "{}{}{fragment}",
                        config.article_path,
                        url_encode(&title.slug())
                    )
                }
            }
        }
    }
}
