//! The final HTML allow-list.

use ammonia::Builder;
use phf::{phf_map, phf_set};
use regex::{Captures, Regex};
use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

/// Elements which are kept, with their allowed attributes.
static ALLOWED_TAGS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "a" => &["href", "rel", "target"],
    "abbr" => &[],
    "address" => &[],
    "b" => &[],
    "blockquote" => &[],
    "br" => &[],
    "caption" => &[],
    "cite" => &[],
    "code" => &[],
    "dd" => &[],
    "del" => &[],
    "div" => &[],
    "dl" => &[],
    "dt" => &[],
    "em" => &[],
    "figcaption" => &[],
    "figure" => &[],
    "h1" => &[],
    "h2" => &[],
    "h3" => &[],
    "h4" => &[],
    "h5" => &[],
    "h6" => &[],
    "hr" => &[],
    "i" => &[],
    "img" => &["src", "alt", "width", "height", "loading"],
    "ins" => &[],
    "li" => &[],
    "mark" => &[],
    "ol" => &["start", "type"],
    "p" => &[],
    "pre" => &[],
    "q" => &[],
    "s" => &[],
    "small" => &[],
    "span" => &[],
    "strong" => &[],
    "sub" => &[],
    "sup" => &[],
    "table" => &["border"],
    "tbody" => &[],
    "td" => &["colspan", "rowspan", "align", "scope"],
    "tfoot" => &[],
    "th" => &["colspan", "rowspan", "align", "scope"],
    "thead" => &[],
    "time" => &[],
    "tr" => &[],
    "u" => &[],
    "ul" => &[],
};

/// Elements which are removed along with everything inside them.
static DROPPED_WITH_CONTENT: phf::Set<&'static str> = phf_set! {
    "applet", "embed", "iframe", "math", "noembed", "noframes", "noscript",
    "object", "script", "select", "style", "svg", "template", "textarea",
    "title", "xmp",
};

/// Elements dropped with their content which never have a closing tag.
static VOID_TAGS: phf::Set<&'static str> = phf_set! { "embed" };

/// Elements whose tags are removed but whose content is kept.
static DROPPED: phf::Set<&'static str> = phf_set! {
    "base", "button", "form", "frame", "frameset", "input", "link", "meta",
};

/// Attributes allowed on every kept element.
const GLOBAL_ATTRIBUTES: &[&str] = &["class", "id", "title", "lang", "dir", "role"];

/// URL schemes allowed in `href`. `src` additionally rejects `mailto`.
const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// The `rel` added to absolute external anchors.
const EXTERNAL_REL: &str = "nofollow noopener";

static SANITIZER: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::empty();
    builder
        .tags(ALLOWED_TAGS.keys().copied().collect())
        .clean_content_tags(DROPPED_WITH_CONTENT.iter().copied().collect())
        .generic_attributes(GLOBAL_ATTRIBUTES.iter().copied().collect())
        .generic_attribute_prefixes(HashSet::from(["data-", "aria-"]))
        .tag_attributes(
            ALLOWED_TAGS
                .entries()
                .filter(|(_, attributes)| !attributes.is_empty())
                .map(|(tag, attributes)| (*tag, attributes.iter().copied().collect()))
                .collect::<HashMap<_, HashSet<_>>>(),
        )
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .url_relative(ammonia::UrlRelative::PassThrough)
        .link_rel(None)
        .strip_comments(true)
        .attribute_filter(|_, attribute, value| {
            if attribute == "src" && is_mailto(value) {
                None
            } else {
                Some(Cow::Borrowed(value))
            }
        });
    builder
});

/// Sanitises HTML against the allow-list.
///
/// Raw-text elements such as `<script>` are removed with their content, any
/// other element not on the allow-list is escaped so it appears as visible
/// text, and comments are removed. A raw-text element which is never closed
/// is escaped instead, so it cannot swallow the rest of the document. `href` and `src` must be relative or use
/// `http` or `https` (`href` may also use `mailto`). Sanitising already
/// sanitised HTML returns it unchanged.
pub fn sanitize(html: &str) -> String {
    let html = escape_unknown_tags(html);
    let html = SANITIZER.clean(&html).to_string();
    add_external_rel(&html).into_owned()
}

/// Escapes the opening `<` of every tag which is neither kept nor dropped, and
/// of every opening tag of an element dropped with its content which has no
/// closing tag after it.
fn escape_unknown_tags(html: &str) -> Cow<'_, str> {
    static TAG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<(/?)([A-Za-z][^\s/>]*)").unwrap());

    let lower = html.to_ascii_lowercase();
    TAG.replace_all(html, |caps: &Captures<'_>| {
        let name = caps[2].to_ascii_lowercase();
        let is_open = caps[1].is_empty();
        let keep = if DROPPED_WITH_CONTENT.contains(name.as_str()) {
            !is_open
                || VOID_TAGS.contains(name.as_str())
                || caps
                    .get(0)
                    .is_some_and(|tag| has_close_tag(&lower[tag.end()..], &name))
        } else {
            ALLOWED_TAGS.contains_key(name.as_str()) || DROPPED.contains(name.as_str())
        };

        if keep {
            caps[0].to_string()
        } else {
            format!("&lt;{}{}", &caps[1], &caps[2])
        }
    })
}

/// Returns true if the lower case text contains a closing tag for the named
/// element.
fn has_close_tag(lower: &str, name: &str) -> bool {
    let close = format!("</{name}");
    lower.match_indices(&close).any(|(index, _)| {
        lower[index + close.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == '>' || c == '/' || c.is_ascii_whitespace())
    })
}

/// Adds `rel` to anchors which link to an absolute `http(s)` URL and do not
/// already have one.
fn add_external_rel(html: &str) -> Cow<'_, str> {
    // Serialised attributes are always double-quoted with `"` escaped
    static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"<a((?:\s+[^\s"'>/=]+(?:="[^"]*")?)*)>"#).unwrap()
    });
    static EXTERNAL_HREF: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"(?i)\shref="(?:https?:)?//"#).unwrap());
    static REL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\srel[\s=]").unwrap());

    ANCHOR.replace_all(html, |caps: &Captures<'_>| {
        let attributes = &caps[1];
        if EXTERNAL_HREF.is_match(attributes) && !REL.is_match(attributes) {
            format!(r#"<a{attributes} rel="{EXTERNAL_REL}">"#)
        } else {
            caps[0].to_string()
        }
    })
}

/// Returns true if the URL uses the `mailto` scheme, ignoring the whitespace
/// and control characters that browsers also ignore.
fn is_mailto(url: &str) -> bool {
    let mut scheme = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take("mailto:".len())
        .collect::<String>();
    scheme.make_ascii_lowercase();
    scheme == "mailto:"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_text_elements() {
        assert_eq!(sanitize("<p>a<script>alert(1)</script>b</p>"), "<p>ab</p>");
        assert_eq!(
            sanitize("<p>a<STYLE>p { color: red }</STYLE>b</p>"),
            "<p>ab</p>"
        );
        assert_eq!(sanitize("<p>a<iframe src=\"//x\"></iframe>b</p>"), "<p>ab</p>");
        assert_eq!(sanitize("<p>a<embed src=\"/x.swf\">b</p>"), "<p>ab</p>");
    }

    #[test]
    fn unclosed_raw_text_elements() {
        assert_eq!(
            sanitize("<p>Use the <textarea> element.</p>\n<p>Second paragraph.</p>"),
            "<p>Use the &lt;textarea&gt; element.</p>\n<p>Second paragraph.</p>"
        );
        assert_eq!(
            sanitize("<p>a<script>x</script>b<SCRIPT>c</p><p>d</p>"),
            "<p>ab&lt;SCRIPT&gt;c</p><p>d</p>"
        );
        assert_eq!(
            sanitize("<p>a<title>b</titles></p>"),
            "<p>a&lt;title&gt;b&lt;/titles&gt;</p>"
        );
    }

    #[test]
    fn unknown_tags() {
        assert_eq!(
            sanitize("<blink>hi</blink>"),
            "&lt;blink&gt;hi&lt;/blink&gt;"
        );
        assert_eq!(sanitize("<form><span>x</span></form>"), "<span>x</span>");
    }

    #[test]
    fn attributes() {
        assert_eq!(
            sanitize(r#"<span style="color: red" class="c" onclick="evil()">t</span>"#),
            r#"<span class="c">t</span>"#
        );
        assert_eq!(
            sanitize(r#"<span data-id="1" aria-label="x">t</span>"#),
            r#"<span data-id="1" aria-label="x">t</span>"#
        );
        assert_eq!(
            sanitize(r#"<img src="/a.png" onerror="evil()">"#),
            r#"<img src="/a.png">"#
        );
    }

    #[test]
    fn urls() {
        assert_eq!(
            sanitize(r#"<a href="javascript:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize(r#"<a href="jav&#x61;script:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize(r#"<img src="data:text/html,x">"#),
            "<img>"
        );
        assert_eq!(sanitize(r#"<img src="mailto:a@b.c">"#), "<img>");
        assert_eq!(
            sanitize(r#"<a href="mailto:a@b.c">x</a>"#),
            r#"<a href="mailto:a@b.c">x</a>"#
        );
        assert_eq!(
            sanitize(r#"<a href="/wiki/prayer">x</a>"#),
            r#"<a href="/wiki/prayer">x</a>"#
        );
    }

    #[test]
    fn external_rel() {
        assert_eq!(
            sanitize(r#"<a href="https://example.com" class="external">x</a>"#),
            r#"<a href="https://example.com" class="external" rel="nofollow noopener">x</a>"#
        );
        assert_eq!(
            sanitize(r#"<a href="https://example.com" rel="me">x</a>"#),
            r#"<a href="https://example.com" rel="me">x</a>"#
        );
    }

    #[test]
    fn text() {
        assert_eq!(sanitize("a <!-- hidden --> b"), "a  b");
        assert_eq!(sanitize("1 < 2 & 3 > 2"), "1 &lt; 2 &amp; 3 &gt; 2");
    }

    #[test]
    fn idempotent() {
        for html in [
            "<p>a<script>alert(1)</script>b</p>",
            "<blink>hi</blink> & <b>bold</b> <wbr>",
            r#"<a href="https://example.com" title="a > b">x</a>"#,
            r#"<img src="/a.png" alt="&quot;quoted&quot;">"#,
            "<table><tr><td colspan=\"2\">x</td></tr></table>",
            "1 < 2 &amp; &lt;tag&gt; <!-- x",
            "<p>a <style> b</p><p>c</p>",
        ] {
            let once = sanitize(html);
            assert_eq!(sanitize(&once), once, "{html}");
        }
    }
}
