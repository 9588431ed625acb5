//! Code for handling embedded files.

use super::{Result, State};
use crate::title::Title;
use core::fmt::Write as _;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters which are percent-encoded in a stored file name.
const FILE_ALPHABET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Options for rendering an image node.
#[derive(Debug, Default)]
struct Options<'a> {
    /// Whether the image is rendered as a captioned thumbnail. Set by 'thumb',
    /// 'thumbnail', 'frame', or 'framed'.
    thumb: bool,
    /// Horizontal image alignment. One of 'left', 'right', 'center', or 'none'.
    align: Option<&'a str>,
    /// The requested width.
    width: Option<u32>,
    /// The requested height.
    height: Option<u32>,
    /// Alternative text.
    alt: Option<&'a str>,
    /// The caption. Rendered below a thumbnail, and otherwise as a tooltip.
    caption: Option<&'a str>,
}

impl<'a> Options<'a> {
    /// Parses options from the arguments of a file link.
    fn new(arguments: &[&'a str]) -> Self {
        let mut options = Self::default();
        for &argument in arguments {
            let value = argument.trim();
            if let Some(alt) = value.strip_prefix("alt=") {
                options.alt = Some(alt.trim());
            } else if let Some(size) = value.strip_suffix("px")
                && let Some((width, height)) = parse_size(size.trim_end())
            {
                options.width = width;
                options.height = height;
            } else {
                match value {
                    "thumb" | "thumbnail" | "frame" | "framed" => options.thumb = true,
                    "frameless" | "border" => {}
                    "left" | "right" | "center" | "none" => options.align = Some(value),
                    "" => {}
                    _ => options.caption = Some(value),
                }
            }
        }
        options
    }
}

/// Parses `W`, `WxH`, or `xH`.
fn parse_size(size: &str) -> Option<(Option<u32>, Option<u32>)> {
    let (width, height) = size.split_once('x').unwrap_or((size, ""));
    let width = (!width.is_empty())
        .then(|| width.parse::<u32>())
        .transpose()
        .ok()?;
    let height = (!height.is_empty())
        .then(|| height.parse::<u32>())
        .transpose()
        .ok()?;
    (width.is_some() || height.is_some()).then_some((width, height))
}

/// Renders a file link.
pub(super) fn render_image(
    state: &mut State<'_>,
    title: &Title,
    arguments: &[&str],
) -> Result<String> {
    let name = title.text();
    let Some(file) = state.renderer.files.find_by_name(name)? else {
        log::warn!("No file found for '{name}'");
        return Ok(format!(
            r#"<span class="missing-file">[File not found: {}]</span>"#,
            html_escape::encode_text(name)
        ));
    };

    let options = Options::new(arguments);
    let src = format!(
        "{}{}",
        state.config().file_path,
        utf8_percent_encode(&file.stored_name, &FILE_ALPHABET)
    );
    let alt = options
        .alt
        .or(file.description.as_deref())
        .unwrap_or(name);

    let mut img = format!(
        r#"<img src="{}" alt="{}""#,
        html_escape::encode_double_quoted_attribute(&src),
        html_escape::encode_double_quoted_attribute(alt)
    );
    if options.thumb {
        img += r#" class="thumb-image""#;
    } else if let Some(align) = options.align {
        write!(img, r#" class="align-{align}""#)?;
    }
    // An explicit size replaces the intrinsic size entirely
    let (width, height) = if options.width.is_some() || options.height.is_some() {
        (options.width, options.height)
    } else {
        (file.width, file.height)
    };
    if let Some(width) = width {
        write!(img, r#" width="{width}""#)?;
    }
    if let Some(height) = height {
        write!(img, r#" height="{height}""#)?;
    }

    Ok(if options.thumb {
        let align = options.align.unwrap_or("right");
        // Captions were already expanded and may contain rendered links
        let caption = options.caption.unwrap_or_default();
        format!(
            r#"<div class="wiki-thumbnail thumb-{align}">{img}><div class="thumb-caption">{caption}</div></div>"#
        )
    } else {
        if let Some(caption) = options.caption {
            write!(
                img,
                r#" title="{}""#,
                html_escape::encode_double_quoted_attribute(&strip_tags(caption))
            )?;
        }
        img + ">"
    })
}

/// Removes HTML tags from a caption so it can be used as a tooltip.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options() {
        let options = Options::new(&["thumb", "200px", "left", "alt=A mosque", "The caption"]);
        assert!(options.thumb);
        assert_eq!(options.width, Some(200));
        assert_eq!(options.height, None);
        assert_eq!(options.align, Some("left"));
        assert_eq!(options.alt, Some("A mosque"));
        assert_eq!(options.caption, Some("The caption"));
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("200"), Some((Some(200), None)));
        assert_eq!(parse_size("200x100"), Some((Some(200), Some(100))));
        assert_eq!(parse_size("x100"), Some((None, Some(100))));
        assert_eq!(parse_size("big"), None);
        let options = Options::new(&["wide px"]);
        assert_eq!(options.caption, Some("wide px"));
    }

    #[test]
    fn tooltips() {
        assert_eq!(strip_tags(r#"See <a href="/wiki/x">x</a>"#), "See x");
    }
}
