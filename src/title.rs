//! Types and functions for parsing and formatting link target titles.

use crate::config::Config;
use percent_encoding::{NON_ALPHANUMERIC, PercentEncode, utf8_percent_encode};
use std::borrow::Cow;
use unicase::UniCase;

/// The namespace of a title.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Namespace {
    /// The main article namespace.
    Main,
    /// `Category:`.
    Category,
    /// `File:`, or its `Image:` alias.
    File,
    /// `Template:`.
    Template,
    /// Any other configured namespace.
    Other(String),
}

impl Namespace {
    /// Finds the namespace with the given case-insensitive name.
    pub fn find_by_name(name: &str, config: &Config) -> Option<Self> {
        let name = UniCase::new(name.trim());
        if name == UniCase::new("Category") {
            Some(Self::Category)
        } else if name == UniCase::new("File") || name == UniCase::new("Image") {
            Some(Self::File)
        } else if name == UniCase::new("Template") {
            Some(Self::Template)
        } else {
            config
                .namespaces
                .iter()
                .find(|ns| UniCase::new(ns.as_str()) == name)
                .map(|ns| Self::Other(ns.clone()))
        }
    }
}

/// A normalised link target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Title {
    /// The namespace of the title.
    namespace: Namespace,
    /// The normalised title text, without namespace or fragment.
    text: String,
    /// The fragment, without the leading `#`.
    fragment: Option<String>,
    /// Whether the title was written with a leading colon, which forces a
    /// plain link even for namespaces that normally do something else.
    colon: bool,
}

impl Title {
    /// Creates a new [`Title`] from a raw link target string.
    pub fn new(raw: &str, config: &Config) -> Self {
        let raw = raw.trim();
        let (colon, raw) = raw
            .strip_prefix(':')
            .map_or((false, raw), |rest| (true, rest.trim_start()));

        let (raw, fragment) = raw
            .split_once('#')
            .map_or((raw, None), |(text, frag)| (text, Some(frag.trim().to_string())));

        let (namespace, text) = raw
            .split_once(':')
            .and_then(|(lhs, rhs)| Namespace::find_by_name(lhs, config).map(|ns| (ns, rhs)))
            .unwrap_or((Namespace::Main, raw));

        Self {
            namespace,
            text: canonical(text),
            fragment,
            colon,
        }
    }

    /// Whether the title had a leading colon.
    pub fn is_colon(&self) -> bool {
        self.colon
    }

    /// The page fragment, if one was given.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The title’s namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The canonical title text, without namespace prefix or fragment.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The URL-safe slug for the title.
    ///
    /// ```text
    /// Namespace:Some Title#Fragment
    ///           ^^^^^^^^^^
    ///          (some-title)
    /// ```
    pub fn slug(&self) -> String {
        slug(&self.text)
    }

    /// Replaces the title text with the target of a redirect, keeping the
    /// fragment.
    pub fn redirect_to(&mut self, target: &str) {
        self.namespace = Namespace::Main;
        self.text = canonical(target);
    }
}

impl core::fmt::Display for Title {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Converts title text to its canonical form: normalised whitespace and an
/// upper case first letter.
pub fn canonical(text: &str) -> String {
    let text = normalize(text);
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => {
            let mut out = String::with_capacity(text.len());
            out.extend(first.to_uppercase());
            out += chars.as_str();
            out
        }
        _ => text.into_owned(),
    }
}

/// Normalises a title text part by converting runs of whitespace and
/// underscores to a single space and trimming both ends.
pub fn normalize(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim_matches(trimmable);
    let needs_work = trimmed
        .char_indices()
        .zip(trimmed.chars().skip(1).map(Some).chain([None]))
        .any(|((_, c), next)| {
            trimmable(c) && (c != ' ' || next.is_some_and(trimmable))
        });

    if !needs_work {
        return Cow::Borrowed(trimmed);
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut in_space = false;
    for c in trimmed.chars() {
        if trimmable(c) {
            if !in_space && spacelike(c) {
                out.push(' ');
            }
            in_space |= spacelike(c);
        } else {
            in_space = false;
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Converts title text to a lower case, hyphen-separated slug. Letters and
/// digits from every script are kept.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Percent-encodes a slug for use in a URL path.
pub fn url_encode(slug: &str) -> PercentEncode<'_> {
    utf8_percent_encode(slug, &SLUG_ALPHABET)
}

/// Characters which are percent-encoded in a slug. Hyphens are the only
/// punctuation a slug can contain, so they are left alone.
const SLUG_ALPHABET: percent_encoding::AsciiSet = NON_ALPHANUMERIC.remove(b'-');

/// Returns true if the given character `c` is a bidirectional text control
/// character.
fn bidi(c: char) -> bool {
    ('\u{200e}'..='\u{200f}').contains(&c) || ('\u{202a}'..='\u{202e}').contains(&c)
}

/// Returns true if the character `c` is considered like whitespace in title
/// text.
fn spacelike(c: char) -> bool {
    c == '_' || c.is_whitespace()
}

/// Returns true if the character `c` is trimmable in title text.
fn trimmable(c: char) -> bool {
    bidi(c) || spacelike(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize() {
        assert_eq!(super::normalize("A b"), Cow::Borrowed("A b"));
        assert_eq!(super::normalize("A_b"), "A b");
        assert_eq!(super::normalize("A_______b"), "A b");
        assert_eq!(super::normalize("A__  __b"), "A b");
        assert_eq!(super::normalize("   A b   "), Cow::Borrowed("A b"));
        assert_eq!(super::normalize("\u{200e}A b   \u{202e}"), "A b");
    }

    #[test]
    fn canonical_uppercases_first_letter() {
        assert_eq!(canonical("islamic_art"), "Islamic art");
        assert_eq!(canonical("édouard"), "Édouard");
        assert_eq!(canonical("القرآن"), "القرآن");
    }

    #[test]
    fn slugs() {
        assert_eq!(slug("Islamic Art"), "islamic-art");
        assert_eq!(slug("  Five Pillars (of Islam) "), "five-pillars-of-islam");
        assert_eq!(slug("القرآن الكريم"), "القرآن-الكريم");
        assert_eq!(url_encode("a-b").to_string(), "a-b");
    }

    #[test]
    fn namespaces() {
        let config = Config::default();
        let title = Title::new("category:Prayer", &config);
        assert_eq!(title.namespace(), &Namespace::Category);
        assert_eq!(title.text(), "Prayer");

        let title = Title::new("Image:Mosque.jpg", &config);
        assert_eq!(title.namespace(), &Namespace::File);

        let title = Title::new("Help:editing_pages#Links", &config);
        assert_eq!(title.namespace(), &Namespace::Other("Help".into()));
        assert_eq!(title.text(), "Editing pages");
        assert_eq!(title.fragment(), Some("Links"));

        let title = Title::new("Mecca: the city", &config);
        assert_eq!(title.namespace(), &Namespace::Main);
        assert_eq!(title.text(), "Mecca: the city");

        let title = Title::new(":Category:Prayer", &config);
        assert!(title.is_colon());
        assert_eq!(title.namespace(), &Namespace::Category);
    }
}
