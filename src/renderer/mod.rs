//! Article rendering types and functions.
//!
//! Rendering is a fixed sequence of passes over the document text. Each pass
//! sees the complete output of the previous one:
//!
//! 1. Protect literal regions.
//!
//!    Fenced code blocks, `<nowiki>`, and `<pre>` are replaced by “strip
//!    markers”: text sequences starting with `\x7fUNIQ-` and ending with
//!    `-QINU\x7f` which uniquely identify the protected content within the
//!    *entire* render. Because the marker delimiter cannot be written by
//!    authors (`\x7f` is removed from all input), no later pass can forge or
//!    reinterpret a protected region.
//!
//! 2. Expand template expressions.
//!
//!    Conceptually, the result of a template expansion is as-if the plain
//!    text of the fully expanded template already existed in the root
//!    document’s source text before rendering began. Expansion is driven by
//!    an explicit work stack, not by recursion over the input, and is bounded
//!    by a loop check, a depth limit, and a total expansion budget.
//!
//! 3. Substitute magic words and record behaviour switches.
//!
//! 4. Convert block and inline markup to HTML.
//!
//! 5. Resolve wiki links, file embeds, and categories.
//!
//! 6. Collect references into a numbered bibliography.
//!
//! 7. Restore strip markers and sanitise.
//!
//!    Sanitisation is last and unconditional, so nothing produced by any
//!    earlier pass (template bodies, magic words, raw HTML in the source) can
//!    reach the output without passing the allow-list.

use crate::{
    config::Config,
    db::{self, ArticleExistence, FileRegistry, RedirectResolver, TemplateStore},
};
use core::fmt;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::Serialize;
use std::time::Instant;
use time::Date;

pub use sanitize::sanitize;

mod document;
mod expand_templates;
mod extension_tags;
mod globals;
mod image;
pub(crate) mod parameters;
pub(crate) mod parser_fns;
mod sanitize;
pub(crate) mod stack;
mod strip;
mod table;
mod tags;
mod template;
pub(crate) mod variables;


/// An article rendering error.
///
/// Malformed Wikitext is never an error. Only a failing collaborator aborts a
/// render, since that indicates an infrastructure problem rather than bad
/// input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A collaborator call failed.
    #[error("db error: {0}")]
    Database(#[from] db::Error),

    /// A write to a buffer failed.
    #[error("fmt error: {0}")]
    Fmt(#[from] fmt::Error),
}

/// The standard result type used by all fallible renderer functions.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// Per-call information about the page being rendered.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RenderContext {
    /// The title of the page being rendered.
    pub page_title: String,
    /// The name of the wiki.
    pub site_name: String,
    /// The date used for date magic words.
    pub current_date: Date,
    /// The namespace of the page being rendered. Empty for the main
    /// namespace.
    pub namespace: String,
}

impl RenderContext {
    /// Creates a context for a main-namespace page dated today (UTC).
    pub fn new(page_title: impl Into<String>, site_name: impl Into<String>) -> Self {
        Self {
            page_title: page_title.into(),
            site_name: site_name.into(),
            current_date: time::OffsetDateTime::now_utc().date(),
            namespace: String::new(),
        }
    }

    /// Replaces the render date.
    #[must_use]
    pub fn with_date(mut self, date: Date) -> Self {
        self.current_date = date;
        self
    }

    /// Replaces the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// Template arguments, keyed by name or by implicit 1-based position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Parameters {
    /// Arguments in the order they were given.
    values: IndexMap<String, String>,
    /// The last used positional key.
    last_positional: usize,
}

impl Parameters {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of the argument with the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns true if there is an argument with the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Sets a named argument. A later argument with the same key replaces the
    /// value of an earlier one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Adds an argument at the next implicit position.
    pub fn push_positional(&mut self, value: impl Into<String>) {
        self.last_positional += 1;
        self.values
            .insert(self.last_positional.to_string(), value.into());
    }

    /// The number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the arguments in the order they were given.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// A collected footnote.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Reference {
    /// The 1-based footnote number, in order of first appearance.
    pub ordinal: usize,
    /// The sanitised HTML body of the footnote.
    pub html: String,
}

/// An entry in the document outline.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Heading {
    /// The heading level, 1 through 6.
    pub level: u8,
    /// The plain text of the heading.
    pub text: String,
    /// The unique element ID of the heading.
    pub id: String,
}

/// Flags set by double-underscore behaviour switches.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
// Clippy: These are independent flags, not a state machine.
#[allow(clippy::struct_excessive_bools)]
pub struct BehaviorSwitches {
    /// `__NOTOC__`: do not show a table of contents.
    pub no_toc: bool,
    /// `__FORCETOC__`: always show a table of contents.
    pub force_toc: bool,
    /// `__TOC__`: the table of contents position was set explicitly.
    pub toc: bool,
    /// `__NOCAT__`: do not show the category list.
    pub no_cat: bool,
    /// `__NOTITLE__`: do not show the page title.
    pub no_title: bool,
}

/// The result of a render.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RenderOutput {
    /// The sanitised HTML.
    pub html: String,
    /// Categories, in order of first appearance.
    pub categories: Vec<String>,
    /// Footnotes, in order of appearance.
    pub references: Vec<Reference>,
    /// Canonical names of link targets which do not exist, in order of first
    /// appearance.
    pub red_links: Vec<String>,
    /// Every rendered heading.
    pub outline: Vec<Heading>,
    /// Behaviour switches found in the document.
    pub switches: BehaviorSwitches,
}

/// The render orchestrator.
///
/// A renderer holds only shared references, so one renderer may serve many
/// concurrent renders if its collaborators allow it.
pub struct Renderer<'a> {
    /// Renderer configuration.
    config: &'a Config,
    /// Template bodies.
    templates: &'a dyn TemplateStore,
    /// Article existence checks.
    articles: &'a dyn ArticleExistence,
    /// Redirect lookups.
    redirects: &'a dyn RedirectResolver,
    /// Uploaded file lookups.
    files: &'a dyn FileRegistry,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer which uses one object for all collaborators.
    pub fn new<D>(config: &'a Config, db: &'a D) -> Self
    where
        D: TemplateStore + ArticleExistence + RedirectResolver + FileRegistry,
    {
        Self {
            config,
            templates: db,
            articles: db,
            redirects: db,
            files: db,
        }
    }

    /// Creates a renderer from separate collaborators.
    pub fn from_parts(
        config: &'a Config,
        templates: &'a dyn TemplateStore,
        articles: &'a dyn ArticleExistence,
        redirects: &'a dyn RedirectResolver,
        files: &'a dyn FileRegistry,
    ) -> Self {
        Self {
            config,
            templates,
            articles,
            redirects,
            files,
        }
    }

    /// Renders a document.
    pub fn render(&self, source: &str, ctx: &RenderContext) -> Result<RenderOutput> {
        self.render_with(source, ctx, None)
    }

    /// Renders a template body as a preview, with explicit arguments bound to
    /// its parameters.
    pub fn render_preview(
        &self,
        source: &str,
        ctx: &RenderContext,
        params: &Parameters,
    ) -> Result<RenderOutput> {
        self.render_with(source, ctx, Some(params))
    }

    /// Runs every rendering pass over a document.
    fn render_with(
        &self,
        source: &str,
        ctx: &RenderContext,
        params: Option<&Parameters>,
    ) -> Result<RenderOutput> {
        let now = Instant::now();
        let mut state = State::new(self, ctx);

        let text = strip::remove_delimiters(source);
        let text = if params.is_some() {
            template::include_control(&text, template::Inclusion::Template)
        } else {
            template::include_control(&text, template::Inclusion::Root)
        };
        let mut text = state.strip_markers.extract(&text);

        if let Some(params) = params {
            text = parser_fns::eval_conditionals(&text, params, self.config.max_depth);
            text = parameters::resolve(&text, params, self.config.max_depth);
        }

        let text = expand_templates::expand(&mut state, &text)?;
        let text = variables::substitute(&mut state, &text);
        let text = document::transform(&mut state, &text);
        let text = tags::resolve_links(&mut state, &text)?;
        let text = extension_tags::collect_references(&mut state, &text)?;

        let html = sanitize(&state.strip_markers.unstrip(&text));
        let references = state
            .references
            .iter()
            .map(|reference| Reference {
                ordinal: reference.ordinal,
                html: sanitize(&state.strip_markers.unstrip(&reference.html)),
            })
            .collect();

        log::debug!(
            "Rendered '{}' in {:.2?} ({} template expansions)",
            ctx.page_title,
            now.elapsed(),
            state.expansions
        );

        Ok(RenderOutput {
            html,
            categories: state.categories.finish(),
            references,
            red_links: state.red_links.finish(),
            outline: state.outline.finish(),
            switches: state.switches,
        })
    }
}

/// Renderer state that is shared across every pass of a single render.
pub(crate) struct State<'s> {
    /// The renderer.
    renderer: &'s Renderer<'s>,
    /// The page being rendered.
    ctx: &'s RenderContext,
    /// Collected categories.
    categories: globals::Categories,
    /// The number of template transclusions so far.
    expansions: usize,
    /// Collected headings.
    outline: globals::Outline,
    /// Missing link targets.
    red_links: globals::RedLinks,
    /// Collected references.
    references: extension_tags::References,
    /// Protected regions.
    strip_markers: strip::StripMarkers,
    /// Behaviour switches.
    switches: BehaviorSwitches,
}

impl<'s> State<'s> {
    /// Creates a new empty render state.
    fn new(renderer: &'s Renderer<'s>, ctx: &'s RenderContext) -> Self {
        Self {
            renderer,
            ctx,
            categories: <_>::default(),
            expansions: 0,
            outline: <_>::default(),
            red_links: <_>::default(),
            references: <_>::default(),
            strip_markers: <_>::default(),
            switches: <_>::default(),
        }
    }

    /// The renderer configuration.
    #[inline]
    fn config(&self) -> &'s Config {
        self.renderer.config
    }
}

/// Replaces every match of `re` in `text` with the result of `f`, stopping at
/// the first error.
fn try_replace_all<F>(re: &Regex, text: &str, mut f: F) -> Result<String>
where
    F: FnMut(&Captures<'_>) -> Result<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut flushed = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        out += &text[flushed..m.start()];
        out += &f(&caps)?;
        flushed = m.end();
    }
    out += &text[flushed..];
    Ok(out)
}
