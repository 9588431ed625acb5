//! A bounded, sanitising wikitext to HTML rendering engine.
//!
//! The engine turns stored article and template source text into HTML. It is
//! a layered, pass-based text transformer rather than a general parser:
//!
//! 1. Literal regions (code fences, `<nowiki>`, `<pre>`) are swapped out for
//!    strip markers so that nothing later can reinterpret them.
//! 2. Template expressions are expanded to a fixpoint, with cycle, depth, and
//!    total-work bounds.
//! 3. Magic words and behaviour switches are substituted.
//! 4. Block and inline markup is converted to HTML.
//! 5. Wiki links, file embeds, and categories are resolved.
//! 6. References are collected into a bibliography.
//! 7. Strip markers are restored and the whole document is sanitised against
//!    a tag and attribute allow-list.
//!
//! Data which the engine reads but does not own (templates, article
//! existence, redirects, and uploaded files) comes from the collaborator
//! traits in [`db`].

pub mod config;
pub mod db;
pub mod renderer;
pub mod title;

mod common;

pub use config::Config;
pub use renderer::{
    BehaviorSwitches, Error, Heading, Parameters, Reference, RenderContext, RenderOutput,
    Renderer, sanitize,
};
