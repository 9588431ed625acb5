//! Magic words and behaviour switches.

use super::{BehaviorSwitches, RenderContext, State};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};

/// The function signature of a magic word.
type MagicWord = fn(&RenderContext) -> String;

/// Magic words, by name. Names are case-sensitive.
static MAGIC_WORDS: phf::Map<&'static str, MagicWord> = phf::phf_map! {
    "!" => pipe,
    "CURRENTDAY" => day,
    "CURRENTDAY2" => day_lz,
    "CURRENTDAYNAME" => day_name,
    "CURRENTDOW" => day_of_week,
    // A name, not a number, to match how existing content was written
    "CURRENTMONTH" => month_name,
    "CURRENTMONTHABBREV" => month_abbr,
    "CURRENTMONTHNAME" => month_name,
    "CURRENTYEAR" => year,
    "FULLPAGENAME" => full_page_name,
    "NAMESPACE" => namespace,
    "PAGENAME" => page_name,
    "PAGENAMEE" => page_name_encoded,
    "SITENAME" => site_name,
};

/// `{{!}}`
fn pipe(_: &RenderContext) -> String {
    "|".into()
}

/// `{{CURRENTDAY}}`
fn day(ctx: &RenderContext) -> String {
    ctx.current_date.day().to_string()
}

/// `{{CURRENTDAY2}}`
fn day_lz(ctx: &RenderContext) -> String {
    format!("{:02}", ctx.current_date.day())
}

/// `{{CURRENTDAYNAME}}`
fn day_name(ctx: &RenderContext) -> String {
    ctx.current_date.weekday().to_string()
}

/// `{{CURRENTDOW}}`
fn day_of_week(ctx: &RenderContext) -> String {
    ctx.current_date
        .weekday()
        .number_days_from_sunday()
        .to_string()
}

/// `{{CURRENTMONTHABBREV}}`
fn month_abbr(ctx: &RenderContext) -> String {
    format!("{:.3}", ctx.current_date.month())
}

/// `{{CURRENTMONTH}}` or `{{CURRENTMONTHNAME}}`
fn month_name(ctx: &RenderContext) -> String {
    ctx.current_date.month().to_string()
}

/// `{{CURRENTYEAR}}`
fn year(ctx: &RenderContext) -> String {
    ctx.current_date.year().to_string()
}

/// `{{NAMESPACE}}`
fn namespace(ctx: &RenderContext) -> String {
    ctx.namespace.clone()
}

/// `{{PAGENAME}}`
fn page_name(ctx: &RenderContext) -> String {
    ctx.page_title.clone()
}

/// `{{PAGENAMEE}}`
fn page_name_encoded(ctx: &RenderContext) -> String {
    utf8_percent_encode(&ctx.page_title.replace(' ', "_"), &PAGE_NAME_ALPHABET).to_string()
}

/// `{{SITENAME}}`
fn site_name(ctx: &RenderContext) -> String {
    ctx.site_name.clone()
}

/// Characters which are percent-encoded by `{{PAGENAMEE}}`.
const PAGE_NAME_ALPHABET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b':')
    .remove(b'/')
    .remove(b'(')
    .remove(b')');

/// `{{FULLPAGENAME}}`
fn full_page_name(ctx: &RenderContext) -> String {
    if ctx.namespace.is_empty() {
        ctx.page_title.clone()
    } else {
        format!("{}:{}", ctx.namespace, ctx.page_title)
    }
}

/// Returns true if `name` is reserved for a magic word and so cannot be used
/// as a template name.
pub(crate) fn is_reserved(name: &str) -> bool {
    MAGIC_WORDS.contains_key(name.trim())
}

/// Returns the value of the magic word with the given name.
///
/// Values are escaped so that text from the render context can never be read
/// as a template expression or behaviour switch by a later pass.
pub(crate) fn magic_word(name: &str, ctx: &RenderContext) -> Option<String> {
    MAGIC_WORDS
        .get(name.trim())
        .map(|word| escape(&word(ctx)).into_owned())
}

/// Escapes the Wikitext control sequences which are interpreted after
/// template expansion.
fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['{', '}']) && !text.contains("__") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => out += "&#123;",
            '}' => out += "&#125;",
            '_' if chars.peek() == Some(&'_') => out += "&#95;",
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Replaces remaining `{{MAGICWORD}}` expressions and removes and records
/// behaviour switches. Unknown names are left alone.
pub(super) fn substitute(state: &mut State<'_>, text: &str) -> String {
    static MAGIC: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{\{\s*(!|[A-Z][A-Z0-9]*)\s*\}\}").unwrap());
    static SWITCH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__([A-Z]+)__").unwrap());

    let ctx = state.ctx;
    let text = MAGIC.replace_all(text, |caps: &regex::Captures<'_>| {
        magic_word(&caps[1], ctx).unwrap_or_else(|| caps[0].to_string())
    });

    let switches = &mut state.switches;
    SWITCH
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            if set_switch(switches, &caps[1]) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Sets the behaviour switch with the given name. Returns false if there is
/// no such switch.
fn set_switch(switches: &mut BehaviorSwitches, name: &str) -> bool {
    let flag = match name {
        "NOTOC" => &mut switches.no_toc,
        "FORCETOC" => &mut switches.force_toc,
        "TOC" => &mut switches.toc,
        "NOCAT" => &mut switches.no_cat,
        "NOTITLE" => &mut switches.no_title,
        _ => return false,
    };
    *flag = true;
    true
}
