//! Template transclusion.

use super::{
    Parameters, Result, State, parameters, parser_fns::eval_conditionals,
    stack::{ExpansionStack, Refusal},
    strip,
};
use crate::title::canonical;
use regex::Regex;
use std::sync::LazyLock;
use unicase::UniCase;

/// The result of a template call.
#[derive(Debug)]
pub(super) enum Transclusion {
    /// Text which is inserted without being scanned again.
    Text(String),
    /// A template body which is scanned again inside a new stack frame.
    Body {
        /// The canonical name of the template.
        name: String,
        /// The body with its parameters already substituted.
        body: String,
    },
}

/// How a document is being included.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Inclusion {
    /// The document is being rendered as a page.
    Root,
    /// The document is being transcluded into another page.
    Template,
}

/// Applies `<noinclude>`, `<includeonly>`, and `<onlyinclude>` to a document.
pub(super) fn include_control(text: &str, mode: Inclusion) -> String {
    static ONLY_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<onlyinclude\s*>(.*?)(?:</onlyinclude\s*>|\z)").unwrap()
    });
    static NO_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<noinclude\s*>.*?(?:</noinclude\s*>|\z)").unwrap()
    });
    static INCLUDE_ONLY: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<includeonly\s*>.*?(?:</includeonly\s*>|\z)").unwrap()
    });
    static INCLUDE_ONLY_TAG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</?includeonly\s*>").unwrap());
    static ROOT_TAG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</?(?:noinclude|onlyinclude)\s*>").unwrap());

    if !text.contains('<') {
        return text.to_string();
    }

    match mode {
        Inclusion::Root => {
            let text = INCLUDE_ONLY.replace_all(text, "");
            ROOT_TAG.replace_all(&text, "").into_owned()
        }
        Inclusion::Template => {
            let only = ONLY_INCLUDE
                .captures_iter(text)
                .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
                .collect::<Vec<_>>();
            let text = if only.is_empty() {
                text.to_string()
            } else {
                only.concat()
            };
            let text = NO_INCLUDE.replace_all(&text, "");
            INCLUDE_ONLY_TAG.replace_all(&text, "").into_owned()
        }
    }
}

/// Converts the target of a transclusion into a canonical template name.
pub(super) fn template_name(callee: &str) -> String {
    let callee = callee.trim();
    let callee = match callee.split_once(':') {
        Some((namespace, rest)) if UniCase::new(namespace.trim()) == UniCase::new("Template") => {
            rest
        }
        _ => callee,
    };
    canonical(callee)
}

/// Transcludes a template.
///
/// A template which cannot be transcluded is replaced by a visible error
/// marker. Only a collaborator failure is an error.
pub(super) fn call_template(
    state: &mut State<'_>,
    stack: &ExpansionStack,
    name: String,
    params: &Parameters,
) -> Result<Transclusion> {
    let config = state.config();

    match stack.check(&name) {
        Ok(()) => {}
        Err(Refusal::Loop) => {
            log::warn!("Template loop detected for '{name}'");
            return Ok(Transclusion::Text(error_marker(
                "template-loop",
                &format!("Template loop detected: {name}"),
            )));
        }
        Err(Refusal::Depth) => {
            log::warn!("Template depth limit reached at '{name}'");
            return Ok(Transclusion::Text(error_marker(
                "template-depth",
                &format!("Template recursion depth exceeded: {name}"),
            )));
        }
    }

    if state.expansions >= config.max_expansions {
        log::warn!("Template expansion limit reached at '{name}'");
        return Ok(Transclusion::Text(error_marker(
            "template-limit",
            "Template expansion limit exceeded",
        )));
    }

    let Some(template) = state.renderer.templates.find_by_name(&name)? else {
        log::warn!("No template found for '{name}'");
        return Ok(Transclusion::Text(error_marker(
            "template-missing",
            &format!("Template not found: {name}"),
        )));
    };

    state.expansions += 1;
    log::trace!("Expanding {name} at depth {}", stack.depth());

    let body = strip::remove_delimiters(&template.body);
    let body = include_control(&body, Inclusion::Template);
    let body = state.strip_markers.extract(&body);
    let body = eval_conditionals(&body, params, config.max_depth);
    let body = parameters::resolve(&body, params, config.max_depth);

    Ok(Transclusion::Body { name, body })
}

/// Creates a visible inline error marker.
fn error_marker(class: &str, message: &str) -> String {
    format!(
        r#"<span class="error {class}">{}</span>"#,
        html_escape::encode_text(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_inclusion() {
        assert_eq!(
            include_control(
                "a<noinclude>b</noinclude>c<includeonly>d</includeonly>e<onlyinclude>f</onlyinclude>",
                Inclusion::Root
            ),
            "abcef"
        );
    }

    #[test]
    fn template_inclusion() {
        assert_eq!(
            include_control(
                "a<noinclude>[[Category:Templates]]</noinclude>b<includeonly>c</includeonly>",
                Inclusion::Template
            ),
            "abc"
        );
        assert_eq!(
            include_control(
                "doc<onlyinclude>x</onlyinclude>doc<onlyinclude>y</onlyinclude>",
                Inclusion::Template
            ),
            "xy"
        );
        assert_eq!(
            include_control("a<noinclude>docs never closed", Inclusion::Template),
            "a"
        );
    }

    #[test]
    fn names() {
        assert_eq!(template_name(" infobox_person "), "Infobox person");
        assert_eq!(template_name("template: Cite web"), "Cite web");
        assert_eq!(template_name("Help:Contents"), "Help:Contents");
    }

    #[test]
    fn markers_are_escaped() {
        assert_eq!(
            error_marker("template-missing", "Template not found: <b>"),
            r#"<span class="error template-missing">Template not found: &lt;b&gt;</span>"#
        );
    }
}
