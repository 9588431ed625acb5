//! Parser function implementations.
//!
//! Only single-condition flow control is supported. Conditions cannot be
//! combined with boolean operators.
//!
//! Conditionals are evaluated in two places. Inside a template body, they are
//! evaluated by [`eval_conditionals`] before parameters are substituted, so a
//! condition can refer to a parameter by bare name. A condition which still
//! contains a template expression after parameter substitution is left for the
//! template expander, which expands the condition, chooses a branch, and then
//! expands only that branch.

use super::{Parameters, Result, parameters};
use crate::common::{find_close, split_top_level};
use core::fmt::Write as _;
use std::borrow::Cow;

/// The function signature of a parser function.
type ParserFn = fn(&mut String, &[String]) -> Result;

/// `{{#if: condition | consequent (!condition.trim().is_empty()) | alternate }}`
fn r#if(out: &mut String, arguments: &[String]) -> Result {
    let condition = arguments.first().map_or("", String::as_str);
    let index = 1 + usize::from(!is_truthy(condition));
    if let Some(value) = arguments.get(index) {
        write!(out, "{}", value.trim_ascii())?;
    }
    Ok(())
}

/// `{{#ifeq: lhs | rhs | consequent (lhs == rhs) | alternate }}`
fn if_eq(out: &mut String, arguments: &[String]) -> Result {
    let lhs = arguments.first().map_or("", String::as_str);
    let rhs = arguments.get(1).map_or("", String::as_str);
    let index = 2 + usize::from(!fuzzy_cmp(lhs, rhs));
    if let Some(value) = arguments.get(index) {
        write!(out, "{}", value.trim_ascii())?;
    }
    Ok(())
}

/// Parser functions, by lower case name.
static PARSER_FUNCTIONS: phf::Map<&'static str, ParserFn> = phf::phf_map! {
    "#if" => r#if,
    "#ifeq" => if_eq,
};

/// Renders a parser function. Returns `None` if there is no function with the
/// given name.
pub(crate) fn call_parser_fn(callee: &str, arguments: &[String]) -> Result<Option<String>> {
    let Some(parser_fn) = PARSER_FUNCTIONS.get(callee.trim().to_lowercase().as_str()) else {
        log::debug!("Unknown parser function {callee}");
        return Ok(None);
    };
    let mut out = String::new();
    parser_fn(&mut out, arguments)?;
    Ok(Some(out))
}

/// Chooses a branch of `{{#if:...}}` whose condition may name a parameter.
/// Returns `None` if the condition depends on a template expression.
pub(crate) fn eval_if<'a>(
    condition: &str,
    consequent: &'a str,
    alternate: &'a str,
    params: &Parameters,
    budget: usize,
) -> Option<&'a str> {
    let condition = resolve_operand(condition, params, budget)?;
    Some(if is_truthy(&condition) {
        consequent
    } else {
        alternate
    })
}

/// Chooses a branch of `{{#ifeq:...}}` whose operands may name parameters.
/// Returns `None` if either operand depends on a template expression.
pub(crate) fn eval_if_eq<'a>(
    lhs: &str,
    rhs: &str,
    consequent: &'a str,
    alternate: &'a str,
    params: &Parameters,
    budget: usize,
) -> Option<&'a str> {
    let lhs = resolve_operand(lhs, params, budget)?;
    let rhs = resolve_operand(rhs, params, budget)?;
    Some(if fuzzy_cmp(&lhs, &rhs) {
        consequent
    } else {
        alternate
    })
}

/// Evaluates every `{{#if:...}}` and `{{#ifeq:...}}` expression in a template
/// body, including ones revealed by choosing a branch and ones nested in the
/// arguments of other template calls.
pub(crate) fn eval_conditionals(text: &str, params: &Parameters, budget: usize) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }

    let mut text = text.to_string();
    let mut pos = 0;
    while let Some(offset) = memchr::memmem::find(&text.as_bytes()[pos..], b"{{") {
        let start = pos + offset;
        let Some(kind) = conditional_kind(&text[start + 2..]) else {
            pos = start + 2;
            continue;
        };
        let Some(end) = find_close(&text, start + 2, 2) else {
            pos = start + 2;
            continue;
        };

        let inner = &text[start + 2..end];
        let parts = split_top_level(inner, '|');
        let first = parts[0]
            .split_once(':')
            .map_or("", |(_, condition)| condition);
        let branch = |index: usize| parts.get(index).map_or("", |part| part.trim_ascii());
        let chosen = match kind {
            Conditional::If => eval_if(first, branch(1), branch(2), params, budget),
            Conditional::IfEq => eval_if_eq(
                first,
                parts.get(1).copied().unwrap_or_default(),
                branch(2),
                branch(3),
                params,
                budget,
            ),
        };
        let Some(chosen) = chosen.map(str::to_string) else {
            pos = start + 2;
            continue;
        };

        // The replacement is always shorter than the expression, so rescanning
        // from the same position terminates
        text.replace_range(start..end + 2, &chosen);
        pos = start;
    }
    text
}

/// A conditional parser function.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Conditional {
    /// `#if`.
    If,
    /// `#ifeq`.
    IfEq,
}

impl Conditional {
    /// The number of leading arguments which decide the branch.
    pub fn operands(self) -> usize {
        match self {
            Conditional::If => 1,
            Conditional::IfEq => 2,
        }
    }

    /// Returns the argument index of the chosen branch, given the expanded
    /// operands.
    pub fn choose(self, operands: &[&str]) -> usize {
        let operand = |index: usize| operands.get(index).copied().unwrap_or_default();
        match self {
            Conditional::If => 1 + usize::from(!is_truthy(operand(0))),
            Conditional::IfEq => 2 + usize::from(!fuzzy_cmp(operand(0), operand(1))),
        }
    }
}

/// Identifies a conditional at the start of the text following `{{`.
pub(crate) fn conditional_kind(text: &str) -> Option<Conditional> {
    let text = text.trim_start();
    let (name, _) = text.split_once(':')?;
    let name = name.trim_end();
    if name.eq_ignore_ascii_case("#if") {
        Some(Conditional::If)
    } else if name.eq_ignore_ascii_case("#ifeq") {
        Some(Conditional::IfEq)
    } else {
        None
    }
}

/// Resolves a conditional operand. A bare parameter name resolves to its value;
/// anything else is passed once through the parameter resolver. Returns `None`
/// if the result still contains a template expression.
fn resolve_operand<'a>(
    operand: &'a str,
    params: &'a Parameters,
    budget: usize,
) -> Option<Cow<'a, str>> {
    let key = operand.trim();
    let value = if let Some(value) = params.get(key) {
        Cow::Borrowed(value)
    } else if key.contains("{{{") {
        Cow::Owned(parameters::resolve(key, params, budget))
    } else {
        Cow::Borrowed(key)
    };
    (!value.contains("{{")).then_some(value)
}

/// Returns true if the condition has any non-whitespace content.
fn is_truthy(condition: &str) -> bool {
    !condition.trim().is_empty()
}

/// Compares two operands numerically if both are numbers, otherwise as
/// trimmed strings.
fn fuzzy_cmp(lhs: &str, rhs: &str) -> bool {
    let lhs = lhs.trim();
    let rhs = rhs.trim();
    if let (Ok(lhs), Ok(rhs)) = (lhs.parse::<i64>(), rhs.parse::<i64>()) {
        lhs == rhs
    } else if let (Ok(lhs), Ok(rhs)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        lhs == rhs
    } else {
        lhs == rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        [("name", "Ali"), ("blank", "  "), ("n", "007")]
            .into_iter()
            .collect()
    }

    #[test]
    fn if_by_parameter_name() {
        let params = params();
        let eval = |condition| eval_if(condition, "yes", "no", &params, 10);
        assert_eq!(eval("name"), Some("yes"));
        assert_eq!(eval(" blank "), Some("no"));
        assert_eq!(eval("{{{name|}}}"), Some("yes"));
        assert_eq!(eval("{{{missing|}}}"), Some("no"));
        assert_eq!(eval("literal"), Some("yes"));
        assert_eq!(eval("{{Empty}}"), None);
        assert_eq!(eval_if("", "yes", "", &params, 10), Some(""));
    }

    #[test]
    fn if_eq_by_parameter_name() {
        let params = params();
        let eval = |lhs, rhs| eval_if_eq(lhs, rhs, "y", "n", &params, 10);
        assert_eq!(eval("name", "Ali"), Some("y"));
        assert_eq!(eval("n", "7"), Some("y"));
        assert_eq!(eval("1.0", "1"), Some("y"));
        assert_eq!(eval("a", "b"), Some("n"));
        assert_eq!(eval("a", "{{PAGENAME}}"), None);
    }

    #[test]
    fn body_conditionals() {
        let params = params();
        assert_eq!(
            eval_conditionals("Hi {{#if: name | {{{name}}} | stranger }}!", &params, 10),
            "Hi {{{name}}}!"
        );
        assert_eq!(
            eval_conditionals("{{#if:{{{x|}}}|a|{{#if:name|b|c}}}}", &params, 10),
            "b"
        );
        assert_eq!(
            eval_conditionals("{{Box|{{#ifeq:{{{name}}}|Ali|me|you}}}}", &params, 10),
            "{{Box|me}}"
        );
        assert_eq!(eval_conditionals("{{#if:x|a", &params, 10), "{{#if:x|a");
        assert_eq!(
            eval_conditionals("{{#if:{{Empty}}|{{#if:name|a|b}}|c}}", &params, 10),
            "{{#if:{{Empty}}|a|c}}"
        );
        assert_eq!(
            eval_conditionals("{{#switch:x|a}}", &params, 10),
            "{{#switch:x|a}}"
        );
    }

    #[test]
    fn expanded_calls() {
        let args = |list: &[&str]| list.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            call_parser_fn("#if", &args(&["x", " a ", "b"])).unwrap(),
            Some("a".into())
        );
        assert_eq!(
            call_parser_fn("#IF", &args(&[" ", "a"])).unwrap(),
            Some(String::new())
        );
        assert_eq!(
            call_parser_fn("#ifeq", &args(&["1", "01", "same", "different"])).unwrap(),
            Some("same".into())
        );
        assert_eq!(call_parser_fn("#expr", &args(&["1+1"])).unwrap(), None);
    }

    #[test]
    fn branch_choice() {
        assert_eq!(conditional_kind(" #IF : x"), Some(Conditional::If));
        assert_eq!(conditional_kind("#ifeq:a|b"), Some(Conditional::IfEq));
        assert_eq!(conditional_kind("#switch:a"), None);
        assert_eq!(Conditional::If.choose(&[" x "]), 1);
        assert_eq!(Conditional::If.choose(&[" "]), 2);
        assert_eq!(Conditional::IfEq.choose(&["07", "7"]), 2);
        assert_eq!(Conditional::IfEq.choose(&["a"]), 3);
    }
}
