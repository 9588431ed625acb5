//! Template expansion.
//!
//! Expansion is driven by an explicit work stack instead of host recursion, so
//! deeply nested input cannot exhaust the call stack. There are two kinds of
//! work:
//!
//! * A [`Scan`] copies text to its output until it finds the next `{{...}}`
//!   expression, then yields so the expression can be evaluated.
//! * An [`Invoke`] evaluates one expression. Its target and arguments are
//!   split apart first, then each part which contains another expression is
//!   expanded by a child scan. Once every part is expanded, the call is made.
//!   A conditional expands only its operands and then the chosen branch, so
//!   templates in a discarded branch are never transcluded.
//!
//! A transcluded template body becomes a new scan, which is how newly
//! revealed expressions get expanded. The loop check, depth limit, and total
//! expansion budget together guarantee termination.

use super::{
    Parameters, Result, State,
    parser_fns::{Conditional, call_parser_fn, conditional_kind},
    stack::ExpansionStack,
    template::{self, Transclusion},
    variables,
};
use crate::common::{find_close, split_once_top_level, split_top_level};
use core::{iter, mem};

/// Expands every template expression in `text`.
pub(super) fn expand(state: &mut State<'_>, text: &str) -> Result<String> {
    if !text.contains("{{") {
        return Ok(text.to_string());
    }

    let mut stack = ExpansionStack::new(state.config().max_depth);
    let mut work = vec![Work::Scan(Scan::new(text.to_string(), None))];

    while let Some(item) = work.pop() {
        match item {
            Work::Scan(mut scan) => {
                if let Some(inner) = scan.next_expression() {
                    work.push(Work::Scan(scan));
                    work.push(Work::Invoke(Invoke::new(inner)));
                } else {
                    if let Some(name) = &scan.template {
                        stack.pop();
                        state.renderer.templates.increment_usage(name)?;
                    }
                    if let Some(done) = deliver(&mut work, scan.out) {
                        return Ok(done);
                    }
                }
            }
            Work::Invoke(mut invoke) => {
                if let Some(part) = invoke.next_unexpanded() {
                    work.push(Work::Invoke(invoke));
                    work.push(Work::Scan(Scan::new(part, None)));
                } else {
                    match invoke.call(state, &stack)? {
                        Transclusion::Text(text) => {
                            if let Some(done) = deliver(&mut work, text) {
                                return Ok(done);
                            }
                        }
                        Transclusion::Body { name, body } => {
                            stack.push(name.clone());
                            work.push(Work::Scan(Scan::new(body, Some(name))));
                        }
                    }
                }
            }
        }
    }

    // The root scan always delivers before the work stack empties
    Ok(String::new())
}

/// Hands finished text to the work item which is waiting for it. Returns the
/// text back if there is no such item, which means expansion is complete.
fn deliver(work: &mut [Work], text: String) -> Option<String> {
    match work.last_mut() {
        None => Some(text),
        Some(Work::Scan(scan)) => {
            scan.out += &text;
            None
        }
        Some(Work::Invoke(invoke)) => {
            invoke.expanded.push(text);
            None
        }
    }
}

/// A unit of expansion work.
#[derive(Debug)]
enum Work {
    /// Copying text and looking for expressions.
    Scan(Scan),
    /// Evaluating one expression.
    Invoke(Invoke),
}

/// A text scanner.
#[derive(Debug)]
struct Scan {
    /// The text being scanned.
    src: String,
    /// The scan position in `src`.
    pos: usize,
    /// Text copied or expanded so far.
    out: String,
    /// The name of the template whose body this is, if any.
    template: Option<String>,
}

impl Scan {
    /// Creates a new scanner.
    fn new(src: String, template: Option<String>) -> Self {
        Self {
            out: String::with_capacity(src.len()),
            src,
            pos: 0,
            template,
        }
    }

    /// Copies text up to the next template expression and returns its inner
    /// text. Returns `None` once the whole text has been copied.
    ///
    /// Unclosed braces and `{{{...}}}` parameters are copied as-is.
    fn next_expression(&mut self) -> Option<String> {
        let src = &self.src;
        while let Some(offset) = memchr::memmem::find(&src.as_bytes()[self.pos..], b"{{") {
            let start = self.pos + offset;
            self.out += &src[self.pos..start];

            if src[start..].starts_with("{{{") {
                if let Some(end) = find_close(src, start + 3, 3) {
                    self.out += &src[start..end + 3];
                    self.pos = end + 3;
                } else {
                    self.out.push('{');
                    self.pos = start + 1;
                }
                continue;
            }

            if let Some(end) = find_close(src, start + 2, 2) {
                self.pos = end + 2;
                return Some(src[start + 2..end].to_string());
            }

            self.out += "{{";
            self.pos = start + 2;
        }

        self.out += &src[self.pos..];
        self.pos = src.len();
        None
    }
}

/// How an argument was written.
#[derive(Clone, Copy, Debug)]
enum Shape {
    /// `value`.
    Positional,
    /// `key=value`.
    Named,
}

/// A template or parser function call.
#[derive(Debug)]
struct Invoke {
    /// Whether the target is a parser function.
    is_parser_fn: bool,
    /// The kind of conditional, if the target is one.
    conditional: Option<Conditional>,
    /// Whether a conditional branch has been chosen. Once it has, the only
    /// part after the operands is the chosen branch.
    chosen: bool,
    /// The unexpanded parts of the call: the target, then one part for each
    /// positional argument or two parts for each named argument.
    parts: Vec<String>,
    /// The shape of each argument.
    shapes: Vec<Shape>,
    /// The expanded parts of the call, in the same order as `parts`.
    expanded: Vec<String>,
}

impl Invoke {
    /// Splits the inner text of a template expression into its parts.
    ///
    /// Splitting happens before expansion, so a `|` or `=` produced by an
    /// expansion never acts as a separator.
    fn new(inner: String) -> Self {
        let split = split_top_level(&inner, '|');
        let is_parser_fn = split[0].trim_start().starts_with('#');
        let mut parts = Vec::with_capacity(split.len() * 2);
        let mut shapes = Vec::with_capacity(split.len() - 1);
        parts.push(split[0].to_string());
        for arg in &split[1..] {
            let named = if is_parser_fn {
                None
            } else {
                split_once_top_level(arg, '=')
            };
            if let Some((key, value)) = named {
                parts.push(key.to_string());
                parts.push(value.to_string());
                shapes.push(Shape::Named);
            } else {
                parts.push((*arg).to_string());
                shapes.push(Shape::Positional);
            }
        }

        Self {
            is_parser_fn,
            conditional: is_parser_fn.then(|| conditional_kind(split[0])).flatten(),
            chosen: false,
            expanded: Vec::with_capacity(parts.len()),
            parts,
            shapes,
        }
    }

    /// Returns the next part that needs expansion. Parts without expressions
    /// are moved to the expanded list directly.
    fn next_unexpanded(&mut self) -> Option<String> {
        loop {
            self.choose_branch();
            let part = mem::take(self.parts.get_mut(self.expanded.len())?);
            if part.contains("{{") {
                return Some(part);
            }
            self.expanded.push(part);
        }
    }

    /// Discards every branch of a conditional except the chosen one, once its
    /// operands are expanded.
    fn choose_branch(&mut self) {
        let Some(conditional) = self.conditional else {
            return;
        };
        let operands = conditional.operands();
        if self.chosen || self.expanded.len() != operands {
            return;
        }

        let condition = self
            .expanded
            .first()
            .and_then(|target| target.split_once(':'))
            .map_or("", |(_, condition)| condition);
        let values = iter::once(condition)
            .chain(self.expanded.iter().skip(1).map(String::as_str))
            .collect::<Vec<_>>();
        let index = conditional.choose(&values);
        let branch = self.parts.get_mut(index).map(mem::take).unwrap_or_default();
        self.parts.truncate(operands);
        self.parts.push(branch);
        self.chosen = true;
    }

    /// Makes the call.
    fn call(self, state: &mut State<'_>, stack: &ExpansionStack) -> Result<Transclusion> {
        if self.chosen {
            let branch = self.expanded.last().map_or("", |branch| branch.trim_ascii());
            return Ok(Transclusion::Text(branch.to_string()));
        }

        let mut values = self.expanded.into_iter();
        let target = values.next().unwrap_or_default();

        if self.is_parser_fn {
            let (callee, first) = target
                .split_once(':')
                .map_or((target.as_str(), None), |(callee, first)| {
                    (callee, Some(first.to_string()))
                });
            let rest = values.collect::<Vec<_>>();
            let arguments = first.into_iter().chain(rest.iter().cloned()).collect::<Vec<_>>();
            return Ok(Transclusion::Text(
                if let Some(text) = call_parser_fn(callee, &arguments)? {
                    text
                } else {
                    let shapes = vec![Shape::Positional; rest.len()];
                    literal(&target, &shapes, &rest)
                },
            ));
        }

        let name = target.trim();
        if self.shapes.is_empty()
            && let Some(value) = variables::magic_word(name, state.ctx)
        {
            return Ok(Transclusion::Text(value));
        }

        let values = values.collect::<Vec<_>>();
        if name.is_empty() || name.contains(['{', '}', '[', ']', '<', '>', '|', '\n']) {
            return Ok(Transclusion::Text(literal(&target, &self.shapes, &values)));
        }

        let mut params = Parameters::new();
        let mut values_iter = values.into_iter();
        for shape in &self.shapes {
            match shape {
                Shape::Positional => params.push_positional(values_iter.next().unwrap_or_default()),
                Shape::Named => {
                    let key = values_iter.next().unwrap_or_default();
                    let value = values_iter.next().unwrap_or_default();
                    params.insert(key.trim(), value.trim());
                }
            }
        }

        template::call_template(state, stack, template::template_name(name), &params)
    }
}

/// Reassembles an expression which cannot be called.
fn literal(target: &str, shapes: &[Shape], values: &[String]) -> String {
    let mut out = format!("{{{{{target}");
    let mut values = values.iter();
    for shape in shapes {
        out.push('|');
        if let Shape::Named = shape {
            out += values.next().map_or("", String::as_str);
            out.push('=');
        }
        out += values.next().map_or("", String::as_str);
    }
    out + "}}"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner() {
        let mut scan = Scan::new("a {{{p}}} {{T|{{U}}}} b {{ c".into(), None);
        assert_eq!(scan.next_expression().as_deref(), Some("T|{{U}}"));
        assert_eq!(scan.out, "a {{{p}}} ");
        assert_eq!(scan.next_expression(), None);
        assert_eq!(scan.out, "a {{{p}}}  b {{ c");
    }

    #[test]
    fn splitting() {
        let invoke = Invoke::new("T| a |k = v |[[L|x]]|{{U|y=z}}".into());
        assert!(!invoke.is_parser_fn);
        assert_eq!(invoke.parts, ["T", " a ", "k ", " v ", "[[L|x]]", "{{U|y=z}}"]);

        let invoke = Invoke::new("#if: a=b | c=d".into());
        assert!(invoke.is_parser_fn);
        assert_eq!(invoke.conditional, Some(Conditional::If));
        assert_eq!(invoke.parts, ["#if: a=b ", " c=d"]);
    }

    #[test]
    fn discarded_branches_are_not_expanded() {
        let mut invoke = Invoke::new("#if: x | shown | {{Unused}}".into());
        assert_eq!(invoke.next_unexpanded(), None);
        assert_eq!(invoke.expanded, ["#if: x ", " shown "]);

        let mut invoke = Invoke::new("#ifeq: {{A}} | b | {{Same}} | {{Different}}".into());
        assert_eq!(invoke.next_unexpanded().as_deref(), Some("#ifeq: {{A}} "));
        invoke.expanded.push("#ifeq: c ".into());
        assert_eq!(invoke.next_unexpanded().as_deref(), Some(" {{Different}}"));
        assert_eq!(invoke.parts.len(), 3);
    }

    #[test]
    fn literals() {
        assert_eq!(
            literal(
                "{{{x}}}",
                &[Shape::Positional, Shape::Named],
                &["a".into(), "k".into(), "v".into()]
            ),
            "{{{{{x}}}|a|k=v}}"
        );
    }
}
