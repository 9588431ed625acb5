//! Template parameter substitution.

use super::Parameters;
use crate::common::{find_close, split_once_top_level};

/// Replaces every `{{{name}}}` and `{{{name|default}}}` token in `text`.
///
/// A bound name is replaced by its argument value verbatim. An unbound name
/// with a default is replaced by the default, which is itself resolved with
/// one less unit of `budget`. Anything else, including every token once the
/// budget reaches zero, is left as-is.
pub(crate) fn resolve(text: &str, params: &Parameters, budget: usize) -> String {
    if budget == 0 || !text.contains("{{{") {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(offset) = memchr::memmem::find(&text.as_bytes()[pos..], b"{{{") {
        let start = pos + offset;
        out += &text[pos..start];

        let Some(end) = find_close(text, start + 3, 3) else {
            out += &text[start..];
            return out;
        };

        let inner = &text[start + 3..end];
        let (name, default) = split_once_top_level(inner, '|')
            .map_or((inner, None), |(name, default)| (name, Some(default)));
        let key = name.trim();

        if key.contains(['{', '}']) {
            // Not a parameter name; maybe the next brace starts one
            out.push('{');
            pos = start + 1;
            continue;
        }

        if let Some(value) = params.get(key) {
            out += value;
        } else if let Some(default) = default {
            out += &resolve(default, params, budget - 1);
        } else {
            out += &text[start..end + 3];
        }
        pos = end + 3;
    }
    out += &text[pos..];
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        let mut params = Parameters::new();
        params.push_positional("first");
        params.insert("name", "Ali");
        params.insert("empty", "");
        params
    }

    #[test]
    fn bound_and_unbound() {
        let params = params();
        assert_eq!(resolve("Hi {{{name}}}!", &params, 10), "Hi Ali!");
        assert_eq!(resolve("{{{ name }}}", &params, 10), "Ali");
        assert_eq!(resolve("{{{1}}}", &params, 10), "first");
        assert_eq!(resolve("[{{{empty}}}]", &params, 10), "[]");
        assert_eq!(resolve("{{{missing}}}", &params, 10), "{{{missing}}}");
    }

    #[test]
    fn defaults() {
        let params = params();
        assert_eq!(resolve("{{{missing|none}}}", &params, 10), "none");
        assert_eq!(resolve("{{{missing|}}}", &params, 10), "");
        assert_eq!(resolve("{{{name|none}}}", &params, 10), "Ali");
        assert_eq!(resolve("{{{a|{{{b|{{{name}}}}}}}}}", &params, 10), "Ali");
        assert_eq!(
            resolve("{{{a|{{T|x=1}}}}}", &params, 10),
            "{{T|x=1}}",
            "template syntax in defaults is not a separator"
        );
    }

    #[test]
    fn budget() {
        let params = params();
        assert_eq!(resolve("{{{name}}}", &params, 0), "{{{name}}}");
        assert_eq!(resolve("{{{a|{{{b|x}}}}}}", &params, 1), "{{{b|x}}}");
        assert_eq!(resolve("{{{a|{{{b|x}}}}}}", &params, 2), "x");
    }

    #[test]
    fn unterminated() {
        let params = params();
        assert_eq!(resolve("{{{name", &params, 10), "{{{name");
        assert_eq!(resolve("x {{{name}} y", &params, 10), "x {{{name}} y");
    }
}
