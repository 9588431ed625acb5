//! Renderer configuration.
//!
//! Wikitext documents are not self-encapsulated and cannot be rendered without
//! out-of-band configuration data: where articles and uploads live, which
//! namespace prefixes exist, and how much work a single render may do.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// The default configuration.
pub static DEFAULT_CONFIG: LazyLock<Config> = LazyLock::new(Config::default);

/// Renderer configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// The maximum number of nested template frames.
    pub max_depth: usize,
    /// The maximum number of template transclusions in a single render. This
    /// bounds the total work of a document with wide but acyclic template
    /// trees.
    pub max_expansions: usize,
    /// The URL prefix for article links. Article slugs are appended directly.
    pub article_path: String,
    /// The URL prefix for uploaded files. Stored file names are appended
    /// directly.
    pub file_path: String,
    /// Namespace prefixes, in addition to the built-in `Category`, `File`,
    /// `Image`, and `Template` namespaces, which are stripped from link
    /// targets.
    pub namespaces: Vec<String>,
    /// The heading text of the generated bibliography.
    pub references_heading: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_expansions: 1000,
            article_path: "/wiki/".into(),
            file_path: "/uploads/wiki/files/".into(),
            namespaces: ["Help", "Project", "Special", "Talk", "User", "Wiki"]
                .into_iter()
                .map(String::from)
                .collect(),
            references_heading: "References".into(),
        }
    }
}

impl Config {
    /// Loads a configuration from JSON. Missing fields take their default
    /// values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = Config::from_json(r#"{ "max_depth": 4, "article_path": "/a/" }"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.article_path, "/a/");
        assert_eq!(config.max_expansions, DEFAULT_CONFIG.max_expansions);
        assert_eq!(config.file_path, DEFAULT_CONFIG.file_path);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(Config::from_json(r#"{ "max_depth": "deep" }"#).is_err());
    }
}
