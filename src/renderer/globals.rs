//! Collections for semi-structured article data.

use super::Heading;
use crate::common::anchor_encode;
use indexmap::IndexSet;
use std::collections::HashMap;

/// The categories which the article belongs to, in order of first
/// appearance.
#[derive(Debug, Default)]
pub(crate) struct Categories(IndexSet<String>);

impl Categories {
    /// Adds a category.
    pub(super) fn insert(&mut self, value: String) {
        self.0.insert(value);
    }

    /// Consumes this object, returning the categories.
    pub fn finish(self) -> Vec<String> {
        self.0.into_iter().collect()
    }
}

/// Canonical names of missing link targets, in order of first appearance.
#[derive(Debug, Default)]
pub(crate) struct RedLinks(IndexSet<String>);

impl RedLinks {
    /// Adds a missing link target.
    pub(super) fn insert(&mut self, value: &str) {
        if !self.0.contains(value) {
            self.0.insert(value.to_string());
        }
    }

    /// Consumes this object, returning the link targets.
    pub fn finish(self) -> Vec<String> {
        self.0.into_iter().collect()
    }
}

/// An article outline.
#[derive(Debug, Default)]
pub(crate) struct Outline {
    /// The headings.
    headings: Vec<Heading>,
    /// The number of times each base ID has been used.
    ids: HashMap<String, usize>,
}

impl Outline {
    /// Pushes a new entry to the outline and returns its unique ID.
    pub(super) fn push(&mut self, level: u8, text: String) -> String {
        let base = anchor_encode(&text);
        let base = if base.is_empty() {
            "section".to_string()
        } else {
            base
        };

        let count = self.ids.entry(base.clone()).or_default();
        *count += 1;
        let mut id = if *count == 1 {
            base.clone()
        } else {
            format!("{base}_{count}")
        };
        // An explicit heading like "A_2" may already have the suffixed ID
        while self.headings.iter().any(|heading| heading.id == id) {
            *self.ids.entry(base.clone()).or_default() += 1;
            id = format!("{base}_{}", self.ids[&base]);
        }
        self.ids.entry(id.clone()).or_insert(1);

        self.headings.push(Heading {
            level,
            text,
            id: id.clone(),
        });
        id
    }

    /// Consumes this object, returning the headings.
    pub fn finish(self) -> Vec<Heading> {
        self.headings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_ids() {
        let mut outline = Outline::default();
        assert_eq!(outline.push(2, "History".into()), "History");
        assert_eq!(outline.push(2, "History".into()), "History_2");
        assert_eq!(outline.push(3, "History 3".into()), "History_3");
        assert_eq!(outline.push(2, "History".into()), "History_4");
        assert_eq!(outline.push(2, "".into()), "section");
        let ids = outline
            .finish()
            .into_iter()
            .map(|heading| heading.id)
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            ["History", "History_2", "History_3", "History_4", "section"]
        );
    }

    #[test]
    fn ordered_sets() {
        let mut categories = Categories::default();
        categories.insert("B".into());
        categories.insert("A".into());
        categories.insert("B".into());
        assert_eq!(categories.finish(), ["B", "A"]);

        let mut red_links = RedLinks::default();
        red_links.insert("X");
        red_links.insert("X");
        assert_eq!(red_links.finish(), ["X"]);
    }
}
