//! An in-memory implementation of every collaborator, for template previews
//! and tests.

use super::{
    ArticleExistence, Error, FileInfo, FileRegistry, RedirectResolver, Result, Template,
    TemplateStore,
};
use crate::{renderer::variables, title::canonical};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

/// A template body plus its usage counter.
#[derive(Debug)]
struct StoredTemplate {
    /// The raw body.
    body: String,
    /// The number of successful expansions.
    usage_count: AtomicU64,
}

/// An in-memory database of templates, articles, redirects, and files. All
/// names are stored in canonical form.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    /// Templates by canonical name.
    templates: RwLock<HashMap<String, StoredTemplate>>,
    /// Canonical names of existing articles.
    articles: RwLock<HashSet<String>>,
    /// Redirect source to target.
    redirects: RwLock<HashMap<String, String>>,
    /// Files by canonical name.
    files: RwLock<HashMap<String, FileInfo>>,
}

impl MemoryDatabase {
    /// Creates a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a template. Fails if the name is reserved for a magic
    /// word.
    pub fn insert_template(&self, name: &str, body: impl Into<String>) -> Result<()> {
        let name = canonical(name);
        if variables::is_reserved(&name) {
            return Err(Error::Reserved(name));
        }
        self.templates.write().map_err(poisoned)?.insert(
            name,
            StoredTemplate {
                body: body.into(),
                usage_count: AtomicU64::new(0),
            },
        );
        Ok(())
    }

    /// Marks an article as existing.
    pub fn insert_article(&self, name: &str) -> Result<()> {
        self.articles.write().map_err(poisoned)?.insert(canonical(name));
        Ok(())
    }

    /// Adds a redirect from `from` to `to`.
    pub fn insert_redirect(&self, from: &str, to: &str) -> Result<()> {
        self.redirects
            .write()
            .map_err(poisoned)?
            .insert(canonical(from), canonical(to));
        Ok(())
    }

    /// Adds an uploaded file.
    pub fn insert_file(&self, mut info: FileInfo) -> Result<()> {
        info.name = canonical(&info.name);
        self.files
            .write()
            .map_err(poisoned)?
            .insert(info.name.clone(), info);
        Ok(())
    }

    /// Returns the usage count of the named template.
    pub fn usage_count(&self, name: &str) -> Result<Option<u64>> {
        Ok(self
            .templates
            .read()
            .map_err(poisoned)?
            .get(&canonical(name))
            .map(|template| template.usage_count.load(Ordering::Relaxed)))
    }
}

impl TemplateStore for MemoryDatabase {
    fn find_by_name(&self, name: &str) -> Result<Option<Template>> {
        let name = canonical(name);
        Ok(self
            .templates
            .read()
            .map_err(poisoned)?
            .get(&name)
            .map(|stored| Template {
                body: stored.body.clone(),
                usage_count: stored.usage_count.load(Ordering::Relaxed),
                name,
            }))
    }

    fn increment_usage(&self, name: &str) -> Result<()> {
        let name = canonical(name);
        let templates = self.templates.read().map_err(poisoned)?;
        let stored = templates
            .get(&name)
            .ok_or_else(|| Error::NotFound(name.clone()))?;
        stored.usage_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl ArticleExistence for MemoryDatabase {
    fn exists(&self, canonical_name: &str) -> Result<bool> {
        Ok(self
            .articles
            .read()
            .map_err(poisoned)?
            .contains(&canonical(canonical_name)))
    }
}

impl RedirectResolver for MemoryDatabase {
    fn resolve(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .redirects
            .read()
            .map_err(poisoned)?
            .get(&canonical(name))
            .cloned())
    }
}

impl FileRegistry for MemoryDatabase {
    fn find_by_name(&self, name: &str) -> Result<Option<FileInfo>> {
        Ok(self
            .files
            .read()
            .map_err(poisoned)?
            .get(&canonical(name))
            .cloned())
    }
}

/// Converts a lock poisoning error into a backend error.
fn poisoned<T>(err: std::sync::PoisonError<T>) -> Error {
    Error::backend("memory database", err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_canonical() {
        let db = MemoryDatabase::new();
        db.insert_template("infobox_person", "body").unwrap();
        let template = TemplateStore::find_by_name(&db, "Infobox person")
            .unwrap()
            .unwrap();
        assert_eq!(template.name, "Infobox person");
        assert_eq!(template.body, "body");
        assert_eq!(template.usage_count, 0);
    }

    #[test]
    fn reserved_names_are_rejected() {
        let db = MemoryDatabase::new();
        assert!(matches!(
            db.insert_template("PAGENAME", "x"),
            Err(Error::Reserved(_))
        ));
        assert!(matches!(
            db.insert_template("SITENAME", "x"),
            Err(Error::Reserved(_))
        ));
    }

    #[test]
    fn usage_counts() {
        let db = MemoryDatabase::new();
        db.insert_template("Greeting", "hi").unwrap();
        db.increment_usage("Greeting").unwrap();
        db.increment_usage("greeting").unwrap();
        assert_eq!(db.usage_count("Greeting").unwrap(), Some(2));
        assert!(matches!(
            db.increment_usage("Missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn lookups() {
        let db = MemoryDatabase::new();
        db.insert_article("Prayer").unwrap();
        db.insert_redirect("Salah", "Prayer").unwrap();
        assert!(db.exists("prayer").unwrap());
        assert!(!db.exists("Fasting").unwrap());
        assert_eq!(db.resolve("salah").unwrap().as_deref(), Some("Prayer"));
        assert_eq!(db.resolve("Prayer").unwrap(), None);
    }
}
