//! Interfaces to the data the renderer reads but does not own.
//!
//! Templates, article existence, redirects, and uploaded file metadata all
//! live in the surrounding application. The renderer only consumes them
//! through the traits in this module, so a failure here is an infrastructure
//! problem and is always propagated to the caller instead of being rendered
//! as a marker.

pub use memory::MemoryDatabase;

mod memory;

/// The result type for database operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors that may occur when interacting with a collaborator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing store failed.
    #[error("{collaborator} failed: {source}")]
    Backend {
        /// The name of the collaborator which failed.
        collaborator: &'static str,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A template was stored under a name reserved for a magic word.
    #[error("'{0}' is a reserved magic word and cannot be a template name")]
    Reserved(String),

    /// A usage count update referred to a template that does not exist.
    #[error("template '{0}' not found")]
    NotFound(String),
}

impl Error {
    /// Wraps an arbitrary backend error.
    pub fn backend<E>(collaborator: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Backend {
            collaborator,
            source: source.into(),
        }
    }
}

/// A stored template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Template {
    /// The unique canonical name of the template, without the `Template:`
    /// prefix.
    pub name: String,
    /// The raw Wikitext body, including parameter placeholders.
    pub body: String,
    /// The number of times the template has been expanded.
    pub usage_count: u64,
}

/// Metadata for an uploaded file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileInfo {
    /// The canonical name the file is linked by.
    pub name: String,
    /// The name the file is stored under, relative to the configured file
    /// path.
    pub stored_name: String,
    /// The intrinsic width of the image, if known. Used when a file link
    /// does not give a size.
    pub width: Option<u32>,
    /// The intrinsic height of the image, if known. Used when a file link
    /// does not give a size.
    pub height: Option<u32>,
    /// A description to use as alternative text when none is given.
    pub description: Option<String>,
}

/// Template storage.
pub trait TemplateStore {
    /// Finds a template by its canonical name.
    fn find_by_name(&self, name: &str) -> Result<Option<Template>>;

    /// Records one successful expansion of the named template. Implementations
    /// must make this update atomic, since independent renders may run in
    /// parallel.
    fn increment_usage(&self, name: &str) -> Result<()>;
}

/// Article existence lookups, used to find red links.
pub trait ArticleExistence {
    /// Returns true if an article with the given canonical name exists.
    fn exists(&self, canonical_name: &str) -> Result<bool>;
}

/// Redirect lookups.
pub trait RedirectResolver {
    /// Returns the canonical name of the redirect target if `name` is a
    /// redirect.
    fn resolve(&self, name: &str) -> Result<Option<String>>;
}

/// Uploaded file lookups.
pub trait FileRegistry {
    /// Finds the metadata for the file with the given canonical name.
    fn find_by_name(&self, name: &str) -> Result<Option<FileInfo>>;
}
