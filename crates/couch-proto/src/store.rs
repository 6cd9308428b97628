use crate::document::{Document, Revision};
use crate::error::Result;
use crate::query::FindQuery;
use async_trait::async_trait;

/// Trait for document store backends.
///
/// Writes use optimistic concurrency: `update` and `delete` must carry the
/// revision the caller last saw, and fail with [`CouchError::Conflict`] when
/// another writer got there first.
///
/// [`CouchError::Conflict`]: crate::CouchError::Conflict
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by primary identifier; `None` when it does not exist.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Run a `_find` query.
    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>>;

    /// Store a new document, returning its first revision.
    ///
    /// Fails with a conflict if the identifier is already taken.
    async fn insert(&self, doc: &Document) -> Result<Revision>;

    /// Write a new version of an existing document.
    ///
    /// The document's held revision must be current.
    async fn update(&self, doc: &Document) -> Result<Revision>;

    /// Delete a document at its held revision.
    async fn delete(&self, doc: &Document) -> Result<()>;
}
