//! In-memory document store.
//!
//! Follows CouchDB's revision rules closely enough to exercise optimistic
//! concurrency without a server: every write produces a new `N-hash`
//! revision and writes carrying an older one are rejected.
//!
//! Test hooks:
//! - [`MemoryStore::inject_conflicts`] simulates concurrent writers on one id
//! - [`MemoryStore::set_outage`] makes every call fail with a status code
//! - [`MemoryStore::writes`] counts successful writes

use crate::document::{Document, Revision};
use crate::error::{CouchError, Result};
use crate::query::FindQuery;
use crate::store::DocumentStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use tracing::debug;
use uuid::Uuid;

/// Document store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<String, Document>,
    /// Pending simulated foreign writes per id.
    foreign_writes: DashMap<String, u32>,
    writes: AtomicUsize,
    /// Status code returned for every call while non-zero.
    outage: AtomicU16,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Successful inserts, updates and deletes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Current stored copy of a document, bypassing outage simulation.
    pub fn document(&self, id: &str) -> Option<Document> {
        self.docs.get(id).map(|d| d.value().clone())
    }

    /// Store a document as-is, assigning it a fresh revision.
    ///
    /// Does not count as a write and ignores existing documents.
    pub fn seed(&self, doc: Document) -> Revision {
        let rev = next_revision(None);
        self.docs.insert(doc.id().to_string(), doc.with_revision(rev.clone()));
        rev
    }

    /// Make the next `count` updates of `id` lose against a concurrent writer.
    ///
    /// Each injected write bumps the stored revision right before the update
    /// is checked, so the caller's revision is stale.
    pub fn inject_conflicts(&self, id: &str, count: u32) {
        *self.foreign_writes.entry(id.to_string()).or_insert(0) += count;
    }

    /// Injected conflicts not consumed yet for `id`.
    pub fn pending_conflicts(&self, id: &str) -> u32 {
        self.foreign_writes.get(id).map(|c| *c).unwrap_or(0)
    }

    /// Fail every call with `status` (`None` to recover).
    pub fn set_outage(&self, status: Option<u16>) {
        self.outage.store(status.unwrap_or(0), Ordering::Relaxed);
    }

    fn check_outage(&self, id: &str) -> Result<()> {
        match self.outage.load(Ordering::Relaxed) {
            0 => Ok(()),
            status => Err(CouchError::from_status(
                status,
                id,
                Some("service_unavailable"),
                Some("simulated outage"),
            )),
        }
    }

    fn take_foreign_write(&self, id: &str) -> bool {
        match self.foreign_writes.get_mut(id) {
            Some(mut pending) if *pending > 0 => {
                *pending -= 1;
                true
            }
            _ => false,
        }
    }
}

fn next_revision(current: Option<&Revision>) -> Revision {
    let generation = current.and_then(Revision::generation).unwrap_or(0) + 1;
    Revision::new(format!("{}-{}", generation, Uuid::new_v4().simple()))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Document>> {
        self.check_outage(id)?;
        Ok(self.document(id))
    }

    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>> {
        self.check_outage("_find")?;
        let mut found = Vec::new();
        for entry in self.docs.iter() {
            if query.matches(entry.value())? {
                found.push(entry.value().clone());
            }
        }
        found.sort_by(|a, b| a.id().cmp(b.id()));
        if let Some(limit) = query.max_results() {
            found.truncate(limit as usize);
        }
        Ok(found)
    }

    async fn insert(&self, doc: &Document) -> Result<Revision> {
        self.check_outage(doc.id())?;
        let rev = next_revision(None);
        match self.docs.entry(doc.id().to_string()) {
            Entry::Occupied(_) => Err(CouchError::Conflict {
                id: doc.id().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(doc.clone().with_revision(rev.clone()));
                self.writes.fetch_add(1, Ordering::Relaxed);
                Ok(rev)
            }
        }
    }

    async fn update(&self, doc: &Document) -> Result<Revision> {
        self.check_outage(doc.id())?;
        let mut stored = self.docs.get_mut(doc.id()).ok_or_else(|| CouchError::NotFound {
            id: doc.id().to_string(),
        })?;

        if self.take_foreign_write(doc.id()) {
            let bumped = next_revision(stored.revision());
            debug!(id = %doc.id(), rev = %bumped, "Simulated concurrent write");
            stored.set_revision(bumped);
        }

        if doc.revision().is_none() || doc.revision() != stored.revision() {
            return Err(CouchError::Conflict {
                id: doc.id().to_string(),
            });
        }

        let rev = next_revision(stored.revision());
        *stored = doc.clone().with_revision(rev.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(rev)
    }

    async fn delete(&self, doc: &Document) -> Result<()> {
        self.check_outage(doc.id())?;
        let current = self
            .docs
            .get(doc.id())
            .map(|d| d.revision().cloned())
            .ok_or_else(|| CouchError::NotFound {
                id: doc.id().to_string(),
            })?;

        if doc.revision().is_none() || doc.revision() != current.as_ref() {
            return Err(CouchError::Conflict {
                id: doc.id().to_string(),
            });
        }

        self.docs.remove(doc.id());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
