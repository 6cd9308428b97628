//! State manager: the write path.
//!
//! Creates, updates and deletes state documents under optimistic
//! concurrency. No in-process lock guards an identifier: an update writes
//! against the revision it last saw and, when the store reports a conflict,
//! re-reads the latest document and tries again, up to `max_retries` times.
//! The retry budget belongs to a single call.
//!
//! Listeners registered on [`StatesManager::notifier`] run after each
//! successful write, on the caller's task.

use crate::clock::{Clock, SystemClock};
use crate::codec::{self, CREATED_FIELD, FieldSpec, ID_FIELD, UPDATED_FIELD, Values};
use crate::error::{StateError, StateResult};
use crate::notify::Notifier;
use crate::state::{Property, PropertyChanges, StateVariant};
use crate::telemetry::spans;
use couch_proto::{CouchError, Document, DocumentStore};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, debug, error, warn};
use uuid::Uuid;

/// Conflict retries after the first attempt.
pub const MAX_RETRIES: u32 = 5;

/// Manager for one state variant.
pub struct StatesManager<S: StateVariant> {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    notifier: Notifier<S>,
    max_retries: u32,
}

/// Manager for property states.
pub type PropertiesManager = StatesManager<Property>;

impl<S: StateVariant> fmt::Debug for StatesManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatesManager")
            .field("kind", &S::KIND)
            .field("max_retries", &self.max_retries)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl<S: StateVariant> StatesManager<S> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            notifier: Notifier::new(),
            max_retries: MAX_RETRIES,
        }
    }

    /// Use `clock` for `created` / `updated` stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the conflict retry bound.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Listener registry for after-mutation events.
    pub fn notifier(&self) -> &Notifier<S> {
        &self.notifier
    }

    fn now(&self) -> Value {
        Value::String(codec::format_instant(&self.clock.now()))
    }

    // ------------------------------------------------------------------
    // create
    // ------------------------------------------------------------------

    /// Create a state using the variant's declared fields.
    pub async fn create(&self, id: Uuid, values: Values) -> StateResult<S> {
        self.create_with(id, values, &S::create_fields()).await
    }

    /// Create a state from a caller-supplied field spec.
    pub async fn create_with(&self, id: Uuid, mut values: Values, spec: &FieldSpec) -> StateResult<S> {
        async move {
            values.insert(ID_FIELD, id);
            S::prepare_create(&mut values);

            let mut doc = codec::project(spec, &values)?;
            doc.set(CREATED_FIELD, self.now());
            doc.set(UPDATED_FIELD, Value::Null);

            let stored = match self.insert_and_reload(&doc).await {
                Ok(stored) => stored,
                Err(e) => {
                    error!(operation = "create", id = %id, code = e.code(), error = %e, "State could not be created");
                    return Err(StateError::CreateFailed {
                        id,
                        code: e.code(),
                        source: e,
                    });
                }
            };

            let state = S::from_document(stored)?;
            self.notifier.on_after_create(&state).await?;
            Ok(state)
        }
        .instrument(spans::state_operation("create", id))
        .await
    }

    async fn insert_and_reload(&self, doc: &Document) -> couch_proto::Result<Document> {
        self.store.insert(doc).await?;
        self.store
            .get(doc.id())
            .await?
            .ok_or_else(|| CouchError::NotFound {
                id: doc.id().to_string(),
            })
    }

    // ------------------------------------------------------------------
    // update
    // ------------------------------------------------------------------

    /// Apply `values` to the variant's updatable fields.
    ///
    /// Returns the new state, or `state` itself when nothing changed (no
    /// write and no notification in that case).
    pub async fn update(&self, state: &S, values: &Values) -> StateResult<S> {
        self.update_with(state, values, S::update_fields()).await
    }

    /// Apply `values` to an explicit list of fields.
    pub async fn update_with(&self, state: &S, values: &Values, fields: &[&str]) -> StateResult<S> {
        let id = state.id();
        async move {
            let updated = match self.write_changes(state, values, fields).await {
                Ok(updated) => updated,
                Err(StateError::NotUpdated) => {
                    debug!(id = %id, "State is not updated");
                    return Ok(state.clone());
                }
                Err(e) => return Err(e),
            };

            self.notifier.on_after_update(&updated, state).await?;
            Ok(updated)
        }
        .instrument(spans::state_operation("update", id))
        .await
    }

    /// Optimistic-concurrency write loop.
    ///
    /// Fails with [`StateError::NotUpdated`] when no field differs from the
    /// held (or re-read) document.
    async fn write_changes(&self, state: &S, values: &Values, fields: &[&str]) -> StateResult<S> {
        let id = state.id();
        let mut doc = state.document().clone();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if codec::stage_changes(&mut doc, values, fields).is_empty() {
                return Err(StateError::NotUpdated);
            }
            doc.set(UPDATED_FIELD, self.now());

            let written = self
                .store
                .update(&doc)
                .instrument(spans::store_request("update", doc.id()))
                .await;

            match written {
                Ok(rev) => {
                    doc.set_revision(rev);
                    return Ok(S::from_document(doc)?);
                }
                Err(e) if e.is_conflict() && attempt <= self.max_retries => {
                    warn!(
                        id = %id,
                        attempt,
                        max_retries = self.max_retries,
                        "Revision conflict, retrying with latest document"
                    );
                    doc = match self.store.get(doc.id()).await {
                        Ok(Some(latest)) => latest,
                        Ok(None) => {
                            let gone = CouchError::NotFound {
                                id: doc.id().to_string(),
                            };
                            return Err(self.update_failed(id, attempt, gone));
                        }
                        Err(e) => return Err(self.update_failed(id, attempt, e)),
                    };
                }
                Err(e) => return Err(self.update_failed(id, attempt, e)),
            }
        }
    }

    fn update_failed(&self, id: Uuid, attempts: u32, source: CouchError) -> StateError {
        error!(
            operation = "update",
            id = %id,
            attempts,
            code = source.code(),
            error = %source,
            "State could not be updated"
        );
        StateError::UpdateFailed {
            id,
            code: source.code(),
            attempts,
            source,
        }
    }

    // ------------------------------------------------------------------
    // delete
    // ------------------------------------------------------------------

    /// Delete the stored document of `state`.
    ///
    /// An already absent document counts as deleted. Store failures are
    /// logged and reported as `Ok(false)`; only listener failures are errors.
    pub async fn delete(&self, state: &S) -> StateResult<bool> {
        let id = state.id();
        async move {
            match self.remove(state.document().id()).await {
                Ok(true) => {}
                Ok(false) => debug!(id = %id, "State document already deleted"),
                Err(e) => {
                    error!(operation = "delete", id = %id, code = e.code(), error = %e, "State could not be deleted");
                    return Ok(false);
                }
            }

            self.notifier.on_after_delete(state).await?;
            Ok(true)
        }
        .instrument(spans::state_operation("delete", id))
        .await
    }

    /// Delete by primary key. Returns `false` when there was nothing to delete.
    async fn remove(&self, key: &str) -> couch_proto::Result<bool> {
        let Some(current) = self.store.get(key).await? else {
            return Ok(false);
        };
        self.store.delete(&current).await?;
        Ok(true)
    }
}

impl StatesManager<Property> {
    /// Live-value update of `value`, `expected` and `pending`.
    ///
    /// Listeners receive the new state, but the caller gets back the state
    /// it passed in.
    pub async fn update_state(&self, state: &Property, changes: PropertyChanges) -> StateResult<Property> {
        self.update_with(state, &changes.into_values(), Property::update_fields())
            .await?;
        Ok(state.clone())
    }
}
