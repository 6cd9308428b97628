//! State repository: the read path.

use crate::codec::ID_FIELD;
use crate::error::{StateError, StateResult};
use crate::state::{Property, StateVariant};
use crate::telemetry::spans;
use couch_proto::{DocumentStore, FindQuery};
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{Instrument, error};
use uuid::Uuid;

/// Repository for looking up states of one variant.
pub struct StateRepository<'a, S> {
    store: &'a dyn DocumentStore,
    _variant: PhantomData<fn() -> S>,
}

impl<'a, S: StateVariant> StateRepository<'a, S> {
    /// Create a new state repository.
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            _variant: PhantomData,
        }
    }

    /// Find a state by its identifier.
    ///
    /// Looks the state up by the `id` payload field, not the primary key.
    /// Store failures other than not-found are reported as
    /// [`StateError::LoadFailed`] and are not retried.
    pub async fn find_one(&self, id: Uuid) -> StateResult<Option<S>> {
        let query = FindQuery::field_eq(ID_FIELD, Value::String(id.to_string())).limit(1);
        let found = self
            .store
            .find(&query)
            .instrument(spans::store_request("find", &id.to_string()))
            .await;

        match found {
            Ok(docs) => match docs.into_iter().next() {
                Some(doc) => Ok(Some(S::from_document(doc)?)),
                None => Ok(None),
            },
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => {
                error!(
                    operation = "find",
                    kind = S::KIND,
                    id = %id,
                    code = e.code(),
                    error = %e,
                    "State could not be loaded"
                );
                Err(StateError::LoadFailed {
                    id,
                    code: e.code(),
                    source: e,
                })
            }
        }
    }
}

impl StateRepository<'_, Property> {
    /// Last reported value of a property, `None` when no state exists.
    pub async fn find_value(&self, id: Uuid) -> StateResult<Option<String>> {
        Ok(self
            .find_one(id)
            .await?
            .and_then(|p| p.value().map(str::to_string)))
    }

    /// Last commanded value of a property, `None` when no state exists.
    pub async fn find_expected(&self, id: Uuid) -> StateResult<Option<String>> {
        Ok(self
            .find_one(id)
            .await?
            .and_then(|p| p.expected().map(str::to_string)))
    }
}
