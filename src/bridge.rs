//! Change-detection bridge.
//!
//! Turns owning-entity lifecycle events into state creation and deletion:
//! a created or updated property entity gets a state if it has none yet,
//! a removed one loses its state. A unit of work may report the same
//! deletion several times; each entity is deleted once, and its other
//! changes in that unit of work are ignored.

use crate::codec::Values;
use crate::db::StateRepository;
use crate::error::StateResult;
use crate::manager::PropertiesManager;
use crate::publisher::{CHANNEL_PROPERTY, DEVICE_PROPERTY};
use crate::state::Property;
use couch_proto::DocumentStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle action of an owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityAction {
    Created,
    Updated,
    Deleted,
}

/// One entry of a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChange {
    pub id: Uuid,
    /// Entity kind, e.g. [`DEVICE_PROPERTY`].
    pub kind: String,
    pub action: EntityAction,
    /// Entity fields, used as initial values for a new state.
    pub values: Values,
}

impl EntityChange {
    pub fn new(id: Uuid, kind: impl Into<String>, action: EntityAction) -> Self {
        Self {
            id,
            kind: kind.into(),
            action,
            values: Values::new(),
        }
    }

    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }
}

/// What a unit of work did to the state store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOutcome {
    pub created: Vec<Uuid>,
    pub deleted: Vec<Uuid>,
}

/// Keeps property states in step with their owning entities.
pub struct ChangeBridge {
    store: Arc<dyn DocumentStore>,
    manager: Arc<PropertiesManager>,
    kinds: HashSet<String>,
}

impl ChangeBridge {
    /// Bridge tracking device and channel property entities.
    pub fn new(store: Arc<dyn DocumentStore>, manager: Arc<PropertiesManager>) -> Self {
        Self {
            store,
            manager,
            kinds: [DEVICE_PROPERTY, CHANNEL_PROPERTY]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Also track entities of `kind`.
    pub fn track(mut self, kind: impl Into<String>) -> Self {
        self.kinds.insert(kind.into());
        self
    }

    fn repository(&self) -> StateRepository<'_, Property> {
        StateRepository::new(self.store.as_ref())
    }

    /// Process one unit of work.
    ///
    /// Deletions run first, then creations and updates in order. Entities
    /// removed in the same unit of work are not given a state again.
    pub async fn apply(&self, changes: &[EntityChange]) -> StateResult<BridgeOutcome> {
        let mut outcome = BridgeOutcome::default();
        let mut seen = HashSet::new();

        for change in changes.iter().filter(|c| c.action == EntityAction::Deleted) {
            if !seen.insert((change.kind.as_str(), change.id)) {
                debug!(id = %change.id, "Duplicate deletion skipped");
                continue;
            }
            if !self.kinds.contains(&change.kind) {
                continue;
            }
            if self.on_deleted(change.id).await? {
                outcome.deleted.push(change.id);
            }
        }

        for change in changes.iter().filter(|c| c.action != EntityAction::Deleted) {
            if !self.kinds.contains(&change.kind) {
                continue;
            }
            // Removed in this unit of work.
            if seen.contains(&(change.kind.as_str(), change.id)) {
                debug!(id = %change.id, "Change of removed entity skipped");
                continue;
            }
            if self.on_persisted(change).await? {
                outcome.created.push(change.id);
            }
        }

        Ok(outcome)
    }

    /// Create a state for a new or changed entity that has none.
    async fn on_persisted(&self, change: &EntityChange) -> StateResult<bool> {
        if self.repository().find_one(change.id).await?.is_some() {
            return Ok(false);
        }
        self.manager.create(change.id, change.values.clone()).await?;
        Ok(true)
    }

    async fn on_deleted(&self, id: Uuid) -> StateResult<bool> {
        let Some(state) = self.repository().find_one(id).await? else {
            return Ok(false);
        };
        let deleted = self.manager.delete(&state).await?;
        if !deleted {
            warn!(id = %id, "State of removed entity could not be deleted");
        }
        Ok(deleted)
    }
}
