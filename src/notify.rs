//! After-mutation notification dispatch.
//!
//! Listeners register per [`EventKind`] and are invoked in registration
//! order once the store write has succeeded. Dispatch runs on the writer's
//! call path and stops at the first listener failure, which is returned to
//! the caller of the mutation.

use crate::error::ListenerError;
use crate::state::State;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Mutation a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed mutation.
#[derive(Debug)]
pub enum StateEvent<'a, S> {
    Created(&'a S),
    /// `previous` is the state the update started from.
    Updated { state: &'a S, previous: &'a S },
    /// Carries the state as the caller held it before deletion.
    Deleted(&'a S),
}

impl<'a, S> StateEvent<'a, S> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::Created,
            Self::Updated { .. } => EventKind::Updated,
            Self::Deleted(_) => EventKind::Deleted,
        }
    }

    /// The state the event is about.
    pub fn state(&self) -> &'a S {
        match self {
            Self::Created(state) | Self::Deleted(state) | Self::Updated { state, .. } => *state,
        }
    }

    pub fn previous(&self) -> Option<&'a S> {
        match self {
            Self::Updated { previous, .. } => Some(*previous),
            _ => None,
        }
    }
}

/// Receiver of committed mutations.
#[async_trait]
pub trait StateListener<S: State>: Send + Sync {
    async fn on_event(&self, event: &StateEvent<'_, S>) -> Result<(), ListenerError>;
}

/// Returned by [`Notifier::subscribe`]; pass to [`Notifier::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    kind: EventKind,
    id: u64,
}

impl ListenerHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

struct Registration<S> {
    id: u64,
    listener: Arc<dyn StateListener<S>>,
}

/// Ordered listener registry per event kind.
pub struct Notifier<S: State> {
    listeners: RwLock<HashMap<EventKind, Vec<Registration<S>>>>,
    next_id: AtomicU64,
}

impl<S: State> Default for Notifier<S> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<S: State> fmt::Debug for Notifier<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("Notifier")
            .field("created", &listeners.get(&EventKind::Created).map_or(0, Vec::len))
            .field("updated", &listeners.get(&EventKind::Updated).map_or(0, Vec::len))
            .field("deleted", &listeners.get(&EventKind::Deleted).map_or(0, Vec::len))
            .finish()
    }
}

impl<S: State> Notifier<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `kind`; it runs after those already registered.
    pub fn subscribe(&self, kind: EventKind, listener: Arc<dyn StateListener<S>>) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push(Registration { id, listener });
        ListenerHandle { kind, id }
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(&handle.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != handle.id);
        before != list.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    pub async fn on_after_create(&self, state: &S) -> Result<(), ListenerError> {
        self.dispatch(StateEvent::Created(state)).await
    }

    pub async fn on_after_update(&self, state: &S, previous: &S) -> Result<(), ListenerError> {
        self.dispatch(StateEvent::Updated { state, previous }).await
    }

    pub async fn on_after_delete(&self, state: &S) -> Result<(), ListenerError> {
        self.dispatch(StateEvent::Deleted(state)).await
    }

    async fn dispatch(&self, event: StateEvent<'_, S>) -> Result<(), ListenerError> {
        // Snapshot so listeners may (un)subscribe without deadlocking.
        let listeners: Vec<Arc<dyn StateListener<S>>> = self
            .listeners
            .read()
            .get(&event.kind())
            .map(|list| list.iter().map(|r| Arc::clone(&r.listener)).collect())
            .unwrap_or_default();

        if listeners.is_empty() {
            return Ok(());
        }

        debug!(
            event = %event.kind(),
            id = %event.state().id(),
            listeners = listeners.len(),
            "Dispatching state event"
        );

        for listener in listeners {
            listener.on_event(&event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Property;
    use couch_proto::Document;
    use parking_lot::Mutex;
    use serde_json::json;

    const ID: &str = "11111111-1111-1111-1111-111111111111";

    fn property(value: &str) -> Property {
        use crate::state::StateVariant;
        let mut doc = Document::new(ID);
        doc.set("id", json!(ID));
        doc.set("value", json!(value));
        Property::from_document(doc).unwrap()
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl StateListener<Property> for Recorder {
        async fn on_event(&self, event: &StateEvent<'_, Property>) -> Result<(), ListenerError> {
            self.log.lock().push(format!("{}:{}", self.name, event.kind()));
            if self.fail {
                return Err(ListenerError::Rejected(self.name.to_string()));
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<Recorder> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
            fail,
        })
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let notifier: Notifier<Property> = Notifier::new();
        notifier.subscribe(EventKind::Updated, recorder("first", &log, false));
        notifier.subscribe(EventKind::Updated, recorder("second", &log, false));
        notifier.subscribe(EventKind::Created, recorder("other", &log, false));

        let (new, old) = (property("2"), property("1"));
        notifier.on_after_update(&new, &old).await.unwrap();

        assert_eq!(*log.lock(), vec!["first:updated", "second:updated"]);
    }

    #[tokio::test]
    async fn test_failure_stops_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let notifier: Notifier<Property> = Notifier::new();
        notifier.subscribe(EventKind::Deleted, recorder("broken", &log, true));
        notifier.subscribe(EventKind::Deleted, recorder("never", &log, false));

        let err = notifier.on_after_delete(&property("1")).await.unwrap_err();
        assert!(matches!(err, ListenerError::Rejected(name) if name == "broken"));
        assert_eq!(*log.lock(), vec!["broken:deleted"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let notifier: Notifier<Property> = Notifier::new();
        let handle = notifier.subscribe(EventKind::Created, recorder("gone", &log, false));
        assert_eq!(notifier.listener_count(EventKind::Created), 1);

        assert!(notifier.unsubscribe(handle));
        assert!(!notifier.unsubscribe(handle));

        notifier.on_after_create(&property("1")).await.unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_event_accessors() {
        let (new, old) = (property("2"), property("1"));
        let event = StateEvent::Updated {
            state: &new,
            previous: &old,
        };
        assert_eq!(event.kind(), EventKind::Updated);
        assert_eq!(event.state().value(), Some("2"));
        assert_eq!(event.previous().and_then(|p| p.value()), Some("1"));
        assert!(StateEvent::Created(&new).previous().is_none());
    }
}
