//! Integration test common infrastructure.
//!
//! Provides an in-memory database fixture with a frozen clock, and
//! listeners that record or reject state events.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use couch_proto::MemoryStore;
use parking_lot::Mutex;
use statestore::{
    Database, EventKind, FixedClock, ListenerError, PropertiesManager, Property, State, StateEvent,
    StateListener,
};
use std::sync::Arc;
use uuid::Uuid;

pub const PROPERTY_ID: &str = "11111111-1111-1111-1111-111111111111";

pub fn property_id() -> Uuid {
    Uuid::parse_str(PROPERTY_ID).expect("valid uuid")
}

/// Instant the fixture clock starts at.
pub const START: &str = "2020-05-11T10:00:00+00:00";

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub db: Database,
    pub manager: Arc<PropertiesManager>,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2020, 5, 11, 10, 0, 0).unwrap()));
        let db = Database::with_store(store.clone()).with_clock(clock.clone());
        let manager = Arc::new(db.manager());
        Self {
            store,
            clock,
            db,
            manager,
        }
    }

    /// Attach a recorder to every event kind.
    pub fn record(&self) -> Arc<RecordingListener> {
        let recorder = Arc::new(RecordingListener::default());
        for kind in [EventKind::Created, EventKind::Updated, EventKind::Deleted] {
            self.manager.notifier().subscribe(kind, recorder.clone());
        }
        recorder
    }
}

/// One observed event.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub kind: EventKind,
    pub id: Uuid,
    pub value: Option<String>,
    pub previous_value: Option<String>,
}

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl StateListener<Property> for RecordingListener {
    async fn on_event(&self, event: &StateEvent<'_, Property>) -> Result<(), ListenerError> {
        self.events.lock().push(Recorded {
            kind: event.kind(),
            id: event.state().id(),
            value: event.state().value().map(str::to_string),
            previous_value: event.previous().and_then(|p| p.value()).map(str::to_string),
        });
        Ok(())
    }
}

/// Rejects every event it sees.
pub struct RejectingListener;

#[async_trait]
impl StateListener<Property> for RejectingListener {
    async fn on_event(&self, event: &StateEvent<'_, Property>) -> Result<(), ListenerError> {
        Err(ListenerError::Rejected(format!("{} refused", event.kind())))
    }
}
