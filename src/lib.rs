//! # statestore
//!
//! Property state storage on a CouchDB-compatible document store.
//!
//! States are versioned documents keyed by UUID. The write path
//! ([`StatesManager`]) uses optimistic concurrency with a bounded retry on
//! revision conflicts and notifies registered listeners after every
//! committed mutation; the read path ([`StateRepository`]) looks states up
//! by their payload `id`.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use couch_proto::MemoryStore;
//! use statestore::{Database, PropertiesManager, PropertyChanges, Values};
//! use uuid::Uuid;
//!
//! # async fn demo() -> statestore::StateResult<()> {
//! let db = Database::with_store(Arc::new(MemoryStore::new()));
//! let manager: PropertiesManager = db.manager();
//!
//! let id = Uuid::new_v4();
//! let created = manager.create(id, Values::new()).await?;
//! manager
//!     .update_state(&created, PropertyChanges::new().expected("on").pending(true))
//!     .await?;
//!
//! assert_eq!(db.properties().find_expected(id).await?.as_deref(), Some("on"));
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]

pub mod bridge;
pub mod clock;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod manager;
pub mod notify;
pub mod publisher;
pub mod state;
pub mod telemetry;

pub use self::bridge::{BridgeOutcome, ChangeBridge, EntityAction, EntityChange};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::codec::{FieldSpec, FieldValue, Values};
pub use self::config::{Config, ConnectionConfig};
pub use self::db::{Database, StateRepository};
pub use self::error::{DatabaseError, ListenerError, StateError, StateResult, ValidationError};
pub use self::manager::{MAX_RETRIES, PropertiesManager, StatesManager};
pub use self::notify::{EventKind, ListenerHandle, Notifier, StateEvent, StateListener};
pub use self::publisher::{Owner, OwnerResolver, PropertyUpdatePublisher, Publisher};
pub use self::state::{Property, PropertyChanges, State, StateVariant};
