//! Database module for state storage.
//!
//! [`Database`] owns the document store connection and hands out
//! repositories (read path) and managers (write path) that share it.

mod repository;

pub use repository::StateRepository;

use crate::clock::{Clock, SystemClock};
use crate::config::{self, Config, ConnectionConfig, ManagerConfig};
use crate::error::DatabaseError;
use crate::manager::{MAX_RETRIES, StatesManager};
use crate::state::{Property, StateVariant};
use couch_proto::{DocumentStore, HttpStore};
use std::sync::Arc;
use tracing::info;

/// Database handle shared by repositories and managers.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl Database {
    /// Connect to a CouchDB server, creating the database if needed.
    pub async fn connect(config: &ConnectionConfig) -> couch_proto::Result<Self> {
        let mut builder = HttpStore::builder(config.server_url(), &config.database).timeout(config.timeout());
        if let Some(username) = &config.username {
            builder = builder.credentials(username, config.password.clone());
        }
        let store = builder.build()?;

        let created = store.ensure_database().await?;
        info!(
            server = %config.server_url(),
            database = %config.database,
            created,
            "Database connected"
        );

        Ok(Self::with_store(Arc::new(store)))
    }

    /// Validate `config`, connect and apply its manager settings.
    pub async fn from_config(config: &Config) -> Result<Self, DatabaseError> {
        config::validate(config).map_err(DatabaseError::InvalidConfig)?;
        let db = Self::connect(&config.connection).await?;
        Ok(db.with_manager_config(&config.manager))
    }

    /// Apply manager settings to managers built from this handle.
    pub fn with_manager_config(self, config: &ManagerConfig) -> Self {
        self.with_max_retries(config.max_retries)
    }

    /// Wrap an existing store.
    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            max_retries: MAX_RETRIES,
        }
    }

    /// Clock handed to managers built from this handle.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Conflict retry bound handed to managers built from this handle.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Get the underlying document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Get a repository for states of variant `S`.
    pub fn states<S: StateVariant>(&self) -> StateRepository<'_, S> {
        StateRepository::new(self.store.as_ref())
    }

    /// Get the property repository.
    pub fn properties(&self) -> StateRepository<'_, Property> {
        self.states()
    }

    /// Build a manager for states of variant `S` on this store.
    pub fn manager<S: StateVariant>(&self) -> StatesManager<S> {
        StatesManager::new(Arc::clone(&self.store))
            .with_clock(Arc::clone(&self.clock))
            .with_max_retries(self.max_retries)
    }
}
