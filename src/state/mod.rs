//! Persisted state records.
//!
//! A state is a versioned document keyed by a UUID. [`StateMeta`] carries
//! the parts every variant shares (identifier, timestamps and the stored
//! document with its revision); variants add their own typed fields and
//! declare how they are created and which fields an update may touch.

mod property;

pub use property::{Property, PropertyChanges};

use crate::codec::{self, CREATED_FIELD, FieldSpec, UPDATED_FIELD, Values};
use crate::error::ValidationError;
use chrono::{DateTime, FixedOffset};
use couch_proto::{Document, Revision};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Identifier, timestamps and stored document shared by every state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMeta {
    id: Uuid,
    created: Option<String>,
    updated: Option<String>,
    document: Document,
}

impl StateMeta {
    /// Read the shared parts out of a stored document.
    pub fn from_document(document: Document) -> Result<Self, ValidationError> {
        Ok(Self {
            id: codec::read_id(&document)?,
            created: codec::read_instant(&document, CREATED_FIELD)?,
            updated: codec::read_instant(&document, UPDATED_FIELD)?,
            document,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Creation instant in its stored canonical form.
    pub fn created(&self) -> Option<&str> {
        self.created.as_deref()
    }

    /// Last mutation instant in its stored canonical form.
    pub fn updated(&self) -> Option<&str> {
        self.updated.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn revision(&self) -> Option<&Revision> {
        self.document.revision()
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(codec::ID_FIELD.to_string(), Value::String(self.id.to_string()));
        map.insert(CREATED_FIELD.to_string(), opt_string(&self.created));
        map.insert(UPDATED_FIELD.to_string(), opt_string(&self.updated));
        map
    }
}

pub(crate) fn opt_string(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::String)
}

/// Read access common to all state variants.
pub trait State: Clone + fmt::Debug + Send + Sync + 'static {
    fn meta(&self) -> &StateMeta;

    /// Variant fields, without the shared ones.
    fn variant_map(&self) -> Map<String, Value>;

    fn id(&self) -> Uuid {
        self.meta().id()
    }

    fn created(&self) -> Option<&str> {
        self.meta().created()
    }

    fn updated(&self) -> Option<&str> {
        self.meta().updated()
    }

    fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.created().and_then(codec::parse_instant)
    }

    fn updated_at(&self) -> Option<DateTime<FixedOffset>> {
        self.updated().and_then(codec::parse_instant)
    }

    /// Held document, including the revision it was read at.
    fn document(&self) -> &Document {
        self.meta().document()
    }

    /// All fields as a flat map.
    fn to_map(&self) -> Map<String, Value> {
        let mut map = self.meta().to_map();
        map.extend(self.variant_map());
        map
    }
}

/// A concrete state kind the manager and repository can work with.
pub trait StateVariant: State {
    /// Short name used in logs.
    const KIND: &'static str;

    /// Fields written when a state is created.
    fn create_fields() -> FieldSpec;

    /// Fields an update is allowed to change.
    fn update_fields() -> &'static [&'static str];

    /// Adjust caller values before a new state is projected.
    fn prepare_create(_values: &mut Values) {}

    /// Decode a stored document.
    fn from_document(document: Document) -> Result<Self, ValidationError>;
}
