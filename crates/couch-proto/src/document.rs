//! Documents and revision tokens.
//!
//! A [`Document`] is a flat JSON object addressed by `_id`. The revision
//! (`_rev`) travels next to the fields rather than inside them, so declared
//! fields and store metadata never mix.

use crate::error::{CouchError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key holding the primary identifier in the wire format.
pub const ID_KEY: &str = "_id";

/// Key holding the revision token in the wire format.
pub const REV_KEY: &str = "_rev";

/// Opaque revision token (`<generation>-<hash>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Wrap a raw revision string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token as sent to the server.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generation counter, if the token follows the `N-hash` convention.
    pub fn generation(&self) -> Option<u64> {
        self.0.split_once('-').and_then(|(n, _)| n.parse().ok())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored document: identifier, optional revision and flat field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    rev: Option<Revision>,
    fields: Map<String, Value>,
}

impl Document {
    /// Create an empty, not yet stored document.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            fields: Map::new(),
        }
    }

    /// Create a document from an existing field map.
    ///
    /// Reserved keys (`_id`, `_rev`, ...) in `fields` are dropped.
    pub fn with_fields(id: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.retain(|k, _| !k.starts_with('_'));
        Self {
            id: id.into(),
            rev: None,
            fields,
        }
    }

    /// Primary identifier (`_id`).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Revision the document was read or written at.
    pub fn revision(&self) -> Option<&Revision> {
        self.rev.as_ref()
    }

    /// Replace the held revision.
    pub fn set_revision(&mut self, rev: Revision) {
        self.rev = Some(rev);
    }

    /// Builder form of [`Document::set_revision`].
    pub fn with_revision(mut self, rev: Revision) -> Self {
        self.rev = Some(rev);
        self
    }

    /// Field value, `None` if the key is absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field value with absent keys read as `null`.
    pub fn value_of(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&Value::Null)
    }

    /// Whether the field is present (even if null).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Set a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    /// All declared fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the document into its field map.
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Wire representation including `_id` and, when known, `_rev`.
    pub fn to_json(&self) -> Value {
        let mut body = Map::with_capacity(self.fields.len() + 2);
        body.insert(ID_KEY.to_string(), Value::String(self.id.clone()));
        if let Some(rev) = &self.rev {
            body.insert(REV_KEY.to_string(), Value::String(rev.as_str().to_string()));
        }
        for (k, v) in &self.fields {
            body.insert(k.clone(), v.clone());
        }
        Value::Object(body)
    }

    /// Parse the wire representation.
    ///
    /// Store metadata other than `_id`/`_rev` (attachments, conflicts, ...)
    /// is discarded.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut body) = value else {
            return Err(CouchError::InvalidDocument("document is not an object".to_string()));
        };

        let id = match body.remove(ID_KEY) {
            Some(Value::String(id)) => id,
            Some(_) => return Err(CouchError::InvalidDocument("_id is not a string".to_string())),
            None => return Err(CouchError::InvalidDocument("_id is missing".to_string())),
        };

        let rev = match body.remove(REV_KEY) {
            Some(Value::String(rev)) => Some(Revision(rev)),
            Some(Value::Null) | None => None,
            Some(_) => return Err(CouchError::InvalidDocument("_rev is not a string".to_string())),
        };

        body.retain(|k, _| !k.starts_with('_'));

        Ok(Self {
            id,
            rev,
            fields: body,
        })
    }
}
