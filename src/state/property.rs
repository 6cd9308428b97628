use super::{State, StateMeta, StateVariant, opt_string};
use crate::codec::{self, CREATED_FIELD, FieldSpec, FieldValue, ID_FIELD, UPDATED_FIELD, Values};
use crate::error::ValidationError;
use couch_proto::Document;
use serde_json::{Map, Value};

pub(crate) const VALUE_FIELD: &str = "value";
pub(crate) const EXPECTED_FIELD: &str = "expected";
pub(crate) const PENDING_FIELD: &str = "pending";

const UPDATE_FIELDS: &[&str] = &[VALUE_FIELD, EXPECTED_FIELD, PENDING_FIELD];

/// Reported and commanded value of a device or channel property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    meta: StateMeta,
    value: Option<String>,
    expected: Option<String>,
    pending: bool,
}

impl Property {
    /// Last reported value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Last commanded value.
    pub fn expected(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    /// True while a commanded value waits for confirmation.
    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

impl State for Property {
    fn meta(&self) -> &StateMeta {
        &self.meta
    }

    fn variant_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(VALUE_FIELD.to_string(), opt_string(&self.value));
        map.insert(EXPECTED_FIELD.to_string(), opt_string(&self.expected));
        map.insert(PENDING_FIELD.to_string(), Value::Bool(self.pending));
        map
    }
}

impl StateVariant for Property {
    const KIND: &'static str = "property";

    fn create_fields() -> FieldSpec {
        FieldSpec::new()
            .required(ID_FIELD)
            .with_default(VALUE_FIELD, FieldValue::Null)
            .with_default(EXPECTED_FIELD, FieldValue::Null)
            .with_default(PENDING_FIELD, false)
            .with_default(CREATED_FIELD, FieldValue::Null)
            .with_default(UPDATED_FIELD, FieldValue::Null)
    }

    fn update_fields() -> &'static [&'static str] {
        UPDATE_FIELDS
    }

    /// A new property starts without values and nothing pending.
    fn prepare_create(values: &mut Values) {
        values.insert(VALUE_FIELD, FieldValue::Null);
        values.insert(EXPECTED_FIELD, FieldValue::Null);
        values.insert(PENDING_FIELD, false);
    }

    fn from_document(document: Document) -> Result<Self, ValidationError> {
        let value = codec::read_string(&document, VALUE_FIELD)?;
        let expected = codec::read_string(&document, EXPECTED_FIELD)?;
        let pending = codec::read_flag(&document, PENDING_FIELD)?;
        Ok(Self {
            meta: StateMeta::from_document(document)?,
            value,
            expected,
            pending,
        })
    }
}

/// Typed changes for the live-value path.
///
/// `None` leaves a field alone; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyChanges {
    pub value: Option<Option<String>>,
    pub expected: Option<Option<String>>,
    pub pending: Option<bool>,
}

impl PropertyChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(Some(value.into()));
        self
    }

    pub fn clear_value(mut self) -> Self {
        self.value = Some(None);
        self
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(Some(expected.into()));
        self
    }

    pub fn clear_expected(mut self) -> Self {
        self.expected = Some(None);
        self
    }

    pub fn pending(mut self, pending: bool) -> Self {
        self.pending = Some(pending);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.expected.is_none() && self.pending.is_none()
    }

    pub fn into_values(self) -> Values {
        let mut values = Values::new();
        if let Some(value) = self.value {
            values.insert(VALUE_FIELD, value);
        }
        if let Some(expected) = self.expected {
            values.insert(EXPECTED_FIELD, expected);
        }
        if let Some(pending) = self.pending {
            values.insert(PENDING_FIELD, pending);
        }
        values
    }
}
