//! State document codec.
//!
//! Maps declarative field specs and typed input values onto flat store
//! documents, and reads document fields back into typed state parts.
//!
//! - [`value`]: [`FieldValue`] / [`Values`] input types and normalization
//! - [`spec`]: [`FieldSpec`] declarations (required keys and defaults)
//!
//! Everything here is a pure transformation; no store access.

mod spec;
mod value;

pub use spec::{FieldEntry, FieldSpec};
pub use value::{EnumCode, FieldValue, Values, format_instant, normalize, parse_instant};

use crate::error::ValidationError;
use crate::state::StateVariant;
use couch_proto::Document;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Payload field mirroring the document's primary identifier.
pub const ID_FIELD: &str = "id";
/// Creation instant.
pub const CREATED_FIELD: &str = "created";
/// Last mutation instant.
pub const UPDATED_FIELD: &str = "updated";

/// Build a document from a field spec and input values.
///
/// Every spec field ends up in the document, null included. The `id` value
/// must be present and becomes both the `id` field and the document `_id`.
pub fn project(spec: &FieldSpec, values: &Values) -> Result<Document, ValidationError> {
    let mut fields = Map::new();

    for entry in spec.entries() {
        let value = match (entry, values.get(entry.name())) {
            (FieldEntry::Required(name), None) => {
                return Err(ValidationError::MissingField(name.clone()));
            }
            (_, Some(given)) => normalize(given),
            (FieldEntry::Default(_, default), None) => normalize(default),
        };
        fields.insert(entry.name().to_string(), value);
    }

    let id = match values.get(ID_FIELD).map(normalize) {
        Some(Value::String(id)) => id,
        Some(other) => return Err(ValidationError::InvalidId(other.to_string())),
        None => return Err(ValidationError::MissingField(ID_FIELD.to_string())),
    };
    fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));

    Ok(Document::with_fields(id, fields))
}

/// Stage changed values into `doc`.
///
/// Only `fields` present in `values` are considered; each is normalized and
/// compared with the document's current value. Returns the names of the
/// fields that changed (empty when the update is a no-op).
pub fn stage_changes(doc: &mut Document, values: &Values, fields: &[&str]) -> Vec<String> {
    let mut changed = Vec::new();
    for field in fields {
        let Some(given) = values.get(field) else {
            continue;
        };
        let next = normalize(given);
        if doc.get(field) != Some(&next) {
            doc.set(*field, next);
            changed.push((*field).to_string());
        }
    }
    changed
}

/// Decode a stored document into a typed state.
pub fn decode<S: StateVariant>(document: Document) -> Result<S, ValidationError> {
    S::from_document(document)
}

/// Read and validate the `id` payload field.
pub fn read_id(doc: &Document) -> Result<Uuid, ValidationError> {
    match doc.get(ID_FIELD) {
        Some(Value::String(raw)) => {
            Uuid::parse_str(raw).map_err(|_| ValidationError::InvalidId(raw.clone()))
        }
        Some(Value::Null) | None => Err(ValidationError::MissingField(ID_FIELD.to_string())),
        Some(other) => Err(ValidationError::InvalidId(other.to_string())),
    }
}

/// Read a nullable string field; scalars are rendered as strings.
pub fn read_string(doc: &Document, field: &str) -> Result<Option<String>, ValidationError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "expected a scalar".to_string(),
        }),
    }
}

/// Read a boolean flag; absent or null reads as `false`.
pub fn read_flag(doc: &Document, field: &str) -> Result<bool, ValidationError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Some(_) => Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Read a nullable instant field, kept in its stored textual form.
pub fn read_instant(doc: &Document, field: &str) -> Result<Option<String>, ValidationError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if parse_instant(s).is_some() => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "expected an RFC 3339 instant".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    const ID: &str = "11111111-1111-1111-1111-111111111111";

    fn device_spec() -> FieldSpec {
        FieldSpec::new()
            .required(ID_FIELD)
            .required("device")
            .with_default("value", FieldValue::Null)
            .with_default("pending", false)
    }

    #[test]
    fn test_project_fills_defaults_and_mirrors_id() {
        let values = Values::new().with(ID_FIELD, ID).with("device", "thermostat");
        let doc = project(&device_spec(), &values).unwrap();

        assert_eq!(doc.id(), ID);
        assert_eq!(doc.value_of(ID_FIELD), &json!(ID));
        assert_eq!(doc.value_of("device"), &json!("thermostat"));
        assert!(doc.contains("value"));
        assert_eq!(doc.value_of("value"), &Value::Null);
        assert_eq!(doc.value_of("pending"), &json!(false));
        assert!(doc.revision().is_none());
    }

    #[test]
    fn test_project_requires_declared_keys() {
        let values = Values::new().with(ID_FIELD, ID);
        let err = project(&device_spec(), &values).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("device".to_string()));
    }

    #[test]
    fn test_project_requires_id_even_if_undeclared() {
        let spec = FieldSpec::new().with_default("pending", false);
        let err = project(&spec, &Values::new()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("id".to_string()));
    }

    #[test]
    fn test_project_ignores_undeclared_values() {
        let values = Values::new()
            .with(ID_FIELD, ID)
            .with("device", "d")
            .with("settable", true);
        let doc = project(&device_spec(), &values).unwrap();
        assert!(!doc.contains("settable"));
    }

    #[test]
    fn test_project_keeps_explicit_null_over_default() {
        let spec = FieldSpec::new().required(ID_FIELD).with_default("pending", false);
        let values = Values::new().with(ID_FIELD, ID).with("pending", FieldValue::Null);
        let doc = project(&spec, &values).unwrap();
        assert_eq!(doc.value_of("pending"), &Value::Null);
    }

    #[test]
    fn test_project_normalizes_timestamps() {
        let spec = FieldSpec::new().required(ID_FIELD).with_default("seen", FieldValue::Null);
        let at = Utc.with_ymd_and_hms(2020, 5, 11, 10, 0, 0).unwrap();
        let values = Values::new().with(ID_FIELD, ID).with("seen", at);
        let doc = project(&spec, &values).unwrap();
        assert_eq!(doc.value_of("seen"), &json!("2020-05-11T10:00:00+00:00"));
    }

    #[test]
    fn test_decode_of_projection_keeps_values() {
        use crate::state::{Property, State};

        let created = Utc.with_ymd_and_hms(2020, 5, 11, 10, 0, 0).unwrap();
        let values = Values::new()
            .with(ID_FIELD, Uuid::parse_str(ID).unwrap())
            .with("value", 21.5)
            .with("pending", true)
            .with(CREATED_FIELD, created);
        let doc = project(&Property::create_fields(), &values).unwrap();
        let property: Property = decode(doc).unwrap();

        assert_eq!(property.id().to_string(), ID);
        assert_eq!(property.value(), Some("21.5"));
        assert_eq!(property.expected(), None);
        assert!(property.is_pending());
        assert_eq!(property.created(), Some("2020-05-11T10:00:00+00:00"));
        assert_eq!(property.updated(), None);
    }

    #[test]
    fn test_stage_changes_only_touches_differences() {
        let mut doc = Document::new(ID);
        doc.set("value", json!("10"));
        doc.set("expected", Value::Null);
        doc.set("pending", json!(false));

        let values = Values::new()
            .with("value", "10")
            .with("expected", "20")
            .with("untracked", "x");
        let changed = stage_changes(&mut doc, &values, &["value", "expected", "pending"]);

        assert_eq!(changed, vec!["expected".to_string()]);
        assert_eq!(doc.value_of("expected"), &json!("20"));
        assert!(!doc.contains("untracked"));
    }

    #[test]
    fn test_stage_changes_no_op() {
        let mut doc = Document::new(ID);
        doc.set("pending", json!(true));
        let values = Values::new().with("pending", true);
        assert!(stage_changes(&mut doc, &values, &["pending"]).is_empty());
    }

    #[test]
    fn test_read_id_validates() {
        let mut doc = Document::new("x");
        assert_eq!(read_id(&doc), Err(ValidationError::MissingField("id".into())));

        doc.set(ID_FIELD, json!("invalid-string"));
        assert_eq!(read_id(&doc), Err(ValidationError::InvalidId("invalid-string".into())));

        doc.set(ID_FIELD, json!(ID));
        assert_eq!(read_id(&doc).unwrap().to_string(), ID);
    }

    #[test]
    fn test_read_string_renders_scalars() {
        let mut doc = Document::new(ID);
        doc.set("a", json!(10.33));
        doc.set("b", json!(true));
        doc.set("c", json!({ "nested": 1 }));

        assert_eq!(read_string(&doc, "a").unwrap().as_deref(), Some("10.33"));
        assert_eq!(read_string(&doc, "b").unwrap().as_deref(), Some("true"));
        assert_eq!(read_string(&doc, "missing").unwrap(), None);
        assert!(read_string(&doc, "c").is_err());
    }

    #[test]
    fn test_read_instant_rejects_garbage() {
        let mut doc = Document::new(ID);
        doc.set(CREATED_FIELD, json!("yesterday"));
        assert!(read_instant(&doc, CREATED_FIELD).is_err());

        doc.set(CREATED_FIELD, json!("2020-05-11T10:00:00+02:00"));
        assert_eq!(
            read_instant(&doc, CREATED_FIELD).unwrap().as_deref(),
            Some("2020-05-11T10:00:00+02:00")
        );
    }
}
