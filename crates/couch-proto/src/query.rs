//! Mango `_find` queries.
//!
//! Only field equality is modelled; it is what state lookups need and what
//! the in-memory store can evaluate.

use crate::document::{Document, ID_KEY};
use crate::error::{CouchError, Result};
use serde_json::{Map, Value, json};

const OP_EQ: &str = "$eq";

/// A `_find` request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    selector: Map<String, Value>,
    limit: Option<u32>,
}

impl FindQuery {
    /// Empty selector (matches every document).
    pub fn new() -> Self {
        Self::default()
    }

    /// Query for documents whose `field` equals `value`.
    pub fn field_eq(field: impl Into<String>, value: Value) -> Self {
        Self::new().and_eq(field, value)
    }

    /// Add an equality condition.
    pub fn and_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        let mut condition = Map::new();
        condition.insert(OP_EQ.to_string(), value);
        self.selector.insert(field.into(), Value::Object(condition));
        self
    }

    /// Limit the number of returned documents.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Configured limit, if any.
    pub fn max_results(&self) -> Option<u32> {
        self.limit
    }

    /// Selector object.
    pub fn selector(&self) -> &Map<String, Value> {
        &self.selector
    }

    /// Request body for `POST /{db}/_find`.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("selector".to_string(), Value::Object(self.selector.clone()));
        if let Some(limit) = self.limit {
            body.insert("limit".to_string(), json!(limit));
        }
        Value::Object(body)
    }

    /// Evaluate the selector against a document.
    ///
    /// `_id` conditions are matched against the primary identifier. Operators
    /// other than `$eq` are rejected.
    pub fn matches(&self, doc: &Document) -> Result<bool> {
        for (field, condition) in &self.selector {
            let expected = match condition {
                Value::Object(ops) => {
                    let mut expected = None;
                    for (op, operand) in ops {
                        if op != OP_EQ {
                            return Err(CouchError::Unsupported(format!("selector operator {op}")));
                        }
                        expected = Some(operand);
                    }
                    match expected {
                        Some(v) => v,
                        None => continue,
                    }
                }
                // Bare values are implicit `$eq`.
                other => other,
            };

            let actual = if field == ID_KEY {
                Value::String(doc.id().to_string())
            } else {
                match doc.get(field) {
                    Some(v) => v.clone(),
                    None => return Ok(false),
                }
            };

            if &actual != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
