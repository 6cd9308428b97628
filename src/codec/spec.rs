//! Declarative field specs.

use super::FieldValue;

/// One declared document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEntry {
    /// Must be supplied by the caller.
    Required(String),
    /// Falls back to the given value when absent.
    Default(String, FieldValue),
}

impl FieldEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Required(name) | Self::Default(name, _) => name,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required(_))
    }
}

/// Ordered list of declared fields for a state variant.
///
/// Declaring the same name twice replaces the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSpec {
    entries: Vec<FieldEntry>,
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field the caller must supply.
    pub fn required(self, name: impl Into<String>) -> Self {
        self.push(FieldEntry::Required(name.into()))
    }

    /// Declare a field with a fallback value.
    pub fn with_default(self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.push(FieldEntry::Default(name.into(), value.into()))
    }

    fn push(mut self, entry: FieldEntry) -> Self {
        match self.entries.iter_mut().find(|e| e.name() == entry.name()) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(FieldEntry::name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
