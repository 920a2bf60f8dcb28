use serde_json::Value;

/// A document body: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// A stored document together with its id.
///
/// The id is not part of `fields`; it is the last segment of the KV key.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Document,
}

impl Record {
    /// Read a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Server-side equality filter `{field, value}` evaluated against each
/// document.
///
/// Documents missing `field` never match.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Document) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}
