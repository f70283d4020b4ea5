use std::fmt;

use serde_json::Value;

use super::{NONE_DISPLAY, PropertyMeta, hash};

/// Free-text property with optional suggested values.
#[derive(Debug, Clone, PartialEq)]
pub struct StringProperty {
    meta: PropertyMeta,
    value: Option<String>,
    suggestions: Vec<String>,
}

impl StringProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            value: None,
            suggestions: Vec::new(),
        }
    }

    /// Sets the values offered to the user. Suggestions never restrict input.
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn to_json(&self) -> Value {
        match &self.value {
            Some(value) => Value::String(value.clone()),
            None => Value::Null,
        }
    }

    pub fn to_hash(&self) -> u64 {
        match &self.value {
            Some(value) => hash::hash_value("str", value),
            None => hash::UNDEFINED_HASH,
        }
    }

    pub fn clone_with_id(&self, id: Option<&str>) -> Self {
        Self {
            meta: self.meta.renamed(id),
            ..self.clone()
        }
    }

    /// Accepts strings, and renders numbers and booleans as text.
    pub(crate) fn set_json(&mut self, value: &Value) {
        self.value = match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        };
    }
}

impl fmt::Display for StringProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value.as_deref().unwrap_or(NONE_DISPLAY))
    }
}
