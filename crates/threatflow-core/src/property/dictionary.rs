use std::fmt;

use indexmap::IndexMap;
use log::trace;
use serde_json::{Map, Value};

use super::{NONE_DISPLAY, Property, PropertyMeta, hash};
use crate::error::ModelError;

/// Heterogeneous, keyed collection with a fixed field set.
///
/// A dictionary may name one representative field. When present, the
/// representative alone decides whether the dictionary is defined and what it
/// displays as.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryProperty {
    meta: PropertyMeta,
    fields: IndexMap<String, Property>,
    representative: Option<String>,
}

impl DictionaryProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            fields: IndexMap::new(),
            representative: None,
        }
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    /// Appends a field, keyed by the field's id.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateKey`] if a field with the same id exists.
    pub fn add_field(&mut self, field: Property) -> Result<(), ModelError> {
        let key = field.id().to_string();
        if self.fields.contains_key(&key) {
            return Err(ModelError::DuplicateKey(key));
        }
        self.fields.insert(key, field);
        Ok(())
    }

    /// Marks a field as representative. Unknown keys clear the representative.
    pub fn set_representative(&mut self, key: &str) {
        self.representative = self.fields.contains_key(key).then(|| key.to_string());
    }

    pub fn with_representative(mut self, key: &str) -> Self {
        self.set_representative(key);
        self
    }

    /// Returns the representative field, if one is set.
    pub fn representative(&self) -> Option<&Property> {
        self.representative
            .as_deref()
            .and_then(|key| self.fields.get(key))
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Edits one field in place.
    pub fn edit<R>(&mut self, key: &str, f: impl FnOnce(&mut Property) -> R) -> Option<R> {
        let field = self.fields.get_mut(key)?;
        let result = f(field);
        trace!(dictionary = self.meta.id(), key; "Dictionary field changed");
        Some(result)
    }

    pub fn is_defined(&self) -> bool {
        match self.representative() {
            Some(field) => field.is_defined(),
            None => self.fields.values().any(Property::is_defined),
        }
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(key, field)| (key.clone(), field.to_json()))
            .collect();
        Value::Object(map)
    }

    pub fn to_hash(&self) -> u64 {
        hash::hash_children(
            "dict",
            self.fields
                .iter()
                .map(|(key, field)| (Some(key.as_str()), field.to_hash())),
        )
    }

    pub fn clone_with_id(&self, id: Option<&str>) -> Self {
        Self {
            meta: self.meta.renamed(id),
            ..self.clone()
        }
    }

    /// Writes matching fields from an object (or `[key, value]` entries).
    ///
    /// Unknown keys are ignored. `null` clears every field. Fields are
    /// written to a staged copy, so a failing field leaves the dictionary
    /// unchanged.
    pub(crate) fn set_json(&mut self, value: &Value) -> Result<(), ModelError> {
        let mut fields = self.fields.clone();
        match value {
            Value::Null => {
                for field in fields.values_mut() {
                    field.set_json(&Value::Null)?;
                }
            }
            Value::Object(map) => {
                for (key, value) in map {
                    if let Some(field) = fields.get_mut(key) {
                        field.set_json(value)?;
                    }
                }
            }
            Value::Array(entries) => {
                for entry in entries {
                    let Some([Value::String(key), value]) = entry.as_array().map(Vec::as_slice)
                    else {
                        continue;
                    };
                    if let Some(field) = fields.get_mut(key) {
                        field.set_json(value)?;
                    }
                }
            }
            _ => {
                return Err(ModelError::ValueShape {
                    id: self.meta.id().to_string(),
                    expected: "an object",
                });
            }
        }
        self.fields = fields;
        Ok(())
    }
}

impl fmt::Display for DictionaryProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = self.representative() {
            return fmt::Display::fmt(field, f);
        }
        let mut defined = self.fields.values().filter(|p| p.is_defined()).peekable();
        if defined.peek().is_none() {
            return f.write_str(NONE_DISPLAY);
        }
        let mut first = true;
        for field in defined {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::property::{IntProperty, ListProperty, PropertyDescriptor, StringProperty};

    fn reference() -> DictionaryProperty {
        let mut dict = DictionaryProperty::new(PropertyMeta::new("external_reference"));
        for id in ["source_name", "description", "url"] {
            dict.add_field(StringProperty::new(PropertyMeta::new(id)).into())
                .unwrap();
        }
        dict
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut dict = reference();
        let err = dict
            .add_field(StringProperty::new(PropertyMeta::new("url")).into())
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateKey(ref k) if k == "url"));
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn test_to_json_preserves_field_order() {
        let mut dict = reference();
        dict.set_json(&json!({"url": "https://example.com", "source_name": "Blog"}))
            .unwrap();

        let encoded = serde_json::to_string(&dict.to_json()).unwrap();
        assert_eq!(
            encoded,
            r#"{"source_name":"Blog","description":null,"url":"https://example.com"}"#
        );
    }

    #[test]
    fn test_representative_drives_definedness() {
        let mut dict = reference().with_representative("source_name");
        dict.set_json(&json!({"url": "https://example.com"})).unwrap();
        assert!(!dict.is_defined());
        assert_eq!(dict.to_string(), "None");

        dict.edit("source_name", |f| f.set_json(&json!("Blog")).unwrap());
        assert!(dict.is_defined());
        assert_eq!(dict.to_string(), "Blog");
    }

    #[test]
    fn test_without_representative_joins_fields() {
        let mut dict = DictionaryProperty::new(PropertyMeta::new("option"));
        dict.add_field(StringProperty::new(PropertyMeta::new("text")).into())
            .unwrap();
        dict.add_field(IntProperty::new(PropertyMeta::new("value")).into())
            .unwrap();
        assert!(!dict.is_defined());

        dict.set_json(&json!({"text": "Probable", "value": 70}))
            .unwrap();
        assert_eq!(dict.to_string(), "Probable, 70");
    }

    #[test]
    fn test_set_json_entries_and_shape() {
        let mut dict = reference();
        dict.set_json(&json!([["url", "https://a.test"], ["unknown", "x"]]))
            .unwrap();
        assert_eq!(dict.get("url").unwrap().to_string(), "https://a.test");

        let err = dict.set_json(&json!("text")).unwrap_err();
        assert!(matches!(err, ModelError::ValueShape { .. }));
    }

    #[test]
    fn test_failed_write_leaves_fields_unchanged() {
        let mut dict = reference();
        dict.add_field(
            ListProperty::new(PropertyMeta::new("tags"), PropertyDescriptor::string()).into(),
        )
        .unwrap();
        dict.set_json(&json!({"source_name": "Blog"})).unwrap();
        let before = dict.to_json();

        let err = dict
            .set_json(&json!({"source_name": "changed", "tags": "not-a-list"}))
            .unwrap_err();

        assert!(matches!(err, ModelError::ValueShape { ref id, .. } if id == "tags"));
        assert_eq!(dict.to_json(), before);
        assert_eq!(dict.get("source_name").unwrap().to_string(), "Blog");
    }

    #[test]
    fn test_hash_keyed_by_field() {
        let mut a = reference();
        a.set_json(&json!({"url": "x"})).unwrap();
        let mut b = reference();
        b.set_json(&json!({"description": "x"})).unwrap();

        assert_ne!(a.to_hash(), b.to_hash());
        assert_eq!(a.to_hash(), a.clone_with_id(Some("copy")).to_hash());
    }
}
