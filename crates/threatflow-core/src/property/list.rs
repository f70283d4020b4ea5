use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use log::trace;
use serde_json::Value;
use uuid::Uuid;

use super::{Property, PropertyDescriptor, PropertyMeta, hash};
use crate::error::ModelError;

/// Ordered, homogeneous collection keyed by generated ids.
///
/// Every element is built from the list's form, so all elements share one
/// shape. Elements keep their keys across clones and JSON round trips.
#[derive(Debug, Clone, PartialEq)]
pub struct ListProperty {
    meta: PropertyMeta,
    form: Arc<PropertyDescriptor>,
    items: IndexMap<String, Property>,
}

impl ListProperty {
    pub fn new(meta: PropertyMeta, form: PropertyDescriptor) -> Self {
        Self {
            meta,
            form: Arc::new(form),
            items: IndexMap::new(),
        }
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    /// Returns the template every element is built from.
    pub fn form(&self) -> &PropertyDescriptor {
        &self.form
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.items.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.items.get_index_of(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Property> {
        self.items.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Appends a fresh element built from the form and returns its key.
    ///
    /// # Errors
    ///
    /// Returns an error if the form itself cannot be built.
    pub fn add_item(&mut self) -> Result<String, ModelError> {
        let key = generate_key();
        let item = self.form.build(&key)?;
        self.items.insert(key.clone(), item);
        Ok(key)
    }

    /// Builds an element from the form, writes `value` into it, and appends it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateKey`] if `key` is already present, or a
    /// shape error if `value` does not fit the form.
    pub fn insert_json(&mut self, key: Option<&str>, value: &Value) -> Result<String, ModelError> {
        let key = key.map_or_else(generate_key, str::to_string);
        if self.items.contains_key(&key) {
            return Err(ModelError::DuplicateKey(key));
        }
        let mut item = self.form.build(&key)?;
        item.set_json(value)?;
        self.items.insert(key.clone(), item);
        Ok(key)
    }

    /// Removes an element, preserving the order of the others.
    pub fn remove_item(&mut self, key: &str) -> Option<Property> {
        self.items.shift_remove(key)
    }

    /// Edits one element in place.
    pub fn edit<R>(&mut self, key: &str, f: impl FnOnce(&mut Property) -> R) -> Option<R> {
        let item = self.items.get_mut(key)?;
        let result = f(item);
        trace!(list = self.meta.id(), key; "List element changed");
        Some(result)
    }

    /// A list is defined when at least one element is.
    pub fn is_defined(&self) -> bool {
        self.items.values().any(Property::is_defined)
    }

    /// Encodes as an array of `[key, value]` entries.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.items
                .iter()
                .map(|(key, item)| Value::Array(vec![Value::String(key.clone()), item.to_json()]))
                .collect(),
        )
    }

    pub fn to_hash(&self) -> u64 {
        hash::hash_children("list", self.items.values().map(|p| (None, p.to_hash())))
    }

    pub fn clone_with_id(&self, id: Option<&str>) -> Self {
        Self {
            meta: self.meta.renamed(id),
            ..self.clone()
        }
    }

    /// Replaces the contents.
    ///
    /// Accepts `null` (empty list), an array of `[key, value]` entries, or an
    /// array of bare values (keys are generated).
    pub(crate) fn set_json(&mut self, value: &Value) -> Result<(), ModelError> {
        let entries = match value {
            Value::Null => {
                self.items.clear();
                return Ok(());
            }
            Value::Array(entries) => entries,
            _ => {
                return Err(ModelError::ValueShape {
                    id: self.meta.id().to_string(),
                    expected: "an array of entries",
                });
            }
        };

        let mut items = IndexMap::with_capacity(entries.len());
        for entry in entries {
            let (key, value) = match entry.as_array().map(Vec::as_slice) {
                Some([Value::String(key), value]) => (key.clone(), value),
                _ => (generate_key(), entry),
            };
            if items.contains_key(&key) {
                return Err(ModelError::DuplicateKey(key));
            }
            let mut item = self.form.build(&key)?;
            item.set_json(value)?;
            items.insert(key, item);
        }
        self.items = items;
        Ok(())
    }
}

impl fmt::Display for ListProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for item in self.items.values().filter(|p| p.is_defined()) {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
            first = false;
        }
        Ok(())
    }
}

/// Generates a 32-character hex key for a new element.
fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}
