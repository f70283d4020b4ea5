use std::{fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use log::{trace, warn};
use serde_json::{Map, Value};

use super::{CombinationIndex, Property, PropertyKind, PropertyMeta, hash};
use crate::error::ModelError;

/// A fixed set of atomic fields whose values constrain one another.
///
/// With a [`CombinationIndex`] attached, every write re-validates all
/// option-bearing fields (strings and enums) against every other assigned
/// field. Fields whose value fell out of their valid set are cleared, and
/// fields left with a single valid option take it. This repeats until nothing
/// changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleProperty {
    meta: PropertyMeta,
    fields: IndexMap<String, Property>,
    index: Option<Arc<CombinationIndex>>,
}

impl TupleProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            fields: IndexMap::new(),
            index: None,
        }
    }

    pub fn with_combinations(mut self, index: Arc<CombinationIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    pub fn combinations(&self) -> Option<&CombinationIndex> {
        self.index.as_deref()
    }

    /// Appends an atomic field, keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidDescriptor`] for collection fields and
    /// [`ModelError::DuplicateKey`] for repeated ids.
    pub fn add_field(&mut self, field: Property) -> Result<(), ModelError> {
        if matches!(
            field.kind(),
            PropertyKind::List | PropertyKind::Dictionary | PropertyKind::Tuple
        ) {
            return Err(ModelError::InvalidDescriptor {
                id: self.meta.id().to_string(),
                reason: format!("tuples cannot contain {} fields", field.kind()),
            });
        }
        let key = field.id().to_string();
        if self.fields.contains_key(&key) {
            return Err(ModelError::DuplicateKey(key));
        }
        self.fields.insert(key, field);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.fields.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Edits one field, then re-runs the constraints.
    pub fn edit<R>(&mut self, key: &str, f: impl FnOnce(&mut Property) -> R) -> Option<R> {
        let field = self.fields.get_mut(key)?;
        let result = f(field);
        self.reconcile(Some(key));
        Some(result)
    }

    /// Writes several fields at once, then runs the constraints once.
    ///
    /// Unknown keys are ignored.
    pub fn set_entries<'a>(&mut self, entries: impl IntoIterator<Item = (&'a str, &'a Value)>) {
        for (key, value) in entries {
            if let Some(field) = self.fields.get_mut(key) {
                // Fields are atomic, so writes cannot fail
                let _ = field.set_json(value);
            }
        }
        self.reconcile(None);
    }

    /// Returns the values `field` may currently take.
    ///
    /// `None` when the tuple has no combination index or the index does not
    /// know the field.
    pub fn valid_options(&self, field: &str) -> Option<IndexSet<String>> {
        let index = self.index.as_ref()?;
        let assigned = self.assigned();
        index.valid_options(&assigned).shift_remove(field)
    }

    /// Runs the constraints to a fixed point without a preceding write.
    pub fn propagate(&mut self) {
        self.reconcile(None);
    }

    pub fn is_defined(&self) -> bool {
        self.fields.values().any(Property::is_defined)
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
            "tuple",
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

    /// Accepts an object or `[key, value]` entries; `null` clears every field.
    pub(crate) fn set_json(&mut self, value: &Value) -> Result<(), ModelError> {
        match value {
            Value::Null => {
                let keys: Vec<String> = self.fields.keys().cloned().collect();
                self.set_entries(keys.iter().map(|k| (k.as_str(), &Value::Null)));
            }
            Value::Object(map) => self.set_entries(map.iter().map(|(k, v)| (k.as_str(), v))),
            Value::Array(entries) => {
                let pairs = entries
                    .iter()
                    .filter_map(|entry| match entry.as_array().map(Vec::as_slice) {
                        Some([Value::String(key), value]) => Some((key.as_str(), value)),
                        _ => None,
                    });
                self.set_entries(pairs);
            }
            _ => {
                return Err(ModelError::ValueShape {
                    id: self.meta.id().to_string(),
                    expected: "an object",
                });
            }
        }
        Ok(())
    }

    fn assigned(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(key, field)| field.option_key().map(|value| (key.as_str(), value)))
            .collect()
    }

    /// Applies one correction per pass and recomputes, until stable.
    ///
    /// `last` names the field that was just written; when several fields
    /// hold invalid values, the others are cleared first.
    fn reconcile(&mut self, last: Option<&str>) {
        let Some(index) = self.index.clone() else {
            return;
        };
        let limit = 2 * self.fields.len() + 2;
        for _ in 0..limit {
            let valid = index.valid_options(&self.assigned());
            if !self.correct_once(&valid, last) {
                return;
            }
        }
        warn!(tuple = self.meta.id(), passes = limit; "Tuple constraints did not settle");
    }

    fn correct_once(&mut self, valid: &IndexMap<String, IndexSet<String>>, last: Option<&str>) -> bool {
        // Clear a field holding a value outside its valid set
        let invalid: Vec<String> = self
            .fields
            .iter()
            .filter(|(key, field)| {
                matches!(
                    (field.option_key(), valid.get(key.as_str())),
                    (Some(value), Some(options)) if !options.contains(value)
                )
            })
            .map(|(key, _)| key.clone())
            .collect();
        let target = invalid
            .iter()
            .find(|key| Some(key.as_str()) != last)
            .or_else(|| invalid.first());
        if let Some(key) = target {
            if let Some(field) = self.fields.get_mut(key) {
                trace!(tuple = self.meta.id(), field = key.as_str(); "Clearing invalid tuple value");
                field.assign_option(None);
                return true;
            }
        }

        // Select the only remaining option of a field
        for (key, options) in valid {
            if options.len() != 1 {
                continue;
            }
            let Some(field) = self.fields.get_mut(key) else {
                continue;
            };
            if !matches!(field.kind(), PropertyKind::String | PropertyKind::Enum) {
                continue;
            }
            let Some(only) = options.first() else {
                continue;
            };
            if field.option_key() == Some(only.as_str()) {
                continue;
            }
            field.assign_option(Some(only));
            if field.option_key() == Some(only.as_str()) {
                trace!(tuple = self.meta.id(), field = key.as_str(), value = only.as_str(); "Auto-selected tuple value");
                return true;
            }
        }
        false
    }
}

impl fmt::Display for TupleProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in self.fields.values() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
            first = false;
        }
        Ok(())
    }
}
