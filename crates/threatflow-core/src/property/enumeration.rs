use std::{fmt, sync::Arc};

use serde_json::Value;

use super::{ListProperty, NONE_DISPLAY, Property, PropertyMeta, hash};

/// A choice of one key from a bound options list.
///
/// The options list is shared between clones. Writing a key that is not among
/// the options leaves the property unset rather than failing.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumProperty {
    meta: PropertyMeta,
    options: Arc<ListProperty>,
    value: Option<String>,
}

impl EnumProperty {
    pub fn new(meta: PropertyMeta, options: ListProperty) -> Self {
        Self::with_shared_options(meta, Arc::new(options))
    }

    pub fn with_shared_options(meta: PropertyMeta, options: Arc<ListProperty>) -> Self {
        Self {
            meta,
            options,
            value: None,
        }
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    pub fn options(&self) -> &ListProperty {
        &self.options
    }

    /// Returns the selected option key.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Selects an option by key. Unknown keys unset the property.
    pub fn set_value(&mut self, key: Option<&str>) {
        self.value = key
            .filter(|key| self.options.contains_key(key))
            .map(str::to_string);
    }

    /// Resolves the selected option's own property.
    pub fn reference_value(&self) -> Option<&Property> {
        self.value.as_deref().and_then(|key| self.options.get(key))
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn to_json(&self) -> Value {
        match &self.value {
            Some(key) => Value::String(key.clone()),
            None => Value::Null,
        }
    }

    pub fn to_hash(&self) -> u64 {
        match &self.value {
            Some(key) => hash::hash_value("enum", key),
            None => hash::UNDEFINED_HASH,
        }
    }

    pub fn clone_with_id(&self, id: Option<&str>) -> Self {
        Self {
            meta: self.meta.renamed(id),
            ..self.clone()
        }
    }

    /// Booleans are accepted as the keys `"true"` and `"false"`.
    pub(crate) fn set_json(&mut self, value: &Value) {
        match value {
            Value::String(key) => self.set_value(Some(key)),
            Value::Bool(flag) => self.set_value(Some(if *flag { "true" } else { "false" })),
            _ => self.value = None,
        }
    }
}

impl fmt::Display for EnumProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reference_value() {
            Some(option) => fmt::Display::fmt(option, f),
            None => f.write_str(NONE_DISPLAY),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::property::PropertyDescriptor;

    fn scope() -> EnumProperty {
        let form = PropertyDescriptor::string();
        let mut options = ListProperty::new(PropertyMeta::new("options"), form);
        options
            .set_json(&json!([["incident", "Incident"], ["campaign", "Campaign"]]))
            .unwrap();
        EnumProperty::new(PropertyMeta::new("scope"), options)
    }

    #[test]
    fn test_select_known_option() {
        let mut prop = scope();
        prop.set_value(Some("campaign"));

        assert_eq!(prop.value(), Some("campaign"));
        assert_eq!(prop.to_json(), json!("campaign"));
        assert_eq!(prop.to_string(), "Campaign");
        assert_eq!(prop.reference_value().unwrap().to_string(), "Campaign");
    }

    #[test]
    fn test_unknown_option_unsets() {
        let mut prop = scope();
        prop.set_value(Some("incident"));
        prop.set_value(Some("malware"));

        assert!(!prop.is_defined());
        assert_eq!(prop.to_string(), "None");
        assert_eq!(prop.to_hash(), hash::UNDEFINED_HASH);
    }

    #[test]
    fn test_clones_share_options() {
        let prop = scope();
        let copy = prop.clone_with_id(Some("other"));
        assert!(Arc::ptr_eq(&prop.options, &copy.options));
        assert_eq!(copy.meta().id(), "other");
    }

    #[test]
    fn test_set_json_bool_keys() {
        let form = PropertyDescriptor::string();
        let mut options = ListProperty::new(PropertyMeta::new("options"), form);
        options
            .set_json(&json!([["true", "True"], ["false", "False"]]))
            .unwrap();
        let mut prop = EnumProperty::new(PropertyMeta::new("is_active"), options);

        prop.set_json(&json!(true));
        assert_eq!(prop.value(), Some("true"));

        prop.set_json(&json!(3));
        assert_eq!(prop.value(), None);
    }
}
