use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use log::trace;
use serde_json::Value;

use super::{DictionaryProperty, Property};
use crate::error::ModelError;

/// Describes one completed edit of a root property.
#[derive(Debug, Clone, Copy)]
pub struct PropertyChange<'a> {
    /// Keys from the root to the edited property; empty for whole-root writes.
    pub path: &'a [&'a str],
    /// The root's revision after the edit.
    pub revision: u64,
}

/// Receives change notifications from a [`RootProperty`].
pub trait PropertySubscriber: Send + Sync {
    fn property_changed(&self, change: &PropertyChange<'_>);
}

impl<F> PropertySubscriber for F
where
    F: Fn(&PropertyChange<'_>) + Send + Sync,
{
    fn property_changed(&self, change: &PropertyChange<'_>) {
        self(change)
    }
}

/// The property dictionary owned by a diagram object.
///
/// All writes go through [`RootProperty::edit`] or [`RootProperty::set_json`].
/// Each write bumps the revision and notifies subscribers after every
/// collection on the path has reacted. Clones start without subscribers.
pub struct RootProperty {
    value: DictionaryProperty,
    revision: u64,
    subscribers: IndexMap<String, Arc<dyn PropertySubscriber>>,
}

impl RootProperty {
    pub fn new(value: DictionaryProperty) -> Self {
        Self {
            value,
            revision: 0,
            subscribers: IndexMap::new(),
        }
    }

    pub fn value(&self) -> &DictionaryProperty {
        &self.value
    }

    /// Number of writes since creation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.value.get(key)
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&Property> {
        let (head, rest) = path.split_first()?;
        self.value.get(head)?.get_path(rest)
    }

    /// Registers a subscriber under `id`, replacing any previous one.
    pub fn subscribe(&mut self, id: impl Into<String>, subscriber: Arc<dyn PropertySubscriber>) {
        self.subscribers.insert(id.into(), subscriber);
    }

    pub fn unsubscribe(&mut self, id: &str) -> bool {
        self.subscribers.shift_remove(id).is_some()
    }

    /// Edits the property at `path` and propagates the change to the root.
    ///
    /// Returns `None`, without notifying anyone, if the path does not resolve.
    pub fn edit<R>(&mut self, path: &[&str], f: impl FnOnce(&mut Property) -> R) -> Option<R> {
        let (head, rest) = path.split_first()?;
        let result = self
            .value
            .edit(head, |child| child.edit_path(rest, f))
            .flatten()?;
        self.changed(path);
        Some(result)
    }

    /// Writes the JSON value at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the path does not resolve, or the
    /// shape error raised by the target property. Subscribers are notified
    /// only after a successful write.
    pub fn set_path_json(&mut self, path: &[&str], value: &Value) -> Result<(), ModelError> {
        let not_found = || ModelError::NotFound(path.join("."));
        let (head, rest) = path.split_first().ok_or_else(not_found)?;
        self.value
            .edit(head, |child| child.edit_path(rest, |prop| prop.set_json(value)))
            .flatten()
            .ok_or_else(not_found)??;
        self.changed(path);
        Ok(())
    }

    /// Writes every matching field from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ValueShape`] for non-object payloads. A failed
    /// write changes nothing and notifies no one.
    pub fn set_json(&mut self, value: &Value) -> Result<(), ModelError> {
        self.value.set_json(value)?;
        self.changed(&[]);
        Ok(())
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_defined()
    }

    pub fn to_json(&self) -> Value {
        self.value.to_json()
    }

    pub fn to_hash(&self) -> u64 {
        self.value.to_hash()
    }

    fn changed(&mut self, path: &[&str]) {
        self.revision += 1;
        trace!(root = self.value.meta().id(), path:? = path, revision = self.revision; "Property changed");
        let change = PropertyChange {
            path,
            revision: self.revision,
        };
        for subscriber in self.subscribers.values() {
            subscriber.property_changed(&change);
        }
    }
}

impl Clone for RootProperty {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl PartialEq for RootProperty {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Debug for RootProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootProperty")
            .field("value", &self.value)
            .field("revision", &self.revision)
            .field("subscribers", &self.subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for RootProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::property::{ListProperty, PropertyDescriptor, PropertyMeta, StringProperty};

    fn root() -> RootProperty {
        let mut author = DictionaryProperty::new(PropertyMeta::new("author"));
        author
            .add_field(StringProperty::new(PropertyMeta::new("name")).into())
            .unwrap();
        let mut dict = DictionaryProperty::new(PropertyMeta::new("root"));
        dict.add_field(StringProperty::new(PropertyMeta::new("name")).into())
            .unwrap();
        dict.add_field(author.into()).unwrap();
        RootProperty::new(dict.with_representative("name"))
    }

    #[test]
    fn test_edit_bumps_revision_and_notifies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut root = root();
        root.subscribe(
            "recorder",
            Arc::new(move |change: &PropertyChange<'_>| {
                sink.lock()
                    .unwrap()
                    .push((change.path.join("."), change.revision));
            }),
        );

        root.set_path_json(&["author", "name"], &json!("Jane")).unwrap();
        root.set_path_json(&["name"], &json!("Flow")).unwrap();

        assert_eq!(root.revision(), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("author.name".to_string(), 1), ("name".to_string(), 2)]
        );
        assert_eq!(root.to_string(), "Flow");
    }

    #[test]
    fn test_unresolved_path_is_silent() {
        let mut root = root();
        let err = root.set_path_json(&["missing"], &json!("x")).unwrap_err();
        assert!(matches!(err, ModelError::NotFound(ref p) if p == "missing"));
        assert!(root.edit(&[], |_| ()).is_none());
        assert_eq!(root.revision(), 0);
    }

    #[test]
    fn test_failed_write_is_not_applied() {
        let notified = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&notified);

        let mut dict = DictionaryProperty::new(PropertyMeta::new("root"));
        dict.add_field(StringProperty::new(PropertyMeta::new("name")).into())
            .unwrap();
        dict.add_field(
            ListProperty::new(PropertyMeta::new("tags"), PropertyDescriptor::string()).into(),
        )
        .unwrap();
        let mut root = RootProperty::new(dict);
        root.subscribe(
            "counter",
            Arc::new(move |_: &PropertyChange<'_>| *counter.lock().unwrap() += 1),
        );
        let before = root.to_json();

        let err = root
            .set_json(&json!({"name": "changed", "tags": "not-a-list"}))
            .unwrap_err();
        assert!(matches!(err, ModelError::ValueShape { .. }));
        let err = root.set_path_json(&["tags"], &json!(7)).unwrap_err();
        assert!(matches!(err, ModelError::ValueShape { .. }));

        assert_eq!(root.to_json(), before);
        assert_eq!(root.revision(), 0);
        assert_eq!(*notified.lock().unwrap(), 0);
    }

    #[test]
    fn test_clone_drops_subscribers() {
        let mut root = root();
        root.subscribe("noop", Arc::new(|_: &PropertyChange<'_>| {}));
        let copy = root.clone();
        assert!(copy.subscribers.is_empty());
        assert_eq!(copy, root);
        assert!(root.unsubscribe("noop"));
    }
}
