//! Typed property trees attached to diagram objects.
//!
//! A [`Property`] is a self-describing value node. Atomic variants hold a
//! single value ([`StringProperty`], [`IntProperty`], [`FloatProperty`],
//! [`DateProperty`], [`EnumProperty`]); collection variants own child
//! properties ([`ListProperty`], [`DictionaryProperty`], [`TupleProperty`]).
//! Every object in a diagram owns exactly one [`RootProperty`].
//!
//! # Change propagation
//!
//! Collections never hand out mutable references to their children. A child is
//! changed through its parent's `edit` method, which runs the edit and then
//! lets the parent react (a tuple re-runs its constraints). Edits on a root go
//! through [`RootProperty::edit`], which bumps the root's revision and notifies
//! subscribers. Because there is no other path to a nested `&mut Property`,
//! every write to a leaf walks back up the whole parent chain.
//!
//! # Common operations
//!
//! Every variant supports definedness checks, JSON encoding, display strings,
//! structural hashing ([`Property::to_hash`]), and cloning under a new id.

mod combination;
mod date;
mod descriptor;
mod dictionary;
mod enumeration;
mod hash;
mod list;
mod numeric;
mod root;
mod string;
mod tuple;

pub use combination::{CombinationIndex, ValidOptions};
pub use date::DateProperty;
pub use descriptor::{DescriptorKind, PropertyDescriptor};
pub use dictionary::DictionaryProperty;
pub use enumeration::EnumProperty;
pub use hash::UNDEFINED_HASH;
pub use list::ListProperty;
pub use numeric::{FloatProperty, IntProperty};
pub use root::{PropertyChange, PropertySubscriber, RootProperty};
pub use string::StringProperty;
pub use tuple::TupleProperty;

use std::fmt;

use serde_json::Value;

use crate::error::ModelError;

/// Text rendered for a property without a value.
pub(crate) const NONE_DISPLAY: &str = "None";

/// Identity shared by every property variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMeta {
    id: String,
    name: String,
    editable: bool,
}

impl PropertyMeta {
    /// Creates metadata for an editable property whose display name equals its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            editable: true,
        }
    }

    /// Sets the human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets whether a user may change the value.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Returns the property id (its key inside the parent collection).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether a user may change the value.
    pub fn is_editable(&self) -> bool {
        self.editable
    }

    fn renamed(&self, id: Option<&str>) -> Self {
        match id {
            Some(id) => Self {
                id: id.to_string(),
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}

/// The closed set of property variants, without their data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    String,
    Int,
    Float,
    Date,
    Enum,
    List,
    Dictionary,
    Tuple,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::String => "string",
            PropertyKind::Int => "int",
            PropertyKind::Float => "float",
            PropertyKind::Date => "date",
            PropertyKind::Enum => "enum",
            PropertyKind::List => "list",
            PropertyKind::Dictionary => "dictionary",
            PropertyKind::Tuple => "tuple",
        };
        f.write_str(name)
    }
}

/// A typed value node.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    String(StringProperty),
    Int(IntProperty),
    Float(FloatProperty),
    Date(DateProperty),
    Enum(EnumProperty),
    List(ListProperty),
    Dictionary(DictionaryProperty),
    Tuple(TupleProperty),
}

macro_rules! dispatch {
    ($self:expr, $prop:ident => $body:expr) => {
        match $self {
            Property::String($prop) => $body,
            Property::Int($prop) => $body,
            Property::Float($prop) => $body,
            Property::Date($prop) => $body,
            Property::Enum($prop) => $body,
            Property::List($prop) => $body,
            Property::Dictionary($prop) => $body,
            Property::Tuple($prop) => $body,
        }
    };
}

impl Property {
    /// Returns the property's identity.
    pub fn meta(&self) -> &PropertyMeta {
        dispatch!(self, p => p.meta())
    }

    /// Returns the property id.
    pub fn id(&self) -> &str {
        self.meta().id()
    }

    /// Returns the human-readable name.
    pub fn name(&self) -> &str {
        self.meta().name()
    }

    /// Returns whether a user may change the value.
    pub fn is_editable(&self) -> bool {
        self.meta().is_editable()
    }

    /// Returns which variant this property is.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Property::String(_) => PropertyKind::String,
            Property::Int(_) => PropertyKind::Int,
            Property::Float(_) => PropertyKind::Float,
            Property::Date(_) => PropertyKind::Date,
            Property::Enum(_) => PropertyKind::Enum,
            Property::List(_) => PropertyKind::List,
            Property::Dictionary(_) => PropertyKind::Dictionary,
            Property::Tuple(_) => PropertyKind::Tuple,
        }
    }

    /// Returns whether the property holds a value.
    pub fn is_defined(&self) -> bool {
        dispatch!(self, p => p.is_defined())
    }

    /// Encodes the value as JSON.
    ///
    /// Collections preserve insertion order.
    pub fn to_json(&self) -> Value {
        dispatch!(self, p => p.to_json())
    }

    /// Computes the structural hash of the value.
    ///
    /// Equal values hash equally regardless of instance; an unset value hashes
    /// to [`UNDEFINED_HASH`].
    pub fn to_hash(&self) -> u64 {
        dispatch!(self, p => p.to_hash())
    }

    /// Deep-clones the property, optionally under a new id.
    pub fn clone_with_id(&self, id: Option<&str>) -> Property {
        match self {
            Property::String(p) => Property::String(p.clone_with_id(id)),
            Property::Int(p) => Property::Int(p.clone_with_id(id)),
            Property::Float(p) => Property::Float(p.clone_with_id(id)),
            Property::Date(p) => Property::Date(p.clone_with_id(id)),
            Property::Enum(p) => Property::Enum(p.clone_with_id(id)),
            Property::List(p) => Property::List(p.clone_with_id(id)),
            Property::Dictionary(p) => Property::Dictionary(p.clone_with_id(id)),
            Property::Tuple(p) => Property::Tuple(p.clone_with_id(id)),
        }
    }

    /// Writes a JSON-encoded value, using the same encoding as [`Property::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ValueShape`] when a collection receives a payload
    /// of the wrong structure. Atomic properties never fail; values they cannot
    /// interpret leave them unset.
    pub fn set_json(&mut self, value: &Value) -> Result<(), ModelError> {
        match self {
            Property::String(p) => p.set_json(value),
            Property::Int(p) => p.set_json(value),
            Property::Float(p) => p.set_json(value),
            Property::Date(p) => p.set_json(value),
            Property::Enum(p) => p.set_json(value),
            Property::List(p) => return p.set_json(value),
            Property::Dictionary(p) => return p.set_json(value),
            Property::Tuple(p) => return p.set_json(value),
        }
        Ok(())
    }

    /// Returns the child with the given key, for collection variants.
    pub fn get(&self, key: &str) -> Option<&Property> {
        match self {
            Property::List(p) => p.get(key),
            Property::Dictionary(p) => p.get(key),
            Property::Tuple(p) => p.get(key),
            _ => None,
        }
    }

    /// Follows a path of keys through nested collections.
    pub fn get_path(&self, path: &[&str]) -> Option<&Property> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.get(head)?.get_path(rest),
        }
    }

    /// Edits the child with the given key through its owning collection.
    ///
    /// Returns `None` if this property is atomic or has no such child.
    pub fn edit<R>(&mut self, key: &str, f: impl FnOnce(&mut Property) -> R) -> Option<R> {
        match self {
            Property::List(p) => p.edit(key, f),
            Property::Dictionary(p) => p.edit(key, f),
            Property::Tuple(p) => p.edit(key, f),
            _ => None,
        }
    }

    /// Edits a nested property, notifying every collection along the path.
    ///
    /// An empty path edits this property itself.
    pub fn edit_path<R>(&mut self, path: &[&str], f: impl FnOnce(&mut Property) -> R) -> Option<R> {
        match path.split_first() {
            None => Some(f(self)),
            Some((head, rest)) => self
                .edit(head, |child| child.edit_path(rest, f))
                .flatten(),
        }
    }

    /// Returns the inner [`StringProperty`], if this is one.
    pub fn as_string(&self) -> Option<&StringProperty> {
        match self {
            Property::String(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`StringProperty`] mutably, if this is one.
    pub fn as_string_mut(&mut self) -> Option<&mut StringProperty> {
        match self {
            Property::String(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`IntProperty`], if this is one.
    pub fn as_int(&self) -> Option<&IntProperty> {
        match self {
            Property::Int(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`IntProperty`] mutably, if this is one.
    pub fn as_int_mut(&mut self) -> Option<&mut IntProperty> {
        match self {
            Property::Int(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`FloatProperty`], if this is one.
    pub fn as_float(&self) -> Option<&FloatProperty> {
        match self {
            Property::Float(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`DateProperty`], if this is one.
    pub fn as_date(&self) -> Option<&DateProperty> {
        match self {
            Property::Date(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`DateProperty`] mutably, if this is one.
    pub fn as_date_mut(&mut self) -> Option<&mut DateProperty> {
        match self {
            Property::Date(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`EnumProperty`], if this is one.
    pub fn as_enum(&self) -> Option<&EnumProperty> {
        match self {
            Property::Enum(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`EnumProperty`] mutably, if this is one.
    pub fn as_enum_mut(&mut self) -> Option<&mut EnumProperty> {
        match self {
            Property::Enum(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`ListProperty`], if this is one.
    pub fn as_list(&self) -> Option<&ListProperty> {
        match self {
            Property::List(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`ListProperty`] mutably, if this is one.
    pub fn as_list_mut(&mut self) -> Option<&mut ListProperty> {
        match self {
            Property::List(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`DictionaryProperty`], if this is one.
    pub fn as_dictionary(&self) -> Option<&DictionaryProperty> {
        match self {
            Property::Dictionary(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`TupleProperty`], if this is one.
    pub fn as_tuple(&self) -> Option<&TupleProperty> {
        match self {
            Property::Tuple(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the inner [`TupleProperty`] mutably, if this is one.
    pub fn as_tuple_mut(&mut self) -> Option<&mut TupleProperty> {
        match self {
            Property::Tuple(p) => Some(p),
            _ => None,
        }
    }

    /// Current option key of a string or enum property.
    pub(crate) fn option_key(&self) -> Option<&str> {
        match self {
            Property::String(p) => p.value(),
            Property::Enum(p) => p.value(),
            _ => None,
        }
    }

    /// Assigns an option key to a string or enum property.
    pub(crate) fn assign_option(&mut self, key: Option<&str>) {
        match self {
            Property::String(p) => p.set_value(key.map(str::to_string)),
            Property::Enum(p) => p.set_value(key),
            _ => {}
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, p => fmt::Display::fmt(p, f))
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Property {
                fn from(prop: $ty) -> Self {
                    Property::$variant(prop)
                }
            }
        )*
    };
}

impl_from_variant!(
    String(StringProperty),
    Int(IntProperty),
    Float(FloatProperty),
    Date(DateProperty),
    Enum(EnumProperty),
    List(ListProperty),
    Dictionary(DictionaryProperty),
    Tuple(TupleProperty),
);
