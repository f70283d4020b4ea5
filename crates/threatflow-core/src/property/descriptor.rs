//! Declarative property layouts.
//!
//! Templates describe their properties with [`PropertyDescriptor`] values,
//! usually deserialized from a catalog file:
//!
//! ```json
//! { "type": "int", "name": "Port", "min": 0, "max": 65535 }
//! { "type": "enum", "options": { "type": "list", "form": { "type": "string" },
//!   "default": [["true", "True"], ["false", "False"]] } }
//! ```
//!
//! [`PropertyDescriptor::build`] turns a descriptor into a live [`Property`]
//! with its default value applied.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    CombinationIndex, DateProperty, DictionaryProperty, EnumProperty, FloatProperty, IntProperty,
    ListProperty, Property, PropertyMeta, StringProperty, TupleProperty,
};
use crate::error::ModelError;

/// Default value of a date property that resolves to the build time.
const NOW: &str = "now";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Display name; defaults to the property id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "editable_by_default")]
    pub editable: bool,
    /// Initial value, in the property's JSON encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Marks the field as its dictionary's representative.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_representative: bool,
    #[serde(flatten)]
    pub kind: DescriptorKind,
}

fn editable_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DescriptorKind {
    String {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        suggestions: Vec<String>,
    },
    Int {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    Float {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Date,
    Enum {
        /// A list descriptor whose default holds the option entries.
        options: Box<PropertyDescriptor>,
        #[serde(skip)]
        built: OnceLock<Arc<ListProperty>>,
    },
    List {
        form: Box<PropertyDescriptor>,
    },
    Dictionary {
        form: IndexMap<String, PropertyDescriptor>,
    },
    Tuple {
        form: IndexMap<String, PropertyDescriptor>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        combinations: Vec<[String; 4]>,
        #[serde(skip)]
        index: OnceLock<Arc<CombinationIndex>>,
    },
}

impl PropertyDescriptor {
    pub fn new(kind: DescriptorKind) -> Self {
        Self {
            name: None,
            editable: true,
            default: None,
            is_representative: false,
            kind,
        }
    }

    /// A plain string descriptor without suggestions.
    pub fn string() -> Self {
        Self::new(DescriptorKind::String {
            suggestions: Vec::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn representative(mut self) -> Self {
        self.is_representative = true;
        self
    }

    /// Builds a property with id `id` and the default value applied.
    ///
    /// Dates are created in UTC; see [`PropertyDescriptor::build_in`].
    pub fn build(&self, id: &str) -> Result<Property, ModelError> {
        self.build_in(id, Tz::UTC)
    }

    /// Builds a property whose dates, at any depth, start out in `zone`.
    ///
    /// Enum option lists and tuple combination indices are built once per
    /// descriptor and shared by every property built from it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidDescriptor`] if an enum's options are not
    /// a list or a tuple holds collection fields, and a shape error if the
    /// default value does not fit.
    pub fn build_in(&self, id: &str, zone: Tz) -> Result<Property, ModelError> {
        let meta = PropertyMeta::new(id)
            .with_name(self.name.as_deref().unwrap_or(id))
            .with_editable(self.editable);

        let mut property: Property = match &self.kind {
            DescriptorKind::String { suggestions } => StringProperty::new(meta)
                .with_suggestions(suggestions.clone())
                .into(),
            DescriptorKind::Int { min, max } => IntProperty::new(meta)
                .with_range(min.unwrap_or(i64::MIN), max.unwrap_or(i64::MAX))
                .into(),
            DescriptorKind::Float { min, max } => FloatProperty::new(meta)
                .with_range(
                    min.unwrap_or(f64::NEG_INFINITY),
                    max.unwrap_or(f64::INFINITY),
                )
                .into(),
            DescriptorKind::Date => {
                let mut date = DateProperty::new(meta).with_zone(zone);
                if self.default.as_ref().and_then(Value::as_str) == Some(NOW) {
                    date.set_instant(&Utc::now());
                    return Ok(date.into());
                }
                date.into()
            }
            DescriptorKind::Enum { options, built } => {
                let options = Self::shared_options(id, options, built)?;
                EnumProperty::with_shared_options(meta, options).into()
            }
            DescriptorKind::List { form } => ListProperty::new(meta, (**form).clone()).into(),
            DescriptorKind::Dictionary { form } => {
                let mut dictionary = DictionaryProperty::new(meta);
                for (key, field) in form {
                    dictionary.add_field(field.build_in(key, zone)?)?;
                    if field.is_representative {
                        dictionary.set_representative(key);
                    }
                }
                dictionary.into()
            }
            DescriptorKind::Tuple {
                form,
                combinations,
                index,
            } => {
                let mut tuple = TupleProperty::new(meta);
                if !combinations.is_empty() {
                    let index = index
                        .get_or_init(|| Arc::new(CombinationIndex::new(combinations.iter().cloned())));
                    tuple = tuple.with_combinations(Arc::clone(index));
                }
                for (key, field) in form {
                    tuple.add_field(field.build_in(key, zone)?)?;
                }
                tuple.into()
            }
        };

        if let Some(default) = &self.default {
            property.set_json(default)?;
        }
        Ok(property)
    }

    fn shared_options(
        id: &str,
        options: &PropertyDescriptor,
        built: &OnceLock<Arc<ListProperty>>,
    ) -> Result<Arc<ListProperty>, ModelError> {
        if let Some(list) = built.get() {
            return Ok(Arc::clone(list));
        }
        let Property::List(list) = options.build("options")? else {
            return Err(ModelError::InvalidDescriptor {
                id: id.to_string(),
                reason: "enum options must be a list".to_string(),
            });
        };
        Ok(Arc::clone(built.get_or_init(|| Arc::new(list))))
    }
}
