//! Property trees to STIX fields.
//!
//! Each converter walks the top-level fields of an object's property
//! dictionary in order and writes the defined ones into a record. Shape
//! checks fail the whole publish: a property of the wrong variant means the
//! catalog and these converters disagree.

use log::{trace, warn};
use serde_json::{Map, Value};

use threatflow_core::{
    property::{DictionaryProperty, Property},
    template::TemplateCatalog,
};

use super::record::StixRecord;
use crate::error::PublishError;

/// Converts a property to its STIX value.
///
/// Strings are trimmed, dates become UTC timestamps, lists keep only their
/// defined items, and collections nest as JSON objects.
pub fn stix_value(prop: &Property) -> Value {
    match prop {
        Property::String(string) => string.value().map_or(Value::Null, |s| Value::from(s.trim())),
        Property::Date(date) => date.to_utc_iso().map_or(Value::Null, Value::from),
        Property::List(list) => Value::Array(
            list.values()
                .filter(|item| item.is_defined())
                .map(stix_value)
                .collect(),
        ),
        Property::Dictionary(dict) => Value::Object(
            dict.iter()
                .map(|(key, field)| (key.to_string(), stix_value(field)))
                .collect(),
        ),
        Property::Tuple(tuple) => Value::Object(
            tuple
                .iter()
                .map(|(key, field)| (key.to_string(), stix_value(field)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

// =============================================================================
// Actions
// =============================================================================

/// Writes an `attack-action`'s properties.
pub fn merge_action(
    record: &mut StixRecord,
    props: &DictionaryProperty,
    catalog: &TemplateCatalog,
) -> Result<(), PublishError> {
    for (key, prop) in props.iter() {
        match key {
            "ttp" => merge_ttp(record, prop, catalog),
            "confidence" => {
                let Property::Enum(confidence) = prop else {
                    return Err(PublishError::shape(key, "an enum", prop.kind()));
                };
                let Some(option) = confidence.reference_value() else {
                    continue;
                };
                let Property::Dictionary(option) = option else {
                    return Err(PublishError::shape(key, "a dictionary option", option.kind()));
                };
                let value = option.get("value").ok_or_else(|| PublishError::MissingField {
                    object: key.to_string(),
                    field: "value".to_string(),
                })?;
                if value.is_defined() {
                    record.set(key, stix_value(value));
                }
            }
            _ => {
                if prop.is_defined() {
                    record.set(key, stix_value(prop));
                }
            }
        }
    }
    Ok(())
}

fn merge_ttp(record: &mut StixRecord, ttp: &Property, catalog: &TemplateCatalog) {
    const FIELDS: [(&str, &str, &str); 2] = [
        ("tactic", "tactic_id", "tactic_ref"),
        ("technique", "technique_id", "technique_ref"),
    ];

    for (field, id_key, ref_key) in FIELDS {
        let Some(Value::String(id)) = ttp.get(field).map(Property::to_json) else {
            continue;
        };
        match catalog.stix_id(&id) {
            Some(stix_ref) => record.set(ref_key, stix_ref),
            None => warn!(id = id.as_str(); "No external object for ATT&CK id"),
        }
        record.set(id_key, id);
    }
}

// =============================================================================
// Basic objects
// =============================================================================

/// Writes the properties of any object without dedicated handling.
///
/// `lowercase` lowercases every string value, which `mac-addr` requires.
pub fn merge_basic<'p>(
    fields: &mut Map<String, Value>,
    props: impl Iterator<Item = (&'p str, &'p Property)>,
    lowercase: bool,
) -> Result<(), PublishError> {
    for (key, prop) in props {
        if !prop.is_defined() {
            continue;
        }
        let value = match prop {
            Property::Dictionary(_) => {
                return Err(PublishError::shape(key, "a basic value", prop.kind()));
            }
            Property::Enum(choice) => match choice.value() {
                Some("true") => Value::Bool(true),
                Some("false") => Value::Bool(false),
                Some(option) => Value::from(option),
                None => continue,
            },
            Property::List(list) if key == "hashes" => {
                let hashes = hash_map(list.values());
                if hashes.is_empty() {
                    continue;
                }
                Value::Object(hashes)
            }
            Property::List(list) => {
                let mut items = Vec::with_capacity(list.len());
                for item in list.values().filter(|item| item.is_defined()) {
                    match item {
                        Property::Dictionary(dict) => {
                            let mut nested = Map::new();
                            merge_basic(&mut nested, dict.iter(), lowercase)?;
                            items.push(Value::Object(nested));
                        }
                        Property::List(_) | Property::Enum(_) => {
                            return Err(PublishError::shape(key, "a basic list item", item.kind()));
                        }
                        _ => items.push(stix_value(item)),
                    }
                }
                Value::Array(items)
            }
            _ => stix_value(prop),
        };
        let value = match value {
            Value::String(s) if lowercase => Value::String(s.to_lowercase()),
            other => other,
        };
        fields.insert(key.to_string(), value);
    }
    Ok(())
}

/// Folds `[{hash_type, hash_value}, ...]` into `{hash_type: hash_value}`.
fn hash_map<'p>(entries: impl Iterator<Item = &'p Property>) -> Map<String, Value> {
    let mut hashes = Map::new();
    for entry in entries {
        let Property::Dictionary(entry) = entry else {
            continue;
        };
        let Some(Value::String(kind)) = entry.get("hash_type").map(stix_value) else {
            trace!("Skipping hash without a type");
            continue;
        };
        let Some(value @ Value::String(_)) = entry.get("hash_value").map(stix_value) else {
            continue;
        };
        hashes.insert(kind, value);
    }
    hashes
}

// =============================================================================
// Flow and author
// =============================================================================

/// Writes the canvas properties onto the `attack-flow` record.
///
/// The author is published as its own record; see [`author_record`].
pub fn merge_flow(record: &mut StixRecord, props: &DictionaryProperty) -> Result<(), PublishError> {
    for (key, prop) in props.iter() {
        match key {
            "author" => {}
            "external_references" => {
                let Property::List(list) = prop else {
                    return Err(PublishError::shape(key, "a list", prop.kind()));
                };
                let mut references = Vec::with_capacity(list.len());
                for item in list.values() {
                    let Property::Dictionary(reference) = item else {
                        return Err(PublishError::shape(key, "a list of dictionaries", item.kind()));
                    };
                    if !reference.is_defined() {
                        continue;
                    }
                    let entry: Map<String, Value> = reference
                        .iter()
                        .map(|(k, field)| (k.to_string(), stix_value(field)))
                        .filter(|(_, value)| !value.is_null())
                        .collect();
                    references.push(Value::Object(entry));
                }
                if !references.is_empty() {
                    record.set(key, references);
                }
            }
            "scope" => {
                let Property::Enum(scope) = prop else {
                    return Err(PublishError::shape(key, "an enum", prop.kind()));
                };
                if let Some(scope) = scope.value() {
                    record.set(key, scope);
                }
            }
            _ => {
                if prop.is_defined() {
                    record.set(key, stix_value(prop));
                }
            }
        }
    }
    Ok(())
}

/// Builds the `identity` record of the flow's author.
pub fn author_record(props: &DictionaryProperty, timestamp: &str) -> Result<StixRecord, PublishError> {
    let author = props.get("author").ok_or_else(|| PublishError::MissingField {
        object: "flow".to_string(),
        field: "author".to_string(),
    })?;
    let Property::Dictionary(author) = author else {
        return Err(PublishError::shape("author", "a dictionary", author.kind()));
    };

    let mut record = StixRecord::generate("identity", timestamp);
    for (key, prop) in author.iter() {
        match key {
            "identity_class" => {
                let Property::Enum(class) = prop else {
                    return Err(PublishError::shape(key, "an enum", prop.kind()));
                };
                if let Some(option) = class.reference_value() {
                    record.set(key, option.to_string().trim().to_lowercase());
                }
            }
            _ => {
                if prop.is_defined() {
                    record.set(key, prop.to_string().trim());
                }
            }
        }
    }
    Ok(record)
}
