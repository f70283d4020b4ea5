//! Pairwise-valid value table backing constrained tuples.
//!
//! A [`CombinationIndex`] is built once from `[field, value, field, value]`
//! rows and shared (immutably) by every tuple built from the same descriptor.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

/// Valid values per field, in registration order.
pub type ValidOptions = IndexMap<String, IndexSet<String>>;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CombinationIndex {
    /// Every registered value, per field.
    values: ValidOptions,
    /// `(field, value)` to the related values of each other field.
    related: HashMap<(String, String), HashMap<String, IndexSet<String>>>,
    /// Field pairs that appear together in at least one row.
    linked: HashSet<(String, String)>,
}

impl CombinationIndex {
    /// Builds an index from `[field_a, value_a, field_b, value_b]` rows.
    ///
    /// Relationships are symmetric: a row makes each value valid for the other.
    pub fn new<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = [S; 4]>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for [field_a, value_a, field_b, value_b] in rows {
            let (field_a, value_a) = (field_a.into(), value_a.into());
            let (field_b, value_b) = (field_b.into(), value_b.into());
            index.relate(&field_a, &value_a, &field_b, &value_b);
            index.relate(&field_b, &value_b, &field_a, &value_a);
        }
        index
    }

    fn relate(&mut self, field: &str, value: &str, other_field: &str, other_value: &str) {
        self.values
            .entry(field.to_string())
            .or_default()
            .insert(value.to_string());
        self.related
            .entry((field.to_string(), value.to_string()))
            .or_default()
            .entry(other_field.to_string())
            .or_default()
            .insert(other_value.to_string());
        self.linked
            .insert((field.to_string(), other_field.to_string()));
    }

    /// Returns the fields known to the index.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns every value registered for `field`.
    pub fn registered(&self, field: &str) -> Option<&IndexSet<String>> {
        self.values.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Computes the values of every field still compatible with `assigned`.
    ///
    /// Each field starts from its full registered set and is intersected with
    /// the values related to every assigned `(field, value)` pair of a linked
    /// field. Assigned values the index does not know constrain nothing.
    pub fn valid_options(&self, assigned: &[(&str, &str)]) -> ValidOptions {
        let mut result = ValidOptions::with_capacity(self.values.len());
        for (field, all) in &self.values {
            let mut valid = all.clone();
            for &(other_field, other_value) in assigned {
                if other_field == field
                    || !self
                        .linked
                        .contains(&(other_field.to_string(), field.clone()))
                {
                    continue;
                }
                let Some(relations) = self
                    .related
                    .get(&(other_field.to_string(), other_value.to_string()))
                else {
                    continue;
                };
                match relations.get(field) {
                    Some(allowed) => valid.retain(|value| allowed.contains(value)),
                    None => valid.clear(),
                }
            }
            result.insert(field.clone(), valid);
        }
        result
    }
}
