use std::fmt;

use serde_json::{Number, Value};

use super::{NONE_DISPLAY, PropertyMeta, hash};

/// Integer property clamped to an inclusive range.
///
/// Writes outside the range are clamped, never rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct IntProperty {
    meta: PropertyMeta,
    min: i64,
    max: i64,
    value: Option<i64>,
}

impl IntProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            min: i64::MIN,
            max: i64::MAX,
            value: None,
        }
    }

    /// Restricts the range. Bounds given in the wrong order are swapped.
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = min.min(max);
        self.max = max.max(min);
        self.value = self.value.map(|v| v.clamp(self.min, self.max));
        self
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn value(&self) -> Option<i64> {
        self.value
    }

    pub fn set_value(&mut self, value: Option<i64>) {
        self.value = value.map(|v| v.clamp(self.min, self.max));
    }

    /// Rounds a floating-point input to the nearest integer before clamping.
    ///
    /// NaN leaves the property unset.
    pub fn set_float(&mut self, value: f64) {
        if value.is_nan() {
            self.value = None;
        } else {
            // `as` saturates at the i64 bounds
            self.set_value(Some(value.round() as i64));
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn to_json(&self) -> Value {
        self.value.map_or(Value::Null, |v| Value::Number(v.into()))
    }

    pub fn to_hash(&self) -> u64 {
        match self.value {
            Some(v) => hash::hash_value("int", &v.to_string()),
            None => hash::UNDEFINED_HASH,
        }
    }

    pub fn clone_with_id(&self, id: Option<&str>) -> Self {
        Self {
            meta: self.meta.renamed(id),
            ..self.clone()
        }
    }

    pub(crate) fn set_json(&mut self, value: &Value) {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(v) => self.set_value(Some(v)),
                None => self.set_float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(v) => self.set_float(v),
                Err(_) => self.value = None,
            },
            _ => self.value = None,
        }
    }
}

impl fmt::Display for IntProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{v}"),
            None => f.write_str(NONE_DISPLAY),
        }
    }
}

/// Floating-point property clamped to an inclusive range.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatProperty {
    meta: PropertyMeta,
    min: f64,
    max: f64,
    value: Option<f64>,
}

impl FloatProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            value: None,
        }
    }

    /// Restricts the range. Bounds given in the wrong order are swapped.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min.min(max);
        self.max = max.max(min);
        self.value = self.value.map(|v| v.clamp(self.min, self.max));
        self
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// NaN leaves the property unset.
    pub fn set_value(&mut self, value: Option<f64>) {
        self.value = value
            .filter(|v| !v.is_nan())
            .map(|v| v.clamp(self.min, self.max));
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    /// Infinite values have no JSON form and encode as `null`.
    pub fn to_json(&self) -> Value {
        self.value
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }

    pub fn to_hash(&self) -> u64 {
        match self.value {
            Some(v) => hash::hash_value("float", &format!("{v:?}")),
            None => hash::UNDEFINED_HASH,
        }
    }

    pub fn clone_with_id(&self, id: Option<&str>) -> Self {
        Self {
            meta: self.meta.renamed(id),
            ..self.clone()
        }
    }

    pub(crate) fn set_json(&mut self, value: &Value) {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        self.set_value(parsed);
    }
}

impl fmt::Display for FloatProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{v}"),
            None => f.write_str(NONE_DISPLAY),
        }
    }
}


#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    fn range_strategy() -> impl Strategy<Value = (i64, i64)> {
        (-10_000i64..10_000, -10_000i64..10_000)
    }

    // ===================
    // Property Test Functions
    // ===================

    /// A written integer always lands inside the declared range.
    fn check_int_always_in_range(bounds: (i64, i64), input: i64) -> Result<(), TestCaseError> {
        let mut prop = IntProperty::new(PropertyMeta::new("n")).with_range(bounds.0, bounds.1);
        prop.set_value(Some(input));

        let value = prop.value().expect("clamped value is always set");
        prop_assert!(value >= prop.min() && value <= prop.max());
        if input >= prop.min() && input <= prop.max() {
            prop_assert_eq!(value, input);
        }
        Ok(())
    }

    /// A written float always lands inside the declared range.
    fn check_float_always_in_range(min: f64, max: f64, input: f64) -> Result<(), TestCaseError> {
        let mut prop = FloatProperty::new(PropertyMeta::new("f")).with_range(min, max);
        prop.set_value(Some(input));

        let value = prop.value().expect("finite input is always set");
        prop_assert!(value >= prop.min() && value <= prop.max());
        if input >= prop.min() && input <= prop.max() {
            prop_assert!(approx_eq!(f64, value, input, ulps = 2));
        }
        Ok(())
    }

    /// Clones hash like their source.
    fn check_clone_hash_stable(input: i64) -> Result<(), TestCaseError> {
        let mut prop = IntProperty::new(PropertyMeta::new("n"));
        prop.set_value(Some(input));
        prop_assert_eq!(prop.clone_with_id(Some("m")).to_hash(), prop.to_hash());
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn int_always_in_range(bounds in range_strategy(), input in any::<i64>()) {
            check_int_always_in_range(bounds, input)?;
        }

        #[test]
        fn float_always_in_range(
            min in -1e6f64..1e6,
            max in -1e6f64..1e6,
            input in -1e7f64..1e7,
        ) {
            check_float_always_in_range(min, max, input)?;
        }

        #[test]
        fn clone_hash_stable(input in any::<i64>()) {
            check_clone_hash_stable(input)?;
        }
    }
}
