//! Transaction record and the feature contract it must satisfy

use crate::error::ValidationError;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Number of fields in one transaction record.
pub const FEATURE_COUNT: usize = 30;

/// The feature contract: every field a record must carry, in the position
/// the classifier was trained on. Validation, vector assembly and dataset
/// column mapping all walk this list.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Time", "Amount", "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V11", "V12",
    "V13", "V14", "V15", "V16", "V17", "V18", "V19", "V20", "V21", "V22", "V23", "V24", "V25",
    "V26", "V27", "V28",
];

/// Contract position of a field, if it is part of the contract.
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|&n| n == name)
}

/// One credit card transaction, validated against the feature contract.
///
/// Values are stored by contract position, so a record can only be built
/// with all 30 fields present and finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionRecord {
    values: [f64; FEATURE_COUNT],
}

impl TransactionRecord {
    /// Build a record from values already laid out in contract order.
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Result<Self, ValidationError> {
        for (&field, &value) in FEATURE_NAMES.iter().zip(values.iter()) {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite { field, value });
            }
        }
        Ok(Self { values })
    }

    /// Build a record from a field-name-to-value mapping.
    ///
    /// Keys outside the contract are ignored.
    pub fn from_fields(fields: &HashMap<String, f64>) -> Result<Self, ValidationError> {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, &field) in values.iter_mut().zip(FEATURE_NAMES.iter()) {
            *slot = *fields
                .get(field)
                .ok_or(ValidationError::MissingField(field))?;
        }
        Self::from_values(values)
    }

    /// Build a record from a JSON object.
    ///
    /// Accepts JSON numbers and strings holding a decimal number.
    pub fn from_json(object: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, &field) in values.iter_mut().zip(FEATURE_NAMES.iter()) {
            let raw = object
                .get(field)
                .ok_or(ValidationError::MissingField(field))?;
            *slot = json_number(field, raw)?;
        }
        Self::from_values(values)
    }

    /// Build a record from an arbitrary JSON value, which must be an object.
    pub fn from_json_value(value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(object) => Self::from_json(object),
            _ => Err(ValidationError::NotAnObject),
        }
    }

    /// A record with `Time = 0`, the given amount and every `V` component at zero.
    pub fn neutral(amount: f64) -> Result<Self, ValidationError> {
        let mut values = [0.0; FEATURE_COUNT];
        values[1] = amount;
        Self::from_values(values)
    }

    /// Return a copy with one field replaced.
    pub fn with_field(mut self, name: &str, value: f64) -> Result<Self, ValidationError> {
        let index =
            feature_index(name).ok_or_else(|| ValidationError::UnknownField(name.to_string()))?;
        if !value.is_finite() {
            return Err(ValidationError::NonFinite {
                field: FEATURE_NAMES[index],
                value,
            });
        }
        self.values[index] = value;
        Ok(self)
    }

    /// Value of a named field.
    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    pub fn time(&self) -> f64 {
        self.values[0]
    }

    pub fn amount(&self) -> f64 {
        self.values[1]
    }

    /// All values in contract order.
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// Field names paired with their values, in contract order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

fn json_number(field: &'static str, raw: &Value) -> Result<f64, ValidationError> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.ok_or_else(|| ValidationError::NotNumeric {
        field,
        value: raw.to_string(),
    })
}

impl Serialize for TransactionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TransactionRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Self::from_json(&object).map_err(de::Error::custom)
    }
}
