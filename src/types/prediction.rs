//! Classifier output types

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Binary classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Legitimate = 0,
    Fraud = 1,
}

impl Label {
    /// Map a raw class id from a model output.
    pub fn from_class(class: i64) -> Option<Self> {
        match class {
            0 => Some(Label::Legitimate),
            1 => Some(Label::Fraud),
            _ => None,
        }
    }

    /// Label a fraud probability against a decision threshold.
    ///
    /// Strictly greater than the threshold is fraud.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            Label::Fraud
        } else {
            Label::Legitimate
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_fraud(self) -> bool {
        self == Label::Fraud
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Legitimate => write!(f, "Legitimate"),
            Label::Fraud => write!(f, "Fraud"),
        }
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let class = i64::deserialize(deserializer)?;
        Label::from_class(class)
            .ok_or_else(|| de::Error::custom(format!("label must be 0 or 1, got {}", class)))
    }
}

/// Result of one `predict` call, serialized as `{"prediction": 0|1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: Label,
}

impl Prediction {
    pub fn new(prediction: Label) -> Self {
        Self { prediction }
    }
}
