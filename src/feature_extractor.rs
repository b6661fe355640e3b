//! Feature assembly for model inference.
//!
//! Turns a validated transaction record into the positional vector the
//! classifier was trained on. The model weights are bound to positions, not
//! names, so the order here must follow `FEATURE_NAMES` exactly.

use crate::types::transaction::{TransactionRecord, FEATURE_COUNT, FEATURE_NAMES};

/// Model input: 30 values in contract order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value at a contract position.
    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    /// Exchange two positions. Only useful for probing a model's sensitivity
    /// to feature order; a swapped vector no longer matches the contract.
    pub fn swapped(mut self, a: usize, b: usize) -> Self {
        self.0.swap(a, b);
        self
    }

    /// Build a vector from raw positional values.
    pub fn from_raw(values: [f32; FEATURE_COUNT]) -> Self {
        Self(values)
    }
}

/// Feature extractor that transforms records into model input vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the input vector for a record, in contract order.
    pub fn extract(&self, record: &TransactionRecord) -> FeatureVector {
        let mut features = [0.0_f32; FEATURE_COUNT];
        for (slot, (_, value)) in features.iter_mut().zip(record.fields()) {
            *slot = value as f32;
        }
        FeatureVector(features)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in vector order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_extraction_order() {
        let extractor = FeatureExtractor::new();
        let record = TransactionRecord::neutral(100.0)
            .unwrap()
            .with_field("Time", 406.0)
            .unwrap()
            .with_field("V1", -2.31)
            .unwrap()
            .with_field("V28", 0.5)
            .unwrap();

        let features = extractor.extract(&record);

        assert_eq!(features.len(), extractor.feature_count());
        assert_eq!(features.get(0), Some(406.0)); // Time
        assert_eq!(features.get(1), Some(100.0)); // Amount
        assert_eq!(features.get(2), Some(-2.31)); // V1
        assert_eq!(features.get(29), Some(0.5)); // V28
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 30);
        assert_eq!(extractor.feature_names().len(), 30);
        assert_eq!(extractor.feature_names()[1], "Amount");
    }

    #[test]
    fn test_swapped() {
        let record = TransactionRecord::neutral(100.0).unwrap();
        let features = FeatureExtractor::new().extract(&record);
        let swapped = features.swapped(0, 1);
        assert_eq!(swapped.get(0), Some(100.0));
        assert_eq!(swapped.get(1), Some(0.0));
        assert_ne!(features, swapped);
    }
}
