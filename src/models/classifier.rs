//! The seam between the detector and a concrete model backend

use crate::error::InferenceError;
use crate::feature_extractor::FeatureVector;
use crate::types::Label;

/// A loaded binary classifier.
///
/// Implementations must be deterministic for a fixed artifact and safe to
/// call from many request handlers at once.
pub trait Classifier: Send + Sync {
    /// Classify one feature vector.
    fn classify(&self, features: &FeatureVector) -> Result<Label, InferenceError>;

    /// Short backend/model name for logs and the health report.
    fn name(&self) -> &str;
}
