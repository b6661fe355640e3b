//! Fraud detector: the single entry point for predictions

use crate::config::ModelConfig;
use crate::error::{DetectorError, InferenceError, ModelLoadError};
use crate::feature_extractor::FeatureExtractor;
use crate::models::classifier::Classifier;
use crate::models::loader::ModelLoader;
use crate::types::{Prediction, TransactionRecord};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Owns the loaded classifier and turns records into predictions.
///
/// Read-only after construction; share it behind an `Arc`.
pub struct FraudDetector {
    classifier: Box<dyn Classifier>,
    extractor: FeatureExtractor,
}

impl FraudDetector {
    /// Load the artifact described by `config`.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelLoadError> {
        let classifier = ModelLoader::new(config.clone()).load()?;
        info!(model = %classifier.name(), "Fraud detector ready");
        Ok(Self::from_boxed(classifier))
    }

    /// Load an artifact with default model settings.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelLoadError> {
        Self::load(&ModelConfig::with_path(path.as_ref()))
    }

    /// Wrap an already constructed classifier.
    pub fn with_classifier<C: Classifier + 'static>(classifier: C) -> Self {
        Self::from_boxed(Box::new(classifier))
    }

    fn from_boxed(classifier: Box<dyn Classifier>) -> Self {
        Self {
            classifier,
            extractor: FeatureExtractor::new(),
        }
    }

    /// Predict from a field-name-to-value mapping.
    ///
    /// Every contract field must be present; the classifier is not called
    /// otherwise.
    pub fn predict(&self, fields: &HashMap<String, f64>) -> Result<Prediction, DetectorError> {
        let record = TransactionRecord::from_fields(fields)?;
        Ok(self.predict_record(&record)?)
    }

    /// Predict for a validated record.
    pub fn predict_record(&self, record: &TransactionRecord) -> Result<Prediction, InferenceError> {
        let features = self.extractor.extract(record);
        let label = self.classifier.classify(&features)?;
        debug!(
            model = %self.classifier.name(),
            amount = record.amount(),
            label = label.as_u8(),
            "Prediction complete"
        );
        Ok(Prediction::new(label))
    }

    /// Name of the loaded model.
    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    /// Number of input features the model consumes.
    pub fn feature_count(&self) -> usize {
        self.extractor.feature_count()
    }
}
