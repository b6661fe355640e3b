//! Artifact format detection and backend selection

use crate::config::{ModelConfig, ModelFormat};
use crate::error::ModelLoadError;
use crate::models::classifier::Classifier;
use crate::models::onnx::OnnxClassifier;
use crate::models::xgboost::TreeEnsemble;
use std::path::Path;
use tracing::info;

/// Loader for classifier artifacts
pub struct ModelLoader {
    config: ModelConfig,
}

impl ModelLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// Format that will be used for the configured artifact.
    pub fn resolve_format(&self) -> Result<ModelFormat, ModelLoadError> {
        match self.config.format {
            ModelFormat::Auto => format_from_extension(&self.config.path),
            explicit => Ok(explicit),
        }
    }

    /// Load the configured artifact into memory.
    pub fn load(&self) -> Result<Box<dyn Classifier>, ModelLoadError> {
        let path = &self.config.path;
        if !path.exists() {
            return Err(ModelLoadError::NotFound { path: path.clone() });
        }

        let format = self.resolve_format()?;
        info!(path = %path.display(), format = ?format, "Loading classifier artifact");

        let classifier: Box<dyn Classifier> = match format {
            ModelFormat::XgboostJson => Box::new(TreeEnsemble::load(&self.config)?),
            ModelFormat::Onnx => Box::new(OnnxClassifier::load(&self.config)?),
            ModelFormat::Auto => {
                return Err(ModelLoadError::Incompatible {
                    path: path.clone(),
                    reason: "model format could not be resolved".to_string(),
                })
            }
        };
        Ok(classifier)
    }
}

fn format_from_extension(path: &Path) -> Result<ModelFormat, ModelLoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("json") => Ok(ModelFormat::XgboostJson),
        Some("onnx") => Ok(ModelFormat::Onnx),
        other => Err(ModelLoadError::Incompatible {
            path: path.to_path_buf(),
            reason: format!(
                "cannot infer model format from extension {:?}; set model.format",
                other.unwrap_or("")
            ),
        }),
    }
}
