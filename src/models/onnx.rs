//! ONNX Runtime backend for exported classifiers

use crate::config::ModelConfig;
use crate::error::{InferenceError, ModelLoadError};
use crate::feature_extractor::FeatureVector;
use crate::models::classifier::Classifier;
use crate::types::{Label, FEATURE_COUNT};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::{debug, info};

const DEFAULT_THRESHOLD: f64 = 0.5;

/// Classifier backed by an ONNX Runtime session.
///
/// `Session::run` needs exclusive access, so the session sits behind a
/// mutex. Nothing in it is mutated between calls.
pub struct OnnxClassifier {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    label_output: Option<String>,
    probability_output: Option<String>,
    threshold: f64,
}

impl OnnxClassifier {
    /// Load the ONNX model at `config.path`.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelLoadError> {
        let path = &config.path;
        if !path.exists() {
            return Err(ModelLoadError::NotFound { path: path.clone() });
        }

        info!(path = %path.display(), threads = config.onnx_threads, "Loading ONNX model");

        let runtime = |e: ort::Error| ModelLoadError::Runtime(e.to_string());
        let session = Session::builder()
            .map_err(runtime)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(runtime)?
            .with_intra_threads(config.onnx_threads)
            .map_err(runtime)?
            .commit_from_file(path)
            .map_err(|e| ModelLoadError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if session.inputs.len() != 1 {
            return Err(ModelLoadError::Incompatible {
                path: path.clone(),
                reason: format!(
                    "expected a single input tensor, model has {}",
                    session.inputs.len()
                ),
            });
        }
        let input_name = session.inputs[0].name.clone();

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name == config.label_output)
            .map(|o| o.name.clone());

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone());

        if label_output.is_none() && probability_output.is_none() {
            return Err(ModelLoadError::Incompatible {
                path: path.clone(),
                reason: format!(
                    "model has neither a '{}' output nor a probability output",
                    config.label_output
                ),
            });
        }
        if config.threshold != DEFAULT_THRESHOLD && probability_output.is_none() {
            return Err(ModelLoadError::Incompatible {
                path: path.clone(),
                reason: format!(
                    "threshold {} needs a probability output",
                    config.threshold
                ),
            });
        }

        let name = path
            .file_stem()
            .map(|s| format!("onnx:{}", s.to_string_lossy()))
            .unwrap_or_else(|| "onnx".to_string());

        info!(
            model = %name,
            input = %input_name,
            label_output = ?label_output,
            probability_output = ?probability_output,
            "Model loaded successfully"
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            label_output,
            probability_output,
            threshold: config.threshold,
        })
    }

    fn run(&self, features: &FeatureVector) -> Result<Label, InferenceError> {
        let backend = |e: ort::Error| InferenceError::Backend(e.to_string());

        // Input tensor shape [1, FEATURE_COUNT]
        let shape = vec![1_i64, FEATURE_COUNT as i64];
        let input_tensor =
            Tensor::from_array((shape, features.as_slice().to_vec())).map_err(backend)?;

        let mut session = self.session.lock().map_err(|_| InferenceError::Poisoned)?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(backend)?;

        self.extract_label(&outputs)
    }

    /// Prefer the exported class label; fall back to thresholding the
    /// fraud probability.
    fn extract_label(&self, outputs: &SessionOutputs) -> Result<Label, InferenceError> {
        // Exported labels are cut at 0.5; other thresholds need the probability.
        if self.threshold == DEFAULT_THRESHOLD {
            if let Some(output) = self.label_output.as_deref().and_then(|n| outputs.get(n)) {
                if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
                    let class = *data.first().ok_or_else(|| {
                        InferenceError::MissingOutput("empty label tensor".to_string())
                    })?;
                    debug!(model = %self.name, class = class, "Extracted label");
                    return Label::from_class(class).ok_or(InferenceError::UnexpectedClass(class));
                }
            }
        }

        let output = self
            .probability_output
            .as_deref()
            .and_then(|n| outputs.get(n))
            .ok_or_else(|| {
                InferenceError::MissingOutput("no probability output available".to_string())
            })?;

        let probability = extract_probability(output)?;
        debug!(model = %self.name, probability = probability, "Extracted probability");
        Ok(Label::from_probability(probability, self.threshold))
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, features: &FeatureVector) -> Result<Label, InferenceError> {
        self.run(features)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fraud probability from either a `[batch, classes]` tensor (XGBoost,
/// random forest exports) or a `seq(map(int64, float))` (zipmap exports).
fn extract_probability(output: &DynValue) -> Result<f64, InferenceError> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return fraud_probability_from_tensor(&dims, data);
    }

    if DynSequenceValueType::can_downcast(&output.dtype()) {
        return extract_from_sequence_map(output);
    }

    Err(InferenceError::MissingOutput(
        "probability output is neither a float tensor nor a sequence of maps".to_string(),
    ))
}

fn extract_from_sequence_map(output: &DynValue) -> Result<f64, InferenceError> {
    let backend = |e: ort::Error| InferenceError::Backend(e.to_string());
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(backend)?;
    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(backend)?;

    // Batch size is always 1
    let map_value = maps
        .first()
        .ok_or_else(|| InferenceError::MissingOutput("empty probability sequence".to_string()))?;
    let kv_pairs = map_value
        .try_extract_key_values::<i64, f32>()
        .map_err(backend)?;

    if let Some((_, prob)) = kv_pairs.iter().find(|(class, _)| *class == 1) {
        return Ok(*prob as f64);
    }
    if let Some((_, prob)) = kv_pairs.iter().find(|(class, _)| *class == 0) {
        return Ok(1.0 - *prob as f64);
    }

    Err(InferenceError::MissingOutput(
        "no class probability found in map".to_string(),
    ))
}

/// Pick the fraud-class probability out of a flat tensor.
fn fraud_probability_from_tensor(dims: &[i64], data: &[f32]) -> Result<f64, InferenceError> {
    let classes = match dims {
        [_, classes] => *classes,
        [classes] => *classes,
        _ => {
            return Err(InferenceError::MissingOutput(format!(
                "unexpected probability shape {:?}",
                dims
            )))
        }
    };

    let value = match classes {
        1 => data.first(),
        c if c >= 2 => data.get(1),
        _ => None,
    };

    value.map(|&v| v as f64).ok_or_else(|| {
        InferenceError::MissingOutput(format!("unexpected probability shape {:?}", dims))
    })
}
