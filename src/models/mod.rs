//! ML model inference components

pub mod classifier;
pub mod inference;
pub mod loader;
pub mod onnx;
pub mod xgboost;

pub use classifier::Classifier;
pub use inference::FraudDetector;
pub use loader::ModelLoader;
pub use onnx::OnnxClassifier;
pub use xgboost::TreeEnsemble;
