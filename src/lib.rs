//! Fraud Detection API Library
//!
//! Serves a pre-trained credit card fraud classifier over HTTP, plus the
//! offline pieces needed to check an artifact against a labelled dataset.

pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod feature_extractor;
pub mod models;
pub mod telemetry;
pub mod types;

pub use api::{router, AppState};
pub use config::AppConfig;
pub use error::{DatasetError, DetectorError, InferenceError, ModelLoadError, ValidationError};
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use models::{Classifier, FraudDetector};
pub use types::{Label, Prediction, TransactionRecord, FEATURE_COUNT, FEATURE_NAMES};
